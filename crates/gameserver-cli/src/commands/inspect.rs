//! Read-only inspection commands: status, list, info, network, disk.

use std::io::Write;

use gameserver_config::defaults::{GAME_PORT_RANGE_END, GAME_PORT_RANGE_START};
use gameserver_config::{ContentRef, ServiceDescriptor};
use gameserver_core::{error_chain, evaluate};
use gameserver_fsops::{RecordState, format_size, measure, read_record};
use gameserver_host::PortState;
use tracing::warn;

use crate::context::{AppContext, CliError, CliResult};
use crate::output::{
    DiskUsage, DiskView, DownloadView, GamePorts, GameStatus, GameSummary, InfoView, ListView,
    NetworkView, PortView, StatusView, disk_table, emit, info_table, list_table, network_table,
    status_table,
};

const UNKNOWN_STATE: &str = "unknown";

pub(crate) async fn handle_status(ctx: &AppContext, out: &mut dyn Write) -> CliResult<()> {
    let mut games = Vec::with_capacity(ctx.registry.len());
    for descriptor in ctx.registry.iter() {
        games.push(GameStatus {
            id: descriptor.id().to_string(),
            name: descriptor.name().to_string(),
            unit: descriptor.unit_name().to_string(),
            state: unit_state(ctx, descriptor).await,
            download: evaluate(descriptor, false).label(),
        });
    }
    let view = StatusView {
        registry: ctx.registry.directory().display().to_string(),
        games,
        load_errors: ctx.load_error_messages(),
    };
    emit(&view, ctx.output, out, status_table)
}

pub(crate) fn handle_list(ctx: &AppContext, out: &mut dyn Write) -> CliResult<()> {
    let games = ctx
        .registry
        .iter()
        .map(|descriptor| GameSummary {
            id: descriptor.id().to_string(),
            name: descriptor.name().to_string(),
            description: descriptor.description().to_string(),
            content_ref: descriptor.content_ref().map(ContentRef::redacted),
        })
        .collect();
    let view = ListView {
        games,
        load_errors: ctx.load_error_messages(),
    };
    emit(&view, ctx.output, out, list_table)
}

pub(crate) async fn handle_info(ctx: &AppContext, id: &str, out: &mut dyn Write) -> CliResult<()> {
    let descriptor = ctx.lookup(id)?;
    let state = unit_state(ctx, descriptor).await;
    let ports = port_views(ctx, descriptor).await;
    let view = InfoView {
        id: descriptor.id().to_string(),
        name: descriptor.name().to_string(),
        description: descriptor.description().to_string(),
        source: ctx
            .registry
            .source_of(descriptor.id())
            .map(|path| path.display().to_string()),
        unit: descriptor.unit_name().to_string(),
        state,
        content_ref: descriptor.content_ref().map(ContentRef::redacted),
        install_dir: descriptor.install_dir().display().to_string(),
        executable: descriptor.executable_path().display().to_string(),
        working_directory: descriptor
            .effective_working_directory()
            .display()
            .to_string(),
        user: descriptor.user().to_string(),
        group: descriptor.effective_group().to_string(),
        arguments: descriptor.arguments().to_vec(),
        environment: descriptor.environment().clone(),
        config_file: descriptor
            .config_file_path()
            .map(|path| path.display().to_string()),
        log_dir: descriptor.log_dir().map(|path| path.display().to_string()),
        clean_paths: descriptor.clean_paths().to_vec(),
        download_state: evaluate(descriptor, false).label(),
        download: download_view(descriptor),
        ports,
    };
    emit(&view, ctx.output, out, info_table)
}

pub(crate) async fn handle_network(ctx: &AppContext, out: &mut dyn Write) -> CliResult<()> {
    let snapshot = ctx
        .ports
        .snapshot()
        .await
        .map_err(CliError::Collaborator)?;
    let games = ctx
        .registry
        .iter()
        .map(|descriptor| GamePorts {
            id: descriptor.id().to_string(),
            name: descriptor.name().to_string(),
            ports: descriptor
                .ports()
                .iter()
                .map(|&port| PortView {
                    port,
                    state: snapshot.state(port),
                })
                .collect(),
        })
        .collect();
    let view = NetworkView {
        games,
        range_start: GAME_PORT_RANGE_START,
        range_end: GAME_PORT_RANGE_END,
        listening_in_range: snapshot.listening_in(GAME_PORT_RANGE_START, GAME_PORT_RANGE_END),
    };
    emit(&view, ctx.output, out, network_table)
}

pub(crate) fn handle_disk(ctx: &AppContext, out: &mut dyn Write) -> CliResult<()> {
    let games: Vec<DiskUsage> = ctx.registry.iter().map(disk_usage).collect();
    let total_bytes = games
        .iter()
        .filter_map(|usage| usage.size_bytes)
        .fold(0_u64, u64::saturating_add);
    let view = DiskView {
        games,
        total_bytes,
        total_human: format_size(total_bytes),
    };
    emit(&view, ctx.output, out, disk_table)
}

async fn unit_state(ctx: &AppContext, descriptor: &ServiceDescriptor) -> String {
    match ctx.supervisor().state(descriptor.unit_name()).await {
        Ok(state) => state,
        Err(err) => {
            warn!(game = descriptor.id(), error = %error_chain(&err), "unit state query failed");
            UNKNOWN_STATE.to_string()
        }
    }
}

async fn port_views(ctx: &AppContext, descriptor: &ServiceDescriptor) -> Vec<PortView> {
    let ports = descriptor.ports();
    if ports.is_empty() {
        return Vec::new();
    }
    match ctx.ports.snapshot().await {
        Ok(snapshot) => ports
            .iter()
            .map(|&port| PortView {
                port,
                state: snapshot.state(port),
            })
            .collect(),
        Err(err) => {
            warn!(game = descriptor.id(), error = %error_chain(&err), "port probe failed");
            ports
                .iter()
                .map(|&port| PortView {
                    port,
                    state: PortState::Unknown,
                })
                .collect()
        }
    }
}

fn download_view(descriptor: &ServiceDescriptor) -> DownloadView {
    if descriptor.content_ref().is_none() {
        return DownloadView::NotApplicable;
    }
    match read_record(descriptor.install_dir()) {
        RecordState::Absent => DownloadView::NotDownloaded,
        RecordState::Corrupt { reason } => DownloadView::Invalid { reason },
        RecordState::Present(record) => DownloadView::Recorded {
            last_updated: record.last_updated,
            app_id: record.app_id,
            branch: record.branch,
            status: record.status.as_str(),
            file_count: record.file_count,
            total_size_human: record.total_size_human,
            validation: record.validation.as_str(),
        },
    }
}

fn disk_usage(descriptor: &ServiceDescriptor) -> DiskUsage {
    let install_dir = descriptor.install_dir();
    let (recorded_files, last_updated) = match read_record(install_dir) {
        RecordState::Present(record) => (Some(record.file_count), Some(record.last_updated)),
        RecordState::Absent | RecordState::Corrupt { .. } => (None, None),
    };
    let downloaded = install_dir.is_dir();
    let size_bytes = if downloaded {
        match measure(install_dir) {
            Ok(stats) => Some(stats.total_bytes),
            Err(err) => {
                warn!(game = descriptor.id(), error = %error_chain(&err), "measurement failed");
                None
            }
        }
    } else {
        None
    };
    DiskUsage {
        id: descriptor.id().to_string(),
        install_dir: install_dir.display().to_string(),
        downloaded,
        size_bytes,
        size_human: size_bytes.map(format_size),
        recorded_files,
        last_updated,
    }
}

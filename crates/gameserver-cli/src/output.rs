//! Views and renderers for CLI commands.

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use gameserver_core::{PlanOutcome, PlanReport, RemovalResult, StepStatus};
use gameserver_host::PortState;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::context::{CliError, CliResult};

/// Write `value` as pretty JSON or through its table renderer.
pub(crate) fn emit<T: Serialize>(
    value: &T,
    format: OutputFormat,
    out: &mut dyn Write,
    table: fn(&T, &mut dyn Write) -> io::Result<()>,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(value)
                .map_err(|err| CliError::Output(io::Error::other(err)))?;
            writeln!(out, "{text}")?;
        }
        OutputFormat::Table => table(value, out)?,
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusView {
    pub(crate) registry: String,
    pub(crate) games: Vec<GameStatus>,
    pub(crate) load_errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GameStatus {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) unit: String,
    pub(crate) state: String,
    pub(crate) download: &'static str,
}

pub(crate) fn status_table(view: &StatusView, out: &mut dyn Write) -> io::Result<()> {
    if view.games.is_empty() {
        writeln!(out, "no games configured in {}", view.registry)?;
    } else {
        writeln!(
            out,
            "{:<16} {:<24} {:<24} {:<12} DOWNLOAD",
            "ID", "NAME", "UNIT", "STATE"
        )?;
        for game in &view.games {
            writeln!(
                out,
                "{:<16} {:<24} {:<24} {:<12} {}",
                game.id, game.name, game.unit, game.state, game.download
            )?;
        }
    }
    load_errors_table(&view.load_errors, out)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListView {
    pub(crate) games: Vec<GameSummary>,
    pub(crate) load_errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GameSummary {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) content_ref: Option<String>,
}

pub(crate) fn list_table(view: &ListView, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{:<16} {:<24} {:<28} DESCRIPTION", "ID", "NAME", "CONTENT")?;
    for game in &view.games {
        writeln!(
            out,
            "{:<16} {:<24} {:<28} {}",
            game.id,
            game.name,
            game.content_ref.as_deref().unwrap_or("-"),
            game.description
        )?;
    }
    load_errors_table(&view.load_errors, out)
}

fn load_errors_table(errors: &[String], out: &mut dyn Write) -> io::Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "skipped descriptor files:")?;
    for error in errors {
        writeln!(out, "  {error}")?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InfoView {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) source: Option<String>,
    pub(crate) unit: String,
    pub(crate) state: String,
    pub(crate) content_ref: Option<String>,
    pub(crate) install_dir: String,
    pub(crate) executable: String,
    pub(crate) working_directory: String,
    pub(crate) user: String,
    pub(crate) group: String,
    pub(crate) arguments: Vec<String>,
    pub(crate) environment: BTreeMap<String, String>,
    pub(crate) config_file: Option<String>,
    pub(crate) log_dir: Option<String>,
    pub(crate) clean_paths: Vec<String>,
    pub(crate) download_state: &'static str,
    pub(crate) download: DownloadView,
    pub(crate) ports: Vec<PortView>,
}

/// Completion record as presented by `info`.
#[derive(Debug, Serialize)]
#[serde(tag = "record", rename_all = "kebab-case")]
pub(crate) enum DownloadView {
    NotApplicable,
    NotDownloaded,
    Invalid {
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    Recorded {
        last_updated: DateTime<Utc>,
        app_id: String,
        branch: String,
        status: &'static str,
        file_count: u64,
        total_size_human: String,
        validation: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct PortView {
    pub(crate) port: u16,
    pub(crate) state: PortState,
}

pub(crate) fn info_table(view: &InfoView, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "id: {}", view.id)?;
    writeln!(out, "name: {}", view.name)?;
    if !view.description.is_empty() {
        writeln!(out, "description: {}", view.description)?;
    }
    if let Some(source) = &view.source {
        writeln!(out, "descriptor: {source}")?;
    }
    writeln!(out, "unit: {} ({})", view.unit, view.state)?;
    writeln!(
        out,
        "content: {}",
        view.content_ref.as_deref().unwrap_or("not managed")
    )?;
    writeln!(out, "install dir: {}", view.install_dir)?;
    writeln!(out, "executable: {}", view.executable)?;
    if !view.arguments.is_empty() {
        writeln!(out, "arguments: {}", view.arguments.join(" "))?;
    }
    writeln!(out, "working directory: {}", view.working_directory)?;
    writeln!(out, "run as: {}:{}", view.user, view.group)?;
    for (key, value) in &view.environment {
        writeln!(out, "env: {key}={value}")?;
    }
    if let Some(config_file) = &view.config_file {
        writeln!(out, "config file: {config_file}")?;
    }
    if let Some(log_dir) = &view.log_dir {
        writeln!(out, "log dir: {log_dir}")?;
    }
    for pattern in &view.clean_paths {
        writeln!(out, "clean path: {pattern}")?;
    }

    writeln!(out, "download: {}", view.download_state)?;
    match &view.download {
        DownloadView::NotApplicable => {}
        DownloadView::NotDownloaded => writeln!(out, "  not downloaded")?,
        DownloadView::Invalid { reason } => writeln!(out, "  invalid record: {reason}")?,
        DownloadView::Recorded {
            last_updated,
            app_id,
            branch,
            status,
            file_count,
            total_size_human,
            validation,
        } => {
            writeln!(out, "  last updated: {last_updated}")?;
            writeln!(out, "  app id: {app_id} (branch {branch})")?;
            writeln!(out, "  status: {status} (validation {validation})")?;
            writeln!(out, "  files: {file_count} ({total_size_human})")?;
        }
    }

    if !view.ports.is_empty() {
        writeln!(out, "ports:")?;
        for port in &view.ports {
            writeln!(out, "  {:>5} {}", port.port, port.state.as_str())?;
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NetworkView {
    pub(crate) games: Vec<GamePorts>,
    pub(crate) range_start: u16,
    pub(crate) range_end: u16,
    pub(crate) listening_in_range: Vec<u16>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GamePorts {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) ports: Vec<PortView>,
}

pub(crate) fn network_table(view: &NetworkView, out: &mut dyn Write) -> io::Result<()> {
    for game in &view.games {
        if game.ports.is_empty() {
            writeln!(out, "{} ({}): no declared ports", game.id, game.name)?;
            continue;
        }
        writeln!(out, "{} ({}):", game.id, game.name)?;
        for port in &game.ports {
            writeln!(out, "  {:>5} {}", port.port, port.state.as_str())?;
        }
    }
    let listening = if view.listening_in_range.is_empty() {
        "none".to_string()
    } else {
        view.listening_in_range
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    writeln!(
        out,
        "listening in {}-{}: {listening}",
        view.range_start, view.range_end
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DiskView {
    pub(crate) games: Vec<DiskUsage>,
    pub(crate) total_bytes: u64,
    pub(crate) total_human: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DiskUsage {
    pub(crate) id: String,
    pub(crate) install_dir: String,
    pub(crate) downloaded: bool,
    pub(crate) size_bytes: Option<u64>,
    pub(crate) size_human: Option<String>,
    pub(crate) recorded_files: Option<u64>,
    pub(crate) last_updated: Option<DateTime<Utc>>,
}

pub(crate) fn disk_table(view: &DiskView, out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "{:<16} {:>10} {:>8} {:<26} INSTALL DIR",
        "ID", "SIZE", "FILES", "UPDATED"
    )?;
    for game in &view.games {
        let size = game.size_human.as_deref().unwrap_or("not downloaded");
        let files = game
            .recorded_files
            .map_or_else(|| "-".to_string(), |count| count.to_string());
        let updated = game.last_updated.map_or_else(
            || "-".to_string(),
            |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        writeln!(
            out,
            "{:<16} {:>10} {:>8} {:<26} {}",
            game.id, size, files, updated, game.install_dir
        )?;
    }
    writeln!(out, "total: {}", view.total_human)
}

pub(crate) fn plan_table(report: &PlanReport, out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "{} {} (unit {})",
        report.operation.as_str(),
        report.game,
        report.unit
    )?;
    for step in &report.steps {
        let marker = match step.status {
            StepStatus::Completed => "done",
            StepStatus::Skipped => "skip",
        };
        match &step.detail {
            Some(detail) => writeln!(out, "  [{marker}] {}: {detail}", step.kind.as_str())?,
            None => writeln!(out, "  [{marker}] {}", step.kind.as_str())?,
        }
    }
    writeln!(out, "result: {}", describe_outcome(&report.outcome))?;
    if let PlanOutcome::Cleaned { user_data, .. } = &report.outcome {
        for outcome in user_data {
            match &outcome.result {
                RemovalResult::Removed => writeln!(out, "  removed  {}", outcome.target)?,
                RemovalResult::Failed { message } => {
                    writeln!(out, "  failed   {}: {message}", outcome.target)?;
                }
                RemovalResult::Refused { reason } => {
                    writeln!(out, "  refused  {}: {reason}", outcome.target)?;
                }
                RemovalResult::Rejected { reason } => {
                    writeln!(out, "  rejected {}: {reason}", outcome.target)?;
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn describe_outcome(outcome: &PlanOutcome) -> String {
    match outcome {
        PlanOutcome::UpToDate { last_updated } => {
            format!("already up to date (last updated {last_updated})")
        }
        PlanOutcome::Fetched {
            reason,
            file_count,
            total_size_human,
        } => format!(
            "fetched {file_count} files ({total_size_human}), reason {}",
            reason.as_str()
        ),
        PlanOutcome::Started => "started".to_string(),
        PlanOutcome::Stopped => "stopped".to_string(),
        PlanOutcome::AlreadyStopped => "already stopped".to_string(),
        PlanOutcome::Restarted { was_active: true } => "restarted".to_string(),
        PlanOutcome::Restarted { was_active: false } => {
            "started (was not running)".to_string()
        }
        PlanOutcome::Cleaned {
            install_dir_removed,
            user_data,
        } => {
            let files = if *install_dir_removed {
                "game files removed"
            } else {
                "game files kept"
            };
            let removed = user_data
                .iter()
                .filter(|outcome| outcome.result == RemovalResult::Removed)
                .count();
            format!("cleaned; {files}, {removed} user data path(s) removed")
        }
    }
}

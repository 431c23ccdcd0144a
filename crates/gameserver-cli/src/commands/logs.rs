//! Journal streaming.

use std::io::Write;

use gameserver_core::LogOptions;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::cli::{LogsArgs, OutputFormat};
use crate::context::{AppContext, CliError, CliResult};

/// Stream journal lines to `out` until the journal ends or, when following, until Ctrl-C.
pub(crate) async fn handle_logs(
    ctx: &AppContext,
    args: &LogsArgs,
    out: &mut dyn Write,
) -> CliResult<()> {
    let descriptor = ctx.lookup(&args.id)?;
    let unit = descriptor.unit_name();
    let options = LogOptions {
        lines: Some(args.lines),
        follow: args.follow,
        since: args.since.clone(),
    };
    let mut stream = ctx
        .supervisor()
        .tail_logs(unit, &options)
        .await
        .map_err(CliError::Collaborator)?;

    loop {
        let next = if args.follow {
            tokio::select! {
                line = stream.next() => line,
                _ = tokio::signal::ctrl_c() => {
                    debug!(unit, "stopped following journal");
                    None
                }
            }
        } else {
            stream.next().await
        };
        let Some(line) = next else {
            break;
        };
        let line = line.map_err(CliError::Collaborator)?;
        match ctx.output {
            OutputFormat::Table => writeln!(out, "{line}")?,
            OutputFormat::Json => writeln!(out, "{}", json!({ "unit": unit, "line": line }))?,
        }
        out.flush()?;
    }
    Ok(())
}

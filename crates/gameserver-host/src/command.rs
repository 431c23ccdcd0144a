use std::ffi::OsStr;
use std::process::{Output, Stdio};

use gameserver_core::CollaboratorError;
use tokio::process::Command;
use tracing::debug;

const SUDO_PROGRAM: &str = "sudo";

/// Command for `program`, prefixed with `sudo` when requested.
pub(crate) fn privileged<I, S>(program: &str, args: I, use_sudo: bool) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = if use_sudo {
        let mut command = Command::new(SUDO_PROGRAM);
        command.arg(program);
        command
    } else {
        Command::new(program)
    };
    command.args(args).stdin(Stdio::null());
    command
}

/// Run to completion capturing stdout and stderr.
pub(crate) async fn capture(
    program: &str,
    mut command: Command,
) -> Result<Output, CollaboratorError> {
    debug!(program, command = ?command.as_std(), "running host command");
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| CollaboratorError::Spawn {
            program: program.to_string(),
            source,
        })
}

/// Run to completion and require a zero exit status.
pub(crate) async fn checked(program: &str, command: Command) -> Result<Output, CollaboratorError> {
    let output = capture(program, command).await?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(exit_error(program, &output))
    }
}

pub(crate) fn exit_error(program: &str, output: &Output) -> CollaboratorError {
    let diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
    CollaboratorError::Exit {
        program: program.to_string(),
        code: output.status.code(),
        diagnostic: (!diagnostic.is_empty()).then_some(diagnostic),
    }
}

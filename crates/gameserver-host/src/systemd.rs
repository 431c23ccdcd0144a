//! systemd-backed supervisor using `systemctl`, `systemd-run`, and `journalctl`.

use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use async_trait::async_trait;
use gameserver_core::{
    CollaboratorError, LogOptions, LogStream, StopResult, Supervisor, TransientUnit,
};
use nix::unistd::{Group, User};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio_stream::Stream;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info};

use crate::command::{capture, checked, privileged};

const SYSTEMCTL: &str = "systemctl";
const SYSTEMD_RUN: &str = "systemd-run";
const JOURNALCTL: &str = "journalctl";

/// Supervisor that launches games as transient systemd units.
#[derive(Debug, Clone, Copy)]
pub struct SystemdSupervisor {
    use_sudo: bool,
}

impl SystemdSupervisor {
    /// Supervisor running its commands through `sudo` when `use_sudo` is set.
    #[must_use]
    pub const fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }
}

/// Arguments for `systemd-run`.
#[must_use]
pub fn run_args(unit: &TransientUnit) -> Vec<String> {
    let mut args = vec![
        format!("--unit={}", unit.unit_name),
        format!("--uid={}", unit.user),
        format!("--gid={}", unit.group),
        "--collect".to_string(),
        format!("--working-directory={}", unit.working_directory.display()),
    ];
    args.extend(
        unit.environment
            .iter()
            .map(|(key, value)| format!("--setenv={key}={value}")),
    );
    args.push(unit.executable.display().to_string());
    args.extend(unit.arguments.iter().cloned());
    args
}

/// Arguments for `journalctl`.
#[must_use]
pub fn journal_args(unit: &str, options: &LogOptions) -> Vec<String> {
    let mut args = vec!["-u".to_string(), unit.to_string(), "--no-pager".to_string()];
    if let Some(lines) = options.lines {
        args.push("-n".to_string());
        args.push(lines.to_string());
    }
    if options.follow {
        args.push("-f".to_string());
    }
    if let Some(since) = &options.since {
        args.push("--since".to_string());
        args.push(since.clone());
    }
    args
}

fn ensure_account(unit: &TransientUnit) -> Result<(), CollaboratorError> {
    let user = User::from_name(&unit.user).map_err(|err| CollaboratorError::Rejected {
        reason: format!("user lookup for '{}' failed: {err}", unit.user),
    })?;
    if user.is_none() {
        return Err(CollaboratorError::Rejected {
            reason: format!("user '{}' does not exist on this host", unit.user),
        });
    }
    let group = Group::from_name(&unit.group).map_err(|err| CollaboratorError::Rejected {
        reason: format!("group lookup for '{}' failed: {err}", unit.group),
    })?;
    if group.is_none() {
        return Err(CollaboratorError::Rejected {
            reason: format!("group '{}' does not exist on this host", unit.group),
        });
    }
    Ok(())
}

#[async_trait]
impl Supervisor for SystemdSupervisor {
    async fn is_active(&self, unit: &str) -> Result<bool, CollaboratorError> {
        let output = capture(
            SYSTEMCTL,
            privileged(SYSTEMCTL, ["is-active", "--quiet", unit], self.use_sudo),
        )
        .await?;
        Ok(output.status.success())
    }

    async fn state(&self, unit: &str) -> Result<String, CollaboratorError> {
        let output = capture(
            SYSTEMCTL,
            privileged(SYSTEMCTL, ["is-active", unit], self.use_sudo),
        )
        .await?;
        let label = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if label.is_empty() {
            "inactive".to_string()
        } else {
            label
        })
    }

    async fn run_transient(&self, unit: &TransientUnit) -> Result<(), CollaboratorError> {
        ensure_account(unit)?;
        checked(
            SYSTEMD_RUN,
            privileged(SYSTEMD_RUN, run_args(unit), self.use_sudo),
        )
        .await?;
        info!(unit = %unit.unit_name, "transient unit started");
        Ok(())
    }

    async fn stop(&self, unit: &str) -> Result<StopResult, CollaboratorError> {
        if !self.is_active(unit).await? {
            return Ok(StopResult::WasNotRunning);
        }
        checked(SYSTEMCTL, privileged(SYSTEMCTL, ["stop", unit], self.use_sudo)).await?;
        info!(unit, "unit stopped");
        Ok(StopResult::Stopped)
    }

    async fn tail_logs(
        &self,
        unit: &str,
        options: &LogOptions,
    ) -> Result<LogStream, CollaboratorError> {
        let mut command = privileged(JOURNALCTL, journal_args(unit, options), self.use_sudo);
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        debug!(command = ?command.as_std(), "tailing journal");
        let mut child = command.spawn().map_err(|source| CollaboratorError::Spawn {
            program: JOURNALCTL.to_string(),
            source,
        })?;
        let stdout = child.stdout.take().ok_or_else(|| CollaboratorError::Rejected {
            reason: "journalctl stdout was not captured".to_string(),
        })?;
        Ok(Box::pin(JournalLines {
            lines: LinesStream::new(BufReader::new(stdout).lines()),
            _child: child,
        }))
    }
}

struct JournalLines {
    lines: LinesStream<BufReader<ChildStdout>>,
    _child: Child,
}

impl Stream for JournalLines {
    type Item = Result<String, CollaboratorError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.lines).poll_next(cx).map(|line| {
            line.map(|result| {
                result.map_err(|source| CollaboratorError::Spawn {
                    program: JOURNALCTL.to_string(),
                    source,
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn unit() -> TransientUnit {
        let mut environment = BTreeMap::new();
        environment.insert("SteamAppId".to_string(), "892970".to_string());
        environment.insert("LD_LIBRARY_PATH".to_string(), "./linux64".to_string());
        TransientUnit {
            unit_name: "valheim-server".to_string(),
            user: "gameserver".to_string(),
            group: "games".to_string(),
            working_directory: PathBuf::from("/srv/games/valheim"),
            environment,
            executable: PathBuf::from("/srv/games/valheim/valheim_server.x86_64"),
            arguments: vec!["-name".to_string(), "My Server".to_string()],
        }
    }

    #[test]
    fn systemd_run_arguments_follow_declaration() {
        assert_eq!(
            run_args(&unit()),
            vec![
                "--unit=valheim-server",
                "--uid=gameserver",
                "--gid=games",
                "--collect",
                "--working-directory=/srv/games/valheim",
                "--setenv=LD_LIBRARY_PATH=./linux64",
                "--setenv=SteamAppId=892970",
                "/srv/games/valheim/valheim_server.x86_64",
                "-name",
                "My Server",
            ]
        );
    }

    #[test]
    fn journal_arguments_include_only_requested_filters() {
        assert_eq!(
            journal_args("vh", &LogOptions::default()),
            vec!["-u", "vh", "--no-pager"]
        );
        let options = LogOptions {
            lines: Some(50),
            follow: true,
            since: Some("1 hour ago".to_string()),
        };
        assert_eq!(
            journal_args("vh", &options),
            vec!["-u", "vh", "--no-pager", "-n", "50", "-f", "--since", "1 hour ago"]
        );
    }

    #[test]
    fn unknown_accounts_are_rejected_before_launch() {
        let mut request = unit();
        request.user = "no-such-user-for-gameserver-tests".to_string();
        assert!(matches!(
            ensure_account(&request),
            Err(CollaboratorError::Rejected { .. })
        ));
    }
}

//! SteamCMD content downloader.
//!
//! # Design
//! - Progress output is inherited so the operator sees SteamCMD live.
//! - Ctrl-C while SteamCMD runs is forwarded as SIGINT; the fetch then reports an interrupt.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use gameserver_core::{CollaboratorError, ContentDownloader, FetchRequest};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const STABLE_BRANCH: &str = "stable";
const REDACTED: &str = "***";

/// Downloader driving the `steamcmd` program.
#[derive(Debug, Clone)]
pub struct SteamCmdDownloader {
    program: PathBuf,
}

impl SteamCmdDownloader {
    /// Downloader invoking `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program invoked for fetches.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// SteamCMD arguments for `request`.
#[must_use]
pub fn command_args(request: &FetchRequest) -> Vec<String> {
    let mut args = vec![
        "+force_install_dir".to_string(),
        request.target_dir.display().to_string(),
        "+login".to_string(),
        "anonymous".to_string(),
        "+app_update".to_string(),
        request.app_id.clone(),
    ];
    if request.branch != STABLE_BRANCH {
        args.push("-beta".to_string());
        args.push(request.branch.clone());
        if let Some(password) = &request.password {
            args.push("-betapassword".to_string());
            args.push(password.clone());
        }
    }
    args.push("validate".to_string());
    args.push("+quit".to_string());
    args
}

fn redacted_args(request: &FetchRequest) -> Vec<String> {
    let mut args = command_args(request);
    let flag = args.iter().position(|arg| arg == "-betapassword");
    if let Some(password) = flag.and_then(|index| args.get_mut(index + 1)) {
        *password = REDACTED.to_string();
    }
    args
}

fn forward_interrupt(child: &Child) {
    let Some(id) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(id), Signal::SIGINT) {
        warn!(pid = id, error = %err, "failed to forward interrupt to steamcmd");
    }
}

#[async_trait]
impl ContentDownloader for SteamCmdDownloader {
    async fn fetch(&self, request: &FetchRequest) -> Result<(), CollaboratorError> {
        let program = self.program.display().to_string();
        debug!(program = %program, args = ?redacted_args(request), "launching steamcmd");

        let mut child = Command::new(&self.program)
            .args(command_args(request))
            .current_dir(&request.target_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| CollaboratorError::Spawn {
                program: program.clone(),
                source,
            })?;

        let waited = tokio::select! {
            status = child.wait() => status,
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupt received; stopping steamcmd");
                forward_interrupt(&child);
                if let Err(err) = child.wait().await {
                    warn!(error = %err, "failed to reap steamcmd after interrupt");
                }
                return Err(CollaboratorError::Interrupted);
            }
        };
        let status = waited.map_err(|source| CollaboratorError::Spawn {
            program: program.clone(),
            source,
        })?;

        if status.success() {
            info!(app_id = %request.app_id, branch = %request.branch, "steamcmd finished");
            Ok(())
        } else {
            Err(CollaboratorError::Exit {
                program,
                code: status.code(),
                diagnostic: Some("check the network connection and the Steam app id".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(branch: &str, password: Option<&str>) -> FetchRequest {
        FetchRequest {
            app_id: "294420".to_string(),
            branch: branch.to_string(),
            password: password.map(ToString::to_string),
            target_dir: PathBuf::from("/games/test"),
        }
    }

    #[test]
    fn stable_branch_has_no_beta_flags() {
        assert_eq!(
            command_args(&request("stable", None)),
            vec![
                "+force_install_dir",
                "/games/test",
                "+login",
                "anonymous",
                "+app_update",
                "294420",
                "validate",
                "+quit"
            ]
        );
    }

    #[test]
    fn beta_branch_is_selected() {
        assert_eq!(
            command_args(&request("experimental", None)),
            vec![
                "+force_install_dir",
                "/games/test",
                "+login",
                "anonymous",
                "+app_update",
                "294420",
                "-beta",
                "experimental",
                "validate",
                "+quit"
            ]
        );
    }

    #[test]
    fn beta_password_follows_branch_and_is_redacted_in_logs() {
        let request = request("experimental", Some("hunter2"));
        let args = command_args(&request);
        assert_eq!(
            &args[6..10],
            &["-beta", "experimental", "-betapassword", "hunter2"]
        );
        let redacted = redacted_args(&request);
        assert!(!redacted.iter().any(|arg| arg == "hunter2"));
        assert!(redacted.iter().any(|arg| arg == REDACTED));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() -> anyhow::Result<()> {
        let downloader = SteamCmdDownloader::new("/nonexistent/steamcmd-for-tests");
        let target = std::env::temp_dir();
        let mut fetch = request("stable", None);
        fetch.target_dir = target;
        let result = downloader.fetch(&fetch).await;
        assert!(matches!(result, Err(CollaboratorError::Spawn { .. })));
        Ok(())
    }
}

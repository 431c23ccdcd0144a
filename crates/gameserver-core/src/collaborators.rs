//! Narrow interfaces to the process supervisor, the content downloader, and the operator.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use gameserver_config::{ContentRef, ServiceDescriptor};
use tokio_stream::Stream;

use crate::error::CollaboratorError;

/// Lazy sequence of journal lines.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<String, CollaboratorError>> + Send>>;

/// Everything the supervisor needs to launch a transient unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientUnit {
    /// Unit name.
    pub unit_name: String,
    /// Account the process runs as.
    pub user: String,
    /// Group the process runs as.
    pub group: String,
    /// Working directory.
    pub working_directory: PathBuf,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Program to execute.
    pub executable: PathBuf,
    /// Program arguments.
    pub arguments: Vec<String>,
}

impl TransientUnit {
    /// Launch parameters declared by `descriptor`.
    #[must_use]
    pub fn from_descriptor(descriptor: &ServiceDescriptor) -> Self {
        Self {
            unit_name: descriptor.unit_name().to_string(),
            user: descriptor.user().to_string(),
            group: descriptor.effective_group().to_string(),
            working_directory: descriptor.effective_working_directory().to_path_buf(),
            environment: descriptor.environment().clone(),
            executable: descriptor.executable_path().to_path_buf(),
            arguments: descriptor.arguments().to_vec(),
        }
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    /// The unit was running and has been stopped.
    Stopped,
    /// The unit was not running.
    WasNotRunning,
}

/// Journal query options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Number of trailing lines.
    pub lines: Option<u32>,
    /// Keep streaming new lines.
    pub follow: bool,
    /// Only lines newer than this journal time expression.
    pub since: Option<String>,
}

/// Process supervisor operations.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Whether the unit is currently active.
    async fn is_active(&self, unit: &str) -> Result<bool, CollaboratorError>;

    /// Supervisor state label for display (for example `active` or `inactive`).
    async fn state(&self, unit: &str) -> Result<String, CollaboratorError>;

    /// Launch a transient unit.
    async fn run_transient(&self, unit: &TransientUnit) -> Result<(), CollaboratorError>;

    /// Stop a unit.
    async fn stop(&self, unit: &str) -> Result<StopResult, CollaboratorError>;

    /// Stream journal lines for a unit.
    async fn tail_logs(&self, unit: &str, options: &LogOptions)
    -> Result<LogStream, CollaboratorError>;
}

/// One content fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Application id.
    pub app_id: String,
    /// Branch to fetch.
    pub branch: String,
    /// Branch password.
    pub password: Option<String>,
    /// Directory the content lands in.
    pub target_dir: PathBuf,
}

impl FetchRequest {
    /// Request for `reference` into `target_dir`.
    #[must_use]
    pub fn new(reference: &ContentRef, target_dir: &Path) -> Self {
        Self {
            app_id: reference.app_id().to_string(),
            branch: reference.branch().to_string(),
            password: reference.password().map(ToString::to_string),
            target_dir: target_dir.to_path_buf(),
        }
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("app_id", &self.app_id)
            .field("branch", &self.branch)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("target_dir", &self.target_dir)
            .finish()
    }
}

/// Content downloader operations.
#[async_trait]
pub trait ContentDownloader: Send + Sync {
    /// Fetch content, forwarding progress output to the operator.
    ///
    /// Returns [`CollaboratorError::Interrupted`] when the operator interrupts the fetch.
    async fn fetch(&self, request: &FetchRequest) -> Result<(), CollaboratorError>;
}

/// Question put to the operator before destructive steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    /// Delete the install directory.
    RemoveInstallDir {
        /// Game name.
        game: String,
        /// Directory to delete.
        path: PathBuf,
    },
    /// Delete user data outside the install directory.
    RemoveUserData {
        /// Game name.
        game: String,
        /// Paths to delete.
        paths: Vec<PathBuf>,
    },
}

impl fmt::Display for ConfirmRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoveInstallDir { game, path } => {
                write!(f, "Delete game files for {game} at {}?", path.display())
            }
            Self::RemoveUserData { game, paths } => {
                writeln!(f, "Delete user data for {game}?")?;
                for path in paths {
                    writeln!(f, "  {}", path.display())?;
                }
                Ok(())
            }
        }
    }
}

/// Operator confirmation source.
pub trait Confirmer: Send {
    /// Whether the operator accepts `request`.
    fn confirm(&mut self, request: &ConfirmRequest) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_request_debug_hides_password() -> Result<(), gameserver_config::ConfigError> {
        let reference = ContentRef::decode("380870_unstable_hunter2")?;
        let request = FetchRequest::new(&reference, Path::new("/srv/games/pz"));
        assert_eq!(request.password.as_deref(), Some("hunter2"));
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("unstable"));
        Ok(())
    }

    #[test]
    fn user_data_prompt_lists_paths() {
        let request = ConfirmRequest::RemoveUserData {
            game: "Valheim".to_string(),
            paths: vec![
                PathBuf::from("/home/ops/.config/unity3d/IronGate"),
                PathBuf::from("/home/ops/worlds"),
            ],
        };
        let rendered = request.to_string();
        assert!(rendered.starts_with("Delete user data for Valheim?"));
        assert!(rendered.contains("  /home/ops/worlds"));
    }
}

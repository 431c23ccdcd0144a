//! Shared command context, collaborators, and the CLI error type.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::sync::Arc;

use gameserver_config::{ConfigError, LookupError, Registry, RegistryLoadError, ServiceDescriptor};
use gameserver_core::{
    ActionPlanner, CollaboratorError, Confirmer, ContentDownloader, CoreError, Supervisor,
    error_chain,
};
use gameserver_host::{PortSnapshot, probe_listening_ports};

use crate::cli::OutputFormat;

/// CLI-level error type; every variant maps to a stable exit code.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    NotFound(LookupError),
    Registry(ConfigError),
    Core(CoreError),
    Collaborator(CollaboratorError),
    Output(io::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_)
            | Self::Registry(ConfigError::InvalidField { .. } | ConfigError::Malformed { .. }) => 2,
            Self::NotFound(_) => 3,
            Self::Core(CoreError::Precondition(_)) => 4,
            Self::Core(CoreError::Collaborator { .. }) | Self::Collaborator(_) => 5,
            Self::Core(CoreError::Filesystem(_) | CoreError::Io { .. })
            | Self::Registry(ConfigError::Io { .. })
            | Self::Output(_) => 6,
            Self::Core(CoreError::Interrupted { .. }) => 130,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::NotFound(err) => error_chain(err),
            Self::Registry(err) => error_chain(err),
            Self::Core(err) => error_chain(err),
            Self::Collaborator(err) => error_chain(err),
            Self::Output(err) => format!("failed to write output: {err}"),
        }
    }

    pub(crate) fn hint(&self) -> Option<String> {
        match self {
            Self::NotFound(err) => Some(err.suggestion()),
            Self::Core(err) => err.hint(),
            Self::Registry(ConfigError::Io { .. }) => {
                Some("check --registry-dir or GAMESERVER_REGISTRY_DIR".to_string())
            }
            _ => None,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl Error for CliError {}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::Output(err)
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

/// Source of listening-port snapshots.
#[derive(Debug, Clone)]
pub(crate) enum PortSource {
    /// Run `ss` on the host.
    Probe,
    /// Fixed snapshot.
    #[cfg(test)]
    Fixed(PortSnapshot),
}

impl PortSource {
    pub(crate) async fn snapshot(&self) -> Result<PortSnapshot, CollaboratorError> {
        match self {
            Self::Probe => probe_listening_ports().await,
            #[cfg(test)]
            Self::Fixed(snapshot) => Ok(snapshot.clone()),
        }
    }
}

/// External collaborators used by one invocation.
pub(crate) struct Collaborators {
    pub(crate) supervisor: Arc<dyn Supervisor>,
    pub(crate) downloader: Arc<dyn ContentDownloader>,
    pub(crate) confirmer: Box<dyn Confirmer>,
    pub(crate) ports: PortSource,
}

/// Application context passed to command handlers.
pub(crate) struct AppContext {
    pub(crate) planner: ActionPlanner,
    pub(crate) registry: Registry,
    pub(crate) load_errors: Vec<RegistryLoadError>,
    pub(crate) ports: PortSource,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    pub(crate) fn lookup(&self, id: &str) -> CliResult<&ServiceDescriptor> {
        self.registry.lookup(id).map_err(CliError::NotFound)
    }

    pub(crate) fn supervisor(&self) -> &dyn Supervisor {
        self.planner.supervisor()
    }

    pub(crate) fn load_error_messages(&self) -> Vec<String> {
        self.load_errors.iter().map(|err| error_chain(err)).collect()
    }
}

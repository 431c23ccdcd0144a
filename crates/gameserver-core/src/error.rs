//! # Design
//!
//! - `CoreError` is the taxonomy surfaced by plans: precondition, collaborator, filesystem, interrupt.
//! - Preconditions carry an operator hint rendered by the presentation layer.
//! - Collaborator failures keep the raw diagnostic of the external program.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use gameserver_fsops::FsOpsError;
use thiserror::Error;

/// Result type for planner operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Failures reported by the supervisor or downloader.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The external program could not be launched.
    #[error("failed to launch '{program}'")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The external program exited unsuccessfully.
    #[error("'{program}' exited with {}", describe_exit(.code.as_ref(), .diagnostic.as_deref()))]
    Exit {
        /// Program name.
        program: String,
        /// Exit code when the process exited normally.
        code: Option<i32>,
        /// Captured diagnostic output.
        diagnostic: Option<String>,
    },
    /// The collaborator refused the request before running anything.
    #[error("{reason}")]
    Rejected {
        /// Why the request was refused.
        reason: String,
    },
    /// The operation was interrupted by the operator.
    #[error("interrupted by the operator")]
    Interrupted,
}

fn describe_exit(code: Option<&i32>, diagnostic: Option<&str>) -> String {
    let status = code.map_or_else(|| "a signal".to_string(), |code| format!("status {code}"));
    match diagnostic {
        Some(text) if !text.is_empty() => format!("{status}: {text}"),
        _ => status,
    }
}

/// Requirements an operation found unmet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    /// Update requested for a game without a content reference.
    #[error("game '{id}' has no content reference; its content is not managed")]
    NotManaged {
        /// Game id.
        id: String,
    },
    /// Start requested while the content is not up to date.
    #[error("game '{id}' content is not ready ({state})")]
    ContentNotReady {
        /// Game id.
        id: String,
        /// Download state label.
        state: &'static str,
    },
    /// Start requested while the executable is missing.
    #[error("executable {} for game '{id}' does not exist", .path.display())]
    ExecutableMissing {
        /// Game id.
        id: String,
        /// Declared executable path.
        path: PathBuf,
    },
    /// Start requested while the unit is active.
    #[error("game '{id}' is already running as unit '{unit}'")]
    AlreadyRunning {
        /// Game id.
        id: String,
        /// Unit name.
        unit: String,
    },
}

impl PreconditionError {
    /// Actionable suggestion for the operator.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotManaged { .. } => None,
            Self::ContentNotReady { id, .. } => Some(format!("run `gameserver update {id}` first")),
            Self::ExecutableMissing { id, .. } => {
                Some(format!("run `gameserver update {id} --force` to repair the install"))
            }
            Self::AlreadyRunning { id, .. } => Some(format!(
                "use `gameserver restart {id}` or `gameserver stop {id}`"
            )),
        }
    }
}

/// Errors produced while executing a plan.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A precondition of the requested operation was not met.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// An external collaborator failed.
    #[error("{operation} failed")]
    Collaborator {
        /// Plan step that invoked the collaborator.
        operation: &'static str,
        /// Collaborator diagnostic.
        source: CollaboratorError,
    },
    /// A filesystem operation failed.
    #[error(transparent)]
    Filesystem(#[from] FsOpsError),
    /// A direct IO operation failed.
    #[error("io operation '{operation}' failed for {}", .path.display())]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The operator interrupted the plan.
    #[error("{operation} interrupted; no completion record was written")]
    Interrupted {
        /// Step that was running.
        operation: &'static str,
    },
}

impl CoreError {
    pub(crate) fn collaborator(operation: &'static str, source: CollaboratorError) -> Self {
        match source {
            CollaboratorError::Interrupted => Self::Interrupted { operation },
            source => Self::Collaborator { operation, source },
        }
    }

    /// Operator hint, when one applies.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Precondition(precondition) => precondition.hint(),
            Self::Interrupted { .. } => Some("re-run the command to resume".to_string()),
            Self::Collaborator { operation: "fetch", .. } => {
                Some("check connectivity and the content reference, then retry with --force".to_string())
            }
            _ => None,
        }
    }
}

/// Render `err` and its sources as one `: `-joined line.
///
/// A source whose text already ends the message is skipped, so errors that embed their
/// source in their own display are not repeated.
#[must_use]
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_errors_render_status_and_diagnostic() {
        let err = CollaboratorError::Exit {
            program: "steamcmd".to_string(),
            code: Some(8),
            diagnostic: Some("No subscription".to_string()),
        };
        assert_eq!(err.to_string(), "'steamcmd' exited with status 8: No subscription");

        let signalled = CollaboratorError::Exit {
            program: "systemctl".to_string(),
            code: None,
            diagnostic: None,
        };
        assert_eq!(signalled.to_string(), "'systemctl' exited with a signal");
    }

    #[test]
    fn interrupted_collaborators_become_plan_interrupts() {
        let err = CoreError::collaborator("fetch", CollaboratorError::Interrupted);
        assert!(matches!(err, CoreError::Interrupted { operation: "fetch" }));

        let err = CoreError::collaborator(
            "stop",
            CollaboratorError::Rejected {
                reason: "denied".to_string(),
            },
        );
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "stop failed");
    }

    #[test]
    fn error_chain_joins_sources_once() {
        let err = CoreError::collaborator(
            "stop",
            CollaboratorError::Rejected {
                reason: "denied".to_string(),
            },
        );
        assert_eq!(error_chain(&err), "stop failed: denied");

        let embedded = EmbeddingError(io::Error::other("disk full"));
        assert_eq!(error_chain(&embedded), "write failed: disk full");
    }

    #[derive(Debug, Error)]
    #[error("write failed: {0}")]
    struct EmbeddingError(#[source] io::Error);

    #[test]
    fn preconditions_carry_hints() {
        let err = CoreError::from(PreconditionError::ContentNotReady {
            id: "valheim".to_string(),
            state: "not-downloaded",
        });
        assert_eq!(
            err.hint().as_deref(),
            Some("run `gameserver update valheim` first")
        );
        assert!(
            PreconditionError::NotManaged {
                id: "mc".to_string()
            }
            .hint()
            .is_none()
        );
    }
}

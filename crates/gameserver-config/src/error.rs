//! Error types for descriptor parsing and registry loading.
//!
//! # Design
//! - Field-level failures name the descriptor key and a static reason.
//! - Per-file load failures are values collected beside the registry; they never abort a load.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for descriptor validation and registry IO.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A descriptor field contained an invalid value.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField {
        /// Descriptor key that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when it is safe to echo.
        value: Option<String>,
    },
    /// The document was not a well-formed descriptor object.
    #[error("malformed descriptor: {source}")]
    Malformed {
        /// Underlying JSON error (names missing or mistyped keys).
        source: serde_json::Error,
    },
    /// Registry directory access failed.
    #[error("registry io failure during {operation} on {}", .path.display())]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) const fn invalid(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidField {
            field,
            reason,
            value,
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Failure to load a single descriptor file.
#[derive(Debug, Error)]
#[error("failed to load {}: {cause}", .file.display())]
pub struct RegistryLoadError {
    /// Descriptor file that was skipped.
    pub file: PathBuf,
    /// Reason the file was skipped.
    pub cause: RegistryLoadCause,
}

/// Reasons a descriptor file is excluded from the registry.
#[derive(Debug, Error)]
pub enum RegistryLoadCause {
    /// The file could not be read.
    #[error("unreadable file: {0}")]
    Read(#[source] io::Error),
    /// The file content failed descriptor validation.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
    /// Another file already declared the same identifier.
    #[error("duplicate id '{id}' (already declared by {})", .first.display())]
    DuplicateId {
        /// Identifier declared twice.
        id: String,
        /// File whose declaration won.
        first: PathBuf,
    },
}

/// Lookup failure for an unknown game identifier.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No descriptor declares the requested identifier.
    #[error("game '{id}' not found")]
    NotFound {
        /// Identifier requested by the caller.
        id: String,
        /// Every known identifier, sorted.
        known: Vec<String>,
    },
}

impl LookupError {
    /// Operator-facing hint listing the known identifiers.
    #[must_use]
    pub fn suggestion(&self) -> String {
        match self {
            Self::NotFound { known, .. } if known.is_empty() => {
                "no games configured; check the registry directory".to_string()
            }
            Self::NotFound { known, .. } => format!("available games: {}", known.join(", ")),
        }
    }

    /// Sorted identifiers known to the registry.
    #[must_use]
    pub fn known_ids(&self) -> &[String] {
        match self {
            Self::NotFound { known, .. } => known,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_lists_known_ids() {
        let err = LookupError::NotFound {
            id: "vh".to_string(),
            known: vec!["factorio".to_string(), "valheim".to_string()],
        };
        assert_eq!(err.to_string(), "game 'vh' not found");
        assert_eq!(err.suggestion(), "available games: factorio, valheim");
        assert_eq!(err.known_ids().len(), 2);
    }

    #[test]
    fn suggestion_handles_empty_registry() {
        let err = LookupError::NotFound {
            id: "vh".to_string(),
            known: Vec::new(),
        };
        assert!(err.suggestion().starts_with("no games configured"));
    }

    #[test]
    fn invalid_field_names_key_and_reason() {
        let err = ConfigError::invalid("ports", "must be between 1 and 65535", Some("0".into()));
        assert_eq!(
            err.to_string(),
            "invalid value for 'ports': must be between 1 and 65535"
        );
    }
}

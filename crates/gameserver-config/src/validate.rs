//! Field-level validation helpers for descriptor documents.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Validate a descriptor identifier against `^[A-Za-z0-9_-]+$`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the identifier is empty or contains other characters.
pub fn validate_id(id: &str) -> ConfigResult<()> {
    let well_formed = !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "id",
            "must match ^[A-Za-z0-9_-]+$",
            Some(id.to_string()),
        ))
    }
}

/// Require a non-blank string value.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is empty or whitespace.
pub fn require_non_empty(field: &'static str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty", None));
    }
    Ok(())
}

/// Require a non-empty absolute path.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the path is empty or relative.
pub fn require_absolute(field: &'static str, value: &str) -> ConfigResult<PathBuf> {
    require_non_empty(field, value)?;
    let path = Path::new(value);
    if !path.is_absolute() {
        return Err(ConfigError::invalid(
            field,
            "must be an absolute path",
            Some(value.to_string()),
        ));
    }
    Ok(path.to_path_buf())
}

/// Validate the port list, preserving declaration order.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for any entry outside `1..=65535`.
pub fn validate_ports(ports: &[i64]) -> ConfigResult<Vec<u16>> {
    ports
        .iter()
        .map(|port| {
            u16::try_from(*port)
                .ok()
                .filter(|value| *value != 0)
                .ok_or_else(|| {
                    ConfigError::invalid(
                        "ports",
                        "must be between 1 and 65535",
                        Some(port.to_string()),
                    )
                })
        })
        .collect()
}

/// Validate a unit name accepted by the supervisor.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the name is empty or contains whitespace or `/`.
pub fn validate_unit_name(value: &str) -> ConfigResult<()> {
    require_non_empty("unitName", value)?;
    if value.chars().any(|ch| ch.is_whitespace() || ch == '/') {
        return Err(ConfigError::invalid(
            "unitName",
            "must not contain whitespace or '/'",
            Some(value.to_string()),
        ));
    }
    Ok(())
}

/// Validate environment variable names.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when a key is empty or contains `=`.
pub fn validate_environment_key(key: &str) -> ConfigResult<()> {
    if key.is_empty() || key.contains('=') {
        return Err(ConfigError::invalid(
            "environment",
            "keys must be non-empty and must not contain '='",
            Some(key.to_string()),
        ));
    }
    Ok(())
}

/// Validate the numeric-looking application identifier of a content reference.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the identifier is empty or not all ASCII digits.
pub fn validate_app_id(app_id: &str) -> ConfigResult<()> {
    if app_id.is_empty() || !app_id.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ConfigError::invalid(
            "contentRef",
            "app id must be a non-empty numeric token",
            Some(app_id.to_string()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_accepts_word_characters_and_dashes() {
        assert!(validate_id("valheim-beta_2").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("has space").is_err());
        assert!(validate_id("../escape").is_err());
    }

    #[test]
    fn absolute_paths_are_required() {
        assert!(require_absolute("installDir", "/srv/games/vh").is_ok());
        let err = require_absolute("installDir", "games/vh");
        assert!(matches!(
            err,
            Err(ConfigError::InvalidField {
                field: "installDir",
                ..
            })
        ));
        assert!(require_absolute("installDir", "  ").is_err());
    }

    #[test]
    fn ports_are_range_checked() {
        assert_eq!(validate_ports(&[2456, 2457]).ok(), Some(vec![2456, 2457]));
        assert!(validate_ports(&[0]).is_err());
        assert!(validate_ports(&[65_536]).is_err());
        assert!(validate_ports(&[-1]).is_err());
        assert_eq!(validate_ports(&[]).ok(), Some(Vec::new()));
    }

    #[test]
    fn unit_names_reject_whitespace() {
        assert!(validate_unit_name("valheim-server").is_ok());
        assert!(validate_unit_name("valheim server").is_err());
        assert!(validate_unit_name("a/b").is_err());
    }

    #[test]
    fn app_ids_must_be_numeric() {
        assert!(validate_app_id("896660").is_ok());
        assert!(validate_app_id("").is_err());
        assert!(validate_app_id("89a").is_err());
    }
}

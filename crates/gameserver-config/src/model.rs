//! Typed descriptor models.
//!
//! # Design
//! - `RawDescriptor` mirrors the on-disk JSON object and rejects unknown keys.
//! - `ServiceDescriptor` is the validated, immutable form consumed by the planner.
//! - Content references are parsed once; the password never appears in `Debug` or `Display`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::defaults::DEFAULT_BRANCH;
use crate::error::{ConfigError, ConfigResult};
use crate::validate::{
    require_absolute, require_non_empty, validate_app_id, validate_environment_key, validate_id,
    validate_ports, validate_unit_name,
};

const REDACTED: &str = "***";

/// Reference to externally-fetchable game content: app id, branch, optional password.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentRef {
    app_id: String,
    branch: String,
    password: Option<String>,
}

impl ContentRef {
    /// Build a reference from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the app id is not numeric, or the branch or
    /// password is empty or contains `_` where the encoding cannot represent it.
    pub fn new(
        app_id: impl Into<String>,
        branch: impl Into<String>,
        password: Option<String>,
    ) -> ConfigResult<Self> {
        let app_id = app_id.into();
        let branch = branch.into();
        validate_app_id(&app_id)?;
        if branch.is_empty() {
            return Err(ConfigError::invalid(
                "contentRef",
                "branch must not be empty",
                None,
            ));
        }
        if branch.contains('_') {
            return Err(ConfigError::invalid(
                "contentRef",
                "branch must not contain '_'",
                Some(branch),
            ));
        }
        if password.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::invalid(
                "contentRef",
                "password must not be empty",
                None,
            ));
        }
        Ok(Self {
            app_id,
            branch,
            password,
        })
    }

    /// Decode the single-string form `appId[_branch[_password]]`.
    ///
    /// The password segment keeps any further underscores.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for empty segments or a non-numeric app id.
    pub fn decode(encoded: &str) -> ConfigResult<Self> {
        let mut parts = encoded.splitn(3, '_');
        let app_id = parts.next().unwrap_or_default();
        let branch = parts.next();
        let password = parts.next();
        match (branch, password) {
            (None, _) => Self::new(app_id, DEFAULT_BRANCH, None),
            (Some(branch), password) => {
                Self::new(app_id, branch, password.map(ToString::to_string))
            }
        }
    }

    /// Canonical single-string encoding; the default branch is omitted when no password is set.
    #[must_use]
    pub fn encode(&self) -> String {
        match &self.password {
            Some(password) => format!("{}_{}_{password}", self.app_id, self.branch),
            None if self.branch == DEFAULT_BRANCH => self.app_id.clone(),
            None => format!("{}_{}", self.app_id, self.branch),
        }
    }

    /// Encoding with the password replaced by a placeholder.
    #[must_use]
    pub fn redacted(&self) -> String {
        match &self.password {
            Some(_) => format!("{}_{}_{REDACTED}", self.app_id, self.branch),
            None => self.encode(),
        }
    }

    /// Application identifier.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Branch name (`stable` unless declared).
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Branch password when the branch is protected.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for ContentRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ContentRef")
            .field("app_id", &self.app_id)
            .field("branch", &self.branch)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .finish()
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.redacted())
    }
}

impl FromStr for ContentRef {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::decode(value)
    }
}

/// On-disk descriptor document, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawDescriptor {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Supervisor unit name.
    pub unit_name: String,
    /// Encoded content reference.
    #[serde(default)]
    pub content_ref: Option<String>,
    /// Installation directory.
    pub install_dir: String,
    /// Server executable.
    pub executable_path: String,
    /// Working directory for the server process.
    #[serde(default)]
    pub working_directory: Option<String>,
    /// Game configuration file.
    #[serde(default)]
    pub config_file_path: Option<String>,
    /// Game log directory.
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Account the server runs as.
    pub user: String,
    /// Group the server runs as.
    #[serde(default)]
    pub group: Option<String>,
    /// Command-line arguments.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Environment variables.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Ports the server listens on.
    #[serde(default)]
    pub ports: Vec<i64>,
    /// Paths removed by `clean --user-data`.
    #[serde(default)]
    pub clean_paths: Vec<String>,
}

/// Validated declaration of one game service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    id: String,
    name: String,
    description: String,
    unit_name: String,
    content_ref: Option<ContentRef>,
    install_dir: PathBuf,
    executable_path: PathBuf,
    working_directory: Option<PathBuf>,
    config_file_path: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    user: String,
    group: Option<String>,
    arguments: Vec<String>,
    environment: BTreeMap<String, String>,
    ports: Vec<u16>,
    clean_paths: Vec<String>,
}

impl ServiceDescriptor {
    /// Parse and validate a descriptor from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] for structural problems (missing keys, wrong types,
    /// unknown keys) and [`ConfigError::InvalidField`] for rule violations.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let document: RawDescriptor =
            serde_json::from_str(raw).map_err(|source| ConfigError::Malformed { source })?;
        Self::from_raw(document)
    }

    /// Validate an already-deserialised document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending key.
    pub fn from_raw(raw: RawDescriptor) -> ConfigResult<Self> {
        validate_id(&raw.id)?;
        require_non_empty("name", &raw.name)?;
        validate_unit_name(&raw.unit_name)?;
        let content_ref = raw
            .content_ref
            .as_deref()
            .map(ContentRef::decode)
            .transpose()?;
        let install_dir = require_absolute("installDir", &raw.install_dir)?;
        let executable_path = require_absolute("executablePath", &raw.executable_path)?;
        let working_directory = raw
            .working_directory
            .as_deref()
            .map(|value| require_absolute("workingDirectory", value))
            .transpose()?;
        let config_file_path = optional_path("configFilePath", raw.config_file_path.as_deref())?;
        let log_dir = optional_path("logDir", raw.log_dir.as_deref())?;
        require_non_empty("user", &raw.user)?;
        if let Some(group) = raw.group.as_deref() {
            require_non_empty("group", group)?;
        }
        for key in raw.environment.keys() {
            validate_environment_key(key)?;
        }
        let ports = validate_ports(&raw.ports)?;
        for pattern in &raw.clean_paths {
            require_non_empty("cleanPaths", pattern)?;
        }

        Ok(Self {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            unit_name: raw.unit_name,
            content_ref,
            install_dir,
            executable_path,
            working_directory,
            config_file_path,
            log_dir,
            user: raw.user,
            group: raw.group,
            arguments: raw.arguments,
            environment: raw.environment,
            ports,
            clean_paths: raw.clean_paths,
        })
    }

    /// Unique identifier used as lookup key and CLI argument.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Supervisor unit name.
    #[must_use]
    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Content reference, absent when content is not externally managed.
    #[must_use]
    pub const fn content_ref(&self) -> Option<&ContentRef> {
        self.content_ref.as_ref()
    }

    /// Installation directory.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Server executable.
    #[must_use]
    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    /// Declared working directory, if any.
    #[must_use]
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Working directory the server is started in (`installDir` unless declared).
    #[must_use]
    pub fn effective_working_directory(&self) -> &Path {
        self.working_directory
            .as_deref()
            .unwrap_or(&self.install_dir)
    }

    /// Game configuration file.
    #[must_use]
    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    /// Game log directory.
    #[must_use]
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Account the server runs as.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Group the server runs as (the user name unless declared).
    #[must_use]
    pub fn effective_group(&self) -> &str {
        self.group.as_deref().unwrap_or(&self.user)
    }

    /// Command-line arguments in declaration order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Environment variables, ordered by key.
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Ports in declaration order.
    #[must_use]
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Unexpanded clean patterns.
    #[must_use]
    pub fn clean_paths(&self) -> &[String] {
        &self.clean_paths
    }
}

fn optional_path(field: &'static str, value: Option<&str>) -> ConfigResult<Option<PathBuf>> {
    value
        .map(|value| {
            require_non_empty(field, value)?;
            Ok(PathBuf::from(value))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn valheim() -> serde_json::Value {
        json!({
            "id": "valheim",
            "name": "Valheim",
            "description": "Dedicated Valheim server",
            "unitName": "valheim-server",
            "contentRef": "896660",
            "installDir": "/srv/games/valheim",
            "executablePath": "/srv/games/valheim/valheim_server.x86_64",
            "user": "gameserver",
            "arguments": ["-name", "Midgard", "-port", "2456"],
            "environment": { "SteamAppId": "892970" },
            "ports": [2456, 2457],
            "cleanPaths": ["~/.config/unity3d/IronGate/Valheim"]
        })
    }

    #[test]
    fn content_ref_decodes_all_forms() -> Result<()> {
        let plain = ContentRef::decode("294420")?;
        assert_eq!(plain.app_id(), "294420");
        assert_eq!(plain.branch(), "stable");
        assert_eq!(plain.password(), None);

        let full = ContentRef::decode("294420_experimental_secret")?;
        assert_eq!(full.branch(), "experimental");
        assert_eq!(full.password(), Some("secret"));

        let underscored = ContentRef::decode("294420_beta_pa_ss")?;
        assert_eq!(underscored.password(), Some("pa_ss"));
        Ok(())
    }

    #[test]
    fn content_ref_rejects_malformed_strings() {
        for encoded in ["", "abc", "294420_", "294420__pw", "294420_beta_", "_beta"] {
            assert!(
                ContentRef::decode(encoded).is_err(),
                "expected '{encoded}' to be rejected"
            );
        }
    }

    #[test]
    fn content_ref_round_trips_through_encoding() -> Result<()> {
        let cases = [
            ContentRef::new("105600", "stable", None)?,
            ContentRef::new("105600", "experimental", None)?,
            ContentRef::new("105600", "stable", Some("pw".to_string()))?,
            ContentRef::new("105600", "beta", Some("with_underscores".to_string()))?,
        ];
        for case in cases {
            assert_eq!(ContentRef::decode(&case.encode())?, case);
        }
        assert_eq!(ContentRef::decode("105600_stable")?.encode(), "105600");
        Ok(())
    }

    #[test]
    fn content_ref_redacts_password() -> Result<()> {
        let reference = ContentRef::decode("294420_experimental_hunter2")?;
        assert_eq!(reference.to_string(), "294420_experimental_***");
        assert!(!format!("{reference:?}").contains("hunter2"));
        Ok(())
    }

    #[test]
    fn descriptor_applies_defaults() -> Result<()> {
        let descriptor = ServiceDescriptor::parse(&valheim().to_string())?;
        assert_eq!(descriptor.id(), "valheim");
        assert_eq!(descriptor.effective_group(), "gameserver");
        assert_eq!(
            descriptor.effective_working_directory(),
            Path::new("/srv/games/valheim")
        );
        assert_eq!(descriptor.ports(), &[2456, 2457]);
        assert_eq!(
            descriptor.content_ref().map(ContentRef::app_id),
            Some("896660")
        );
        Ok(())
    }

    #[test]
    fn descriptor_without_content_ref_or_ports() -> Result<()> {
        let mut doc = valheim();
        if let Some(map) = doc.as_object_mut() {
            map.remove("contentRef");
            map.remove("ports");
        }
        let descriptor = ServiceDescriptor::parse(&doc.to_string())?;
        assert!(descriptor.content_ref().is_none());
        assert!(descriptor.ports().is_empty());
        Ok(())
    }

    #[test]
    fn descriptor_rejects_missing_and_mistyped_fields() {
        let mut missing = valheim();
        if let Some(map) = missing.as_object_mut() {
            map.remove("installDir");
        }
        let err = ServiceDescriptor::parse(&missing.to_string());
        assert!(
            matches!(&err, Err(ConfigError::Malformed { source }) if source.to_string().contains("installDir"))
        );

        let mut mistyped = valheim();
        mistyped["ports"] = json!("2456");
        assert!(matches!(
            ServiceDescriptor::parse(&mistyped.to_string()),
            Err(ConfigError::Malformed { .. })
        ));

        let mut unknown = valheim();
        unknown["autostart"] = json!(true);
        assert!(matches!(
            ServiceDescriptor::parse(&unknown.to_string()),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn descriptor_reports_offending_field() {
        let mut relative = valheim();
        relative["executablePath"] = json!("valheim_server.x86_64");
        assert!(matches!(
            ServiceDescriptor::parse(&relative.to_string()),
            Err(ConfigError::InvalidField {
                field: "executablePath",
                ..
            })
        ));

        let mut bad_ref = valheim();
        bad_ref["contentRef"] = json!("valheim_beta");
        assert!(matches!(
            ServiceDescriptor::parse(&bad_ref.to_string()),
            Err(ConfigError::InvalidField {
                field: "contentRef",
                ..
            })
        ));

        let mut bad_port = valheim();
        bad_port["ports"] = json!([2456, 70_000]);
        assert!(matches!(
            ServiceDescriptor::parse(&bad_port.to_string()),
            Err(ConfigError::InvalidField { field: "ports", .. })
        ));
    }
}

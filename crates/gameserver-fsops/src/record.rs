//! Completion record persistence.
//!
//! # Design
//! - The record lives at `<installDir>/.fetch-completed` and is always rewritten wholesale.
//! - Writes go to a sibling temporary file that is synced and renamed into place.
//! - Reads never fail: anything that is not a complete, well-formed record is `Corrupt`.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gameserver_config::ContentRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FsOpsError, FsOpsResult};
use crate::stats::{ContentStats, format_size};

/// File name of the completion record inside an install directory.
pub const RECORD_FILE_NAME: &str = ".fetch-completed";
const RECORD_TEMP_NAME: &str = ".fetch-completed.tmp";

/// Outcome stored in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// The fetch completed.
    Success,
    /// The fetch failed.
    Failed,
}

impl RecordStatus {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Validation state of the fetched content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    /// The downloader validated the content.
    Passed,
    /// No validation information.
    Unknown,
}

impl Validation {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Unknown => "unknown",
        }
    }
}

/// Persisted evidence that a fetch for a specific content reference finished.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompletionRecord {
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
    /// Encoded content reference that produced this record.
    pub declared_content_ref: String,
    /// Application id of the fetched content.
    pub app_id: String,
    /// Branch of the fetched content.
    pub branch: String,
    /// Fetch outcome.
    pub status: RecordStatus,
    /// Install directory at write time.
    pub install_dir: PathBuf,
    /// Number of regular files under the install directory.
    pub file_count: u64,
    /// Human-readable total size.
    pub total_size_human: String,
    /// Validation state.
    pub validation: Validation,
    /// Last update time; equals `recorded_at` at write time.
    pub last_updated: DateTime<Utc>,
}

impl CompletionRecord {
    /// Build a success record for `reference` fetched into `install_dir`.
    #[must_use]
    pub fn success(
        reference: &ContentRef,
        install_dir: &Path,
        stats: ContentStats,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            recorded_at,
            declared_content_ref: reference.encode(),
            app_id: reference.app_id().to_string(),
            branch: reference.branch().to_string(),
            status: RecordStatus::Success,
            install_dir: install_dir.to_path_buf(),
            file_count: stats.file_count,
            total_size_human: format_size(stats.total_bytes),
            validation: Validation::Passed,
            last_updated: recorded_at,
        }
    }

    /// Decode the declared content reference.
    ///
    /// # Errors
    ///
    /// Returns the decoding failure when the stored string is not a valid reference.
    pub fn declared_reference(&self) -> gameserver_config::ConfigResult<ContentRef> {
        ContentRef::decode(&self.declared_content_ref)
    }
}

impl fmt::Debug for CompletionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let declared = self.declared_reference().map_or_else(
            |_| "<invalid>".to_string(),
            |reference| reference.redacted(),
        );
        f.debug_struct("CompletionRecord")
            .field("recorded_at", &self.recorded_at)
            .field("declared_content_ref", &declared)
            .field("app_id", &self.app_id)
            .field("branch", &self.branch)
            .field("status", &self.status)
            .field("install_dir", &self.install_dir)
            .field("file_count", &self.file_count)
            .field("total_size_human", &self.total_size_human)
            .field("validation", &self.validation)
            .field("last_updated", &self.last_updated)
            .finish()
    }
}

/// What was found at the record location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    /// No record file.
    Absent,
    /// A record file exists but cannot be trusted.
    Corrupt {
        /// Why the record was rejected.
        reason: String,
    },
    /// A well-formed record.
    Present(CompletionRecord),
}

/// Path of the record for `install_dir`.
#[must_use]
pub fn record_path(install_dir: &Path) -> PathBuf {
    install_dir.join(RECORD_FILE_NAME)
}

/// Read the record stored in `install_dir`.
#[must_use]
pub fn read_record(install_dir: &Path) -> RecordState {
    let path = record_path(install_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return RecordState::Absent,
        Err(err) => {
            return RecordState::Corrupt {
                reason: format!("unreadable: {err}"),
            };
        }
    };
    let record: CompletionRecord = match serde_json::from_str(&raw) {
        Ok(record) => record,
        Err(err) => {
            return RecordState::Corrupt {
                reason: format!("malformed: {err}"),
            };
        }
    };
    if let Err(err) = record.declared_reference() {
        return RecordState::Corrupt {
            reason: format!("declaredContentRef: {err}"),
        };
    }
    RecordState::Present(record)
}

/// Atomically persist `record` into `install_dir`.
///
/// # Errors
///
/// Returns [`FsOpsError`] when serialization, the temporary write, or the rename fails.
pub fn write_record(install_dir: &Path, record: &CompletionRecord) -> FsOpsResult<()> {
    let target = record_path(install_dir);
    let temp = install_dir.join(RECORD_TEMP_NAME);
    let serialised = serde_json::to_string_pretty(record)
        .map_err(|source| FsOpsError::json("record.serialize", &target, source))?;

    let mut file =
        File::create(&temp).map_err(|source| FsOpsError::io("record.create_temp", &temp, source))?;
    file.write_all(serialised.as_bytes())
        .and_then(|()| file.write_all(b"\n"))
        .and_then(|()| file.sync_all())
        .map_err(|source| FsOpsError::io("record.write_temp", &temp, source))?;
    drop(file);

    fs::rename(&temp, &target).map_err(|source| FsOpsError::io("record.rename", &target, source))?;
    debug!(path = %target.display(), "completion record written");
    Ok(())
}

/// Remove the record (and any leftover temporary file) from `install_dir`.
///
/// Returns whether a record was present.
///
/// # Errors
///
/// Returns [`FsOpsError::Io`] for failures other than the file being absent.
pub fn erase_record(install_dir: &Path) -> FsOpsResult<bool> {
    remove_if_present(&install_dir.join(RECORD_TEMP_NAME))?;
    let removed = remove_if_present(&record_path(install_dir))?;
    if removed {
        debug!(install_dir = %install_dir.display(), "completion record erased");
    }
    Ok(removed)
}

fn remove_if_present(path: &Path) -> FsOpsResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(FsOpsError::io("record.erase", path, source)),
    }
}

//! Download-state evaluation.
//!
//! # Design
//! - The decision is a pure function of the descriptor, the force flag, and the record file.
//! - Rules apply in a fixed precedence; the first match wins.
//! - Corrupt records are a fetch reason, never an error.

use gameserver_config::ServiceDescriptor;
use gameserver_fsops::{CompletionRecord, RecordState, RecordStatus, read_record};
use serde::Serialize;
use tracing::debug;

/// Why content must be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchReason {
    /// No completion record exists.
    NeverFetched,
    /// The operator forced a fetch.
    Forced,
    /// The record was produced for a different content reference.
    ContentRefChanged,
    /// The last recorded fetch failed.
    PreviousFailure,
    /// The record could not be parsed.
    CorruptRecord,
}

impl FetchReason {
    /// Stable reason string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NeverFetched => "never-fetched",
            Self::Forced => "forced",
            Self::ContentRefChanged => "content-ref-changed",
            Self::PreviousFailure => "previous-failure",
            Self::CorruptRecord => "corrupt-record",
        }
    }
}

/// Outcome of evaluating a descriptor's installed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadDecision {
    /// The descriptor declares no content reference.
    NotApplicable,
    /// The record matches the declared reference.
    UpToDate(CompletionRecord),
    /// Content must be fetched.
    NeedsFetch(FetchReason),
}

impl DownloadDecision {
    /// Short label used by status listings.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotApplicable => "n/a",
            Self::UpToDate(_) => "success",
            Self::NeedsFetch(FetchReason::NeverFetched) => "not-downloaded",
            Self::NeedsFetch(FetchReason::Forced) => "forced",
            Self::NeedsFetch(FetchReason::ContentRefChanged) => "stale",
            Self::NeedsFetch(FetchReason::PreviousFailure) => "failed",
            Self::NeedsFetch(FetchReason::CorruptRecord) => "corrupt",
        }
    }

    /// Whether the planner may start the game without fetching.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::NotApplicable | Self::UpToDate(_))
    }
}

/// Decide whether `descriptor`'s content must be fetched.
#[must_use]
pub fn evaluate(descriptor: &ServiceDescriptor, force: bool) -> DownloadDecision {
    let Some(declared) = descriptor.content_ref() else {
        return DownloadDecision::NotApplicable;
    };
    if force {
        return DownloadDecision::NeedsFetch(FetchReason::Forced);
    }
    let record = match read_record(descriptor.install_dir()) {
        RecordState::Absent => return DownloadDecision::NeedsFetch(FetchReason::NeverFetched),
        RecordState::Corrupt { reason } => {
            debug!(id = descriptor.id(), %reason, "completion record rejected");
            return DownloadDecision::NeedsFetch(FetchReason::CorruptRecord);
        }
        RecordState::Present(record) => record,
    };
    match record.declared_reference() {
        Ok(recorded) if recorded == *declared => {}
        Ok(_) => return DownloadDecision::NeedsFetch(FetchReason::ContentRefChanged),
        Err(_) => return DownloadDecision::NeedsFetch(FetchReason::CorruptRecord),
    }
    if record.status != RecordStatus::Success {
        return DownloadDecision::NeedsFetch(FetchReason::PreviousFailure);
    }
    DownloadDecision::UpToDate(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_every_state() {
        assert_eq!(DownloadDecision::NotApplicable.label(), "n/a");
        assert_eq!(
            DownloadDecision::NeedsFetch(FetchReason::NeverFetched).label(),
            "not-downloaded"
        );
        assert_eq!(
            DownloadDecision::NeedsFetch(FetchReason::ContentRefChanged).label(),
            "stale"
        );
        assert_eq!(
            DownloadDecision::NeedsFetch(FetchReason::CorruptRecord).label(),
            "corrupt"
        );
        assert!(DownloadDecision::NotApplicable.is_ready());
        assert!(!DownloadDecision::NeedsFetch(FetchReason::Forced).is_ready());
    }

    #[test]
    fn reasons_serialize_as_kebab_case() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&FetchReason::ContentRefChanged)?,
            "\"content-ref-changed\""
        );
        assert_eq!(FetchReason::PreviousFailure.as_str(), "previous-failure");
        Ok(())
    }
}

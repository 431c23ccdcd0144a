//! Step-by-step reports of executed plans.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decision::FetchReason;

/// Operator-requested operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Fetch or refresh content.
    Update,
    /// Launch the game.
    Start,
    /// Stop the game.
    Stop,
    /// Stop, settle, and start.
    Restart,
    /// Remove installed content and optionally user data.
    Clean,
}

impl Operation {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Clean => "clean",
        }
    }
}

/// A single effect executed by a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Evaluate the download state.
    Evaluate,
    /// Delete the previous completion record.
    EraseRecord,
    /// Create the install directory.
    PrepareInstallDir,
    /// Invoke the downloader.
    Fetch,
    /// Patch executable interpreters.
    FixInterpreters,
    /// Count and size installed files.
    Measure,
    /// Persist the new completion record.
    WriteRecord,
    /// Check that the executable exists.
    CheckExecutable,
    /// Query whether the unit is active.
    CheckActive,
    /// Launch the transient unit.
    RunUnit,
    /// Stop the unit.
    StopUnit,
    /// Wait between stop and start.
    Settle,
    /// Remove the install directory.
    RemoveInstallDir,
    /// Remove expanded user data paths.
    RemoveUserData,
}

impl StepKind {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::EraseRecord => "erase_record",
            Self::PrepareInstallDir => "prepare_install_dir",
            Self::Fetch => "fetch",
            Self::FixInterpreters => "fix_interpreters",
            Self::Measure => "measure",
            Self::WriteRecord => "write_record",
            Self::CheckExecutable => "check_executable",
            Self::CheckActive => "check_active",
            Self::RunUnit => "run_unit",
            Self::StopUnit => "stop_unit",
            Self::Settle => "settle",
            Self::RemoveInstallDir => "remove_install_dir",
            Self::RemoveUserData => "remove_user_data",
        }
    }
}

/// Whether a step ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step ran to completion.
    Completed,
    /// The step had nothing to do or was declined.
    Skipped,
}

impl StepStatus {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Step kind.
    pub kind: StepKind,
    /// Step status.
    pub status: StepStatus,
    /// Free-form detail.
    pub detail: Option<String>,
}

/// What happened to one user data target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RemovalResult {
    /// The path was removed.
    Removed,
    /// Removal failed.
    Failed {
        /// Diagnostic.
        message: String,
    },
    /// The path matched but is protected.
    Refused {
        /// Why.
        reason: String,
    },
    /// The pattern could not be expanded.
    Rejected {
        /// Why.
        reason: String,
    },
}

/// Per-target outcome of user data removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    /// Path or pattern the outcome refers to.
    pub target: String,
    /// What happened.
    #[serde(flatten)]
    pub result: RemovalResult,
}

/// Final state reached by a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanOutcome {
    /// Content already matched the declaration.
    UpToDate {
        /// When the content was last updated.
        last_updated: DateTime<Utc>,
    },
    /// Content was fetched and recorded.
    Fetched {
        /// Why the fetch ran.
        reason: FetchReason,
        /// Files recorded.
        file_count: u64,
        /// Size recorded.
        total_size_human: String,
    },
    /// The unit was launched.
    Started,
    /// The unit was stopped.
    Stopped,
    /// The unit was not running.
    AlreadyStopped,
    /// The unit was stopped if needed and launched again.
    Restarted {
        /// Whether the unit was active before the restart.
        was_active: bool,
    },
    /// Clean finished.
    Cleaned {
        /// Whether the install directory was removed.
        install_dir_removed: bool,
        /// Per-target user data outcomes.
        user_data: Vec<RemovalOutcome>,
    },
}

/// Report of an executed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    /// Operation requested.
    pub operation: Operation,
    /// Game id.
    pub game: String,
    /// Unit name.
    pub unit: String,
    /// Steps in execution order.
    pub steps: Vec<StepRecord>,
    /// Final state.
    pub outcome: PlanOutcome,
}

impl PlanReport {
    /// Status of the first step of `kind`.
    #[must_use]
    pub fn step_status(&self, kind: StepKind) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|step| step.kind == kind)
            .map(|step| step.status)
    }

    /// Kinds of the completed steps, in order.
    #[must_use]
    pub fn completed_kinds(&self) -> Vec<StepKind> {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .map(|step| step.kind)
            .collect()
    }
}

/// Accumulates steps while a plan runs.
#[derive(Debug, Default)]
pub(crate) struct StepLog {
    steps: Vec<StepRecord>,
}

impl StepLog {
    pub(crate) fn completed(&mut self, kind: StepKind, detail: Option<String>) {
        tracing::info!(step = kind.as_str(), detail = detail.as_deref(), "step completed");
        self.steps.push(StepRecord {
            kind,
            status: StepStatus::Completed,
            detail,
        });
    }

    pub(crate) fn skipped(&mut self, kind: StepKind, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::info!(step = kind.as_str(), detail = %detail, "step skipped");
        self.steps.push(StepRecord {
            kind,
            status: StepStatus::Skipped,
            detail: Some(detail),
        });
    }

    pub(crate) fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }
}

/// Displayable path for outcomes.
pub(crate) fn display_path(path: &Path) -> String {
    path.display().to_string()
}

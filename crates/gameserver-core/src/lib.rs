//! Download-state reconciliation and action planning for declared game services.
//!
//! The evaluator decides whether installed content matches a descriptor; the planner turns
//! an operator request into ordered collaborator calls and record mutations, reporting each
//! step it took.
#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

pub mod collaborators;
pub mod decision;
pub mod error;
pub mod plan;
pub mod planner;

pub use collaborators::{
    ConfirmRequest, Confirmer, ContentDownloader, FetchRequest, LogOptions, LogStream, StopResult,
    Supervisor, TransientUnit,
};
pub use decision::{DownloadDecision, FetchReason, evaluate};
pub use error::{CollaboratorError, CoreError, CoreResult, PreconditionError, error_chain};
pub use plan::{Operation, PlanOutcome, PlanReport, RemovalOutcome, RemovalResult, StepKind, StepRecord, StepStatus};
pub use planner::ActionPlanner;

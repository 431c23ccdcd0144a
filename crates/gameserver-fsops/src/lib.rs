//! Filesystem operations behind the update and clean plans.
//!
//! # Design
//! - `record` owns the `.fetch-completed` file: atomic writes, tolerant reads, idempotent erase.
//! - `stats` measures installed content for records and disk reports.
//! - `interpreter` patches downloaded executables to the host dynamic loader.
//! - `cleanup` expands `cleanPaths` patterns and removes paths.
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

pub mod cleanup;
pub mod error;
pub mod interpreter;
pub mod record;
pub mod stats;

pub use cleanup::{CleanCandidate, expand_clean_paths, remove_path};
pub use error::{FsOpsError, FsOpsResult};
pub use interpreter::{FixupReport, discover_loader, fix_interpreters};
pub use record::{
    CompletionRecord, RECORD_FILE_NAME, RecordState, RecordStatus, Validation, erase_record,
    read_record, write_record,
};
pub use stats::{ContentStats, format_size, measure};

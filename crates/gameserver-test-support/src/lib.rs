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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (descriptor builders, temp dirs, records), fakes.rs (scripted collaborators).

pub mod fakes;
pub mod fixtures;

pub use fakes::{FakeDownloader, FakeSupervisor, FetchOutcome, ScriptedConfirm, SupervisorCall};
pub use fixtures::{DescriptorFixture, dynamic_elf_stub, temp_dir, write_record_for};

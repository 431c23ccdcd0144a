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
#![allow(clippy::module_name_repetitions, clippy::redundant_pub_crate)]

//! Operator CLI for game servers declared in a descriptor registry.
//!
//! Layout:
//! - `cli.rs`: argument parsing, host settings assembly, and command dispatch
//! - `context.rs`: shared context, collaborators, and the exit-code error type
//! - `commands/`: command handlers grouped by concern
//! - `output.rs`: views and their table/JSON renderers
//! - `prompt.rs`: operator confirmation on the terminal
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod commands;
pub(crate) mod context;
pub(crate) mod output;
pub(crate) mod prompt;

pub use cli::run;

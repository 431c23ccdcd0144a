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

//! Declarative game service descriptors and the registry that indexes them.
//!
//! Layout: `model.rs` (typed descriptor and content reference), `validate.rs`
//! (field-level parsing rules), `loader.rs` (directory scan + lookup),
//! `host.rs` (explicit host settings), `defaults.rs` (shared constants).

pub mod defaults;
pub mod error;
pub mod host;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult, LookupError, RegistryLoadCause, RegistryLoadError};
pub use host::HostSettings;
pub use loader::{Registry, RegistryLoad, load_all};
pub use model::{ContentRef, RawDescriptor, ServiceDescriptor};

//! Host collaborators: systemd supervision, SteamCMD downloads, and listening-port probes.
//!
//! # Design
//! - Each collaborator shells out to the host tool and maps failures onto `CollaboratorError`.
//! - Argument construction is kept in pure functions so command lines are unit tested.
//! - Supervisor commands optionally run through `sudo`.
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

mod command;
pub mod ports;
pub mod steamcmd;
pub mod systemd;

pub use ports::{PortSnapshot, PortState, probe_listening_ports};
pub use steamcmd::SteamCmdDownloader;
pub use systemd::SystemdSupervisor;

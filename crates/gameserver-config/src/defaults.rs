//! Shared defaults for descriptors, host settings, and presentation.
//!
//! # Design
//! - Keep every literal the registry and planner agree on in one place.

/// Branch assumed when a content reference does not name one.
pub const DEFAULT_BRANCH: &str = "stable";
/// File extension of descriptor files inside the registry directory.
pub const DESCRIPTOR_EXTENSION: &str = "json";
/// Registry directory name relative to the operator's home.
pub const DEFAULT_REGISTRY_SUBDIR: &str = "services";
/// Seconds to wait between stop and start during a restart.
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 2;
/// Program name of the content downloader.
pub const DEFAULT_STEAMCMD_PROGRAM: &str = "steamcmd";
/// Program used to rewrite the ELF interpreter of downloaded executables.
pub const DEFAULT_PATCHELF_PROGRAM: &str = "patchelf";
/// Journal lines shown by `logs` when no count is requested.
pub const DEFAULT_LOG_LINES: u32 = 50;
/// Lowest port of the conventional game port range.
pub const GAME_PORT_RANGE_START: u16 = 26_000;
/// Highest port of the conventional game port range.
pub const GAME_PORT_RANGE_END: u16 = 28_000;

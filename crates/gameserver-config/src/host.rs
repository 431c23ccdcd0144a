//! Explicit host settings threaded through loader and planner entry points.
//!
//! # Design
//! - Assembled once at the binary edge; deep call paths never read the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::defaults::{
    DEFAULT_PATCHELF_PROGRAM, DEFAULT_REGISTRY_SUBDIR, DEFAULT_SETTLE_DELAY_SECS,
    DEFAULT_STEAMCMD_PROGRAM,
};

/// Host-level configuration for one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    /// Directory scanned for descriptor files.
    pub registry_dir: PathBuf,
    /// Home directory used to expand `~` in clean patterns.
    pub home_dir: PathBuf,
    /// Delay observed between stop and start during a restart.
    pub settle_delay: Duration,
    /// Whether supervisor commands are prefixed with `sudo`.
    pub use_sudo: bool,
    /// Downloader program.
    pub steamcmd_program: PathBuf,
    /// Whether downloaded executables get their interpreter patched.
    pub interpreter_fixup: bool,
    /// Program used for the interpreter fix-up.
    pub patchelf_program: PathBuf,
    /// Loader the fix-up targets; discovered on the host when unset.
    pub dynamic_loader: Option<PathBuf>,
}

impl HostSettings {
    /// Settings rooted at `home_dir` with every other value defaulted.
    #[must_use]
    pub fn for_home(home_dir: impl Into<PathBuf>) -> Self {
        let home_dir = home_dir.into();
        Self {
            registry_dir: home_dir.join(DEFAULT_REGISTRY_SUBDIR),
            home_dir,
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
            use_sudo: true,
            steamcmd_program: PathBuf::from(DEFAULT_STEAMCMD_PROGRAM),
            interpreter_fixup: true,
            patchelf_program: PathBuf::from(DEFAULT_PATCHELF_PROGRAM),
            dynamic_loader: None,
        }
    }

    /// Override the registry directory.
    #[must_use]
    pub fn with_registry_dir(mut self, registry_dir: impl Into<PathBuf>) -> Self {
        self.registry_dir = registry_dir.into();
        self
    }

    /// Override the restart settle delay.
    #[must_use]
    pub const fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Registry directory.
    #[must_use]
    pub fn registry_dir(&self) -> &Path {
        &self.registry_dir
    }
}

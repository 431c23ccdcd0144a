//! Content measurement for install directories.

use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};
use crate::record::RECORD_FILE_NAME;

const SIZE_UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];

/// File count and byte total of an install directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentStats {
    /// Regular files found.
    pub file_count: u64,
    /// Sum of their sizes in bytes.
    pub total_bytes: u64,
}

/// Walk `root` recursively and total its regular files, excluding the completion record.
///
/// Entries that cannot be read below the root are skipped with a warning.
///
/// # Errors
///
/// Returns [`FsOpsError::Walkdir`] when `root` itself cannot be read.
pub fn measure(root: &Path) -> FsOpsResult<ContentStats> {
    let record = root.join(RECORD_FILE_NAME);
    let mut stats = ContentStats::default();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(FsOpsError::walkdir("stats.measure", root, err));
            }
            Err(err) => {
                warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.path() == record {
            continue;
        }
        match entry.metadata() {
            Ok(metadata) => {
                stats.file_count = stats.file_count.saturating_add(1);
                stats.total_bytes = stats.total_bytes.saturating_add(metadata.len());
            }
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "skipping file without metadata");
            }
        }
    }
    Ok(stats)
}

/// Render a byte count with one decimal and a base-1024 unit suffix.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in SIZE_UNITS {
        if value < 1024.0 {
            return format!("{value:.1}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}P")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(0), "0.0B");
        assert_eq!(format_size(1023), "1023.0B");
        assert_eq!(format_size(1024), "1.0K");
        assert_eq!(format_size(1536), "1.5K");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0G");
        assert_eq!(format_size(u64::MAX), "16384.0P");
    }

    #[test]
    fn measurement_is_recursive_and_skips_the_record() -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("gameserver-stats-")
            .tempdir()?;
        fs::write(dir.path().join("server"), vec![0_u8; 100])?;
        fs::create_dir_all(dir.path().join("data/maps"))?;
        fs::write(dir.path().join("data/maps/one.map"), vec![0_u8; 50])?;
        fs::write(dir.path().join(RECORD_FILE_NAME), "{}")?;

        let stats = measure(dir.path())?;
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_bytes, 150);
        Ok(())
    }

    #[test]
    fn missing_root_is_an_error() -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("gameserver-stats-")
            .tempdir()?;
        assert!(measure(&dir.path().join("absent")).is_err());
        Ok(())
    }
}

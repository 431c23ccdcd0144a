//! Expansion and removal of clean targets.
//!
//! # Design
//! - Expansion runs only when the clean plan asks for user data.
//! - `~` resolves against the configured home directory, never the process environment.
//! - Glob patterns are matched with `literal_separator`, walking from their literal prefix.
//! - Expansions that would remove `/` or the home directory are refused.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

const GLOB_TOKENS: [char; 4] = ['*', '?', '[', '{'];

/// One result of expanding the `cleanPaths` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanCandidate {
    /// An existing path eligible for removal.
    Existing(PathBuf),
    /// A path that matched but must never be removed.
    Refused {
        /// Offending path.
        path: PathBuf,
        /// Why it was refused.
        reason: &'static str,
    },
    /// A pattern that could not be expanded.
    Rejected {
        /// Pattern as declared.
        pattern: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Expand `patterns` against the filesystem.
///
/// Existing paths are returned deduplicated and sorted; a path whose ancestor also matched
/// is dropped. Patterns matching nothing contribute nothing.
#[must_use]
pub fn expand_clean_paths(patterns: &[String], home: &Path) -> Vec<CleanCandidate> {
    let mut rejected = Vec::new();
    let mut refused = Vec::new();
    let mut matched = BTreeSet::new();

    for pattern in patterns {
        let expanded = expand_home(pattern, home);
        if !expanded.is_absolute() {
            rejected.push(CleanCandidate::Rejected {
                pattern: pattern.clone(),
                reason: "pattern must be absolute or home-relative",
            });
            continue;
        }
        if expanded
            .components()
            .any(|component| component == Component::ParentDir)
        {
            rejected.push(CleanCandidate::Rejected {
                pattern: pattern.clone(),
                reason: "pattern must not contain '..'",
            });
            continue;
        }

        let paths = if has_glob(&expanded) {
            match glob_matches(&expanded) {
                Ok(paths) => paths,
                Err(reason) => {
                    rejected.push(CleanCandidate::Rejected {
                        pattern: pattern.clone(),
                        reason,
                    });
                    continue;
                }
            }
        } else if fs::symlink_metadata(&expanded).is_ok() {
            vec![expanded]
        } else {
            Vec::new()
        };

        for path in paths {
            if path == Path::new("/") {
                refused.push(CleanCandidate::Refused {
                    path,
                    reason: "refusing to remove the filesystem root",
                });
            } else if path == home {
                refused.push(CleanCandidate::Refused {
                    path,
                    reason: "refusing to remove the home directory",
                });
            } else {
                matched.insert(path);
            }
        }
    }

    let mut kept: Vec<PathBuf> = Vec::new();
    for path in matched {
        if kept.iter().any(|ancestor| path.starts_with(ancestor)) {
            continue;
        }
        kept.push(path);
    }

    debug!(
        existing = kept.len(),
        refused = refused.len(),
        rejected = rejected.len(),
        "clean paths expanded"
    );
    kept.into_iter()
        .map(CleanCandidate::Existing)
        .chain(refused)
        .chain(rejected)
        .collect()
}

fn expand_home(pattern: &str, home: &Path) -> PathBuf {
    if pattern == "~" {
        return home.to_path_buf();
    }
    match pattern.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(pattern),
    }
}

fn has_glob(path: &Path) -> bool {
    path.to_string_lossy().contains(GLOB_TOKENS)
}

fn glob_matches(pattern: &Path) -> Result<Vec<PathBuf>, &'static str> {
    let text = pattern.to_str().ok_or("pattern is not valid UTF-8")?;
    let matcher: GlobMatcher = GlobBuilder::new(text)
        .literal_separator(true)
        .build()
        .map_err(|_| "invalid glob pattern")?
        .compile_matcher();

    let mut base = PathBuf::new();
    let mut remaining = Vec::new();
    for component in pattern.components() {
        let part = component.as_os_str().to_string_lossy();
        if remaining.is_empty() && !part.contains(GLOB_TOKENS) {
            base.push(component);
        } else {
            remaining.push(part.into_owned());
        }
    }

    let mut walker = WalkDir::new(&base).min_depth(1).follow_links(false);
    if !remaining.iter().any(|part| part.contains("**")) {
        walker = walker.max_depth(remaining.len());
    }

    let mut matches = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if matcher.is_match(entry.path()) => matches.push(entry.into_path()),
            Ok(_) => {}
            Err(err) if err.depth() == 0 => break,
            Err(err) => warn!(base = %base.display(), error = %err, "skipping unreadable entry"),
        }
    }
    Ok(matches)
}

/// Remove a file, symlink, or directory tree. Absent paths are not an error.
///
/// # Errors
///
/// Returns [`FsOpsError::Io`] when the removal fails.
pub fn remove_path(path: &Path) -> FsOpsResult<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(FsOpsError::io("clean.stat", path, source)),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FsOpsError::io("clean.remove", path, source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn home() -> Result<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix("gameserver-clean-")
            .tempdir()?)
    }

    fn existing(candidates: &[CleanCandidate]) -> Vec<PathBuf> {
        candidates
            .iter()
            .filter_map(|candidate| match candidate {
                CleanCandidate::Existing(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn home_relative_literal_paths_expand_when_present() -> Result<()> {
        let home = home()?;
        fs::create_dir_all(home.path().join(".config/unity3d/IronGate"))?;

        let candidates = expand_clean_paths(
            &[
                "~/.config/unity3d/IronGate".to_string(),
                "~/.local/share/absent".to_string(),
            ],
            home.path(),
        );
        assert_eq!(
            candidates,
            vec![CleanCandidate::Existing(
                home.path().join(".config/unity3d/IronGate")
            )]
        );
        Ok(())
    }

    #[test]
    fn single_star_does_not_cross_directories() -> Result<()> {
        let home = home()?;
        fs::create_dir_all(home.path().join("saves/world1"))?;
        fs::write(home.path().join("saves/a.sav"), "")?;
        fs::write(home.path().join("saves/world1/b.sav"), "")?;

        let shallow = expand_clean_paths(&["~/saves/*.sav".to_string()], home.path());
        assert_eq!(existing(&shallow), vec![home.path().join("saves/a.sav")]);

        let deep = expand_clean_paths(&["~/saves/**/*.sav".to_string()], home.path());
        assert_eq!(
            existing(&deep),
            vec![
                home.path().join("saves/a.sav"),
                home.path().join("saves/world1/b.sav")
            ]
        );
        Ok(())
    }

    #[test]
    fn nested_matches_collapse_into_their_ancestor() -> Result<()> {
        let home = home()?;
        fs::create_dir_all(home.path().join("Zomboid/Saves"))?;
        let candidates = expand_clean_paths(
            &["~/Zomboid/Saves".to_string(), "~/Zomboid".to_string()],
            home.path(),
        );
        assert_eq!(existing(&candidates), vec![home.path().join("Zomboid")]);
        Ok(())
    }

    #[test]
    fn dangerous_and_relative_patterns_are_not_removed() -> Result<()> {
        let home = home()?;
        let candidates = expand_clean_paths(
            &[
                "~".to_string(),
                "/".to_string(),
                "relative/path".to_string(),
                "~/../escape".to_string(),
                "~/[unclosed".to_string(),
            ],
            home.path(),
        );
        assert!(existing(&candidates).is_empty());
        assert!(candidates.contains(&CleanCandidate::Refused {
            path: home.path().to_path_buf(),
            reason: "refusing to remove the home directory",
        }));
        assert!(candidates.contains(&CleanCandidate::Refused {
            path: PathBuf::from("/"),
            reason: "refusing to remove the filesystem root",
        }));
        let rejected = candidates
            .iter()
            .filter(|candidate| matches!(candidate, CleanCandidate::Rejected { .. }))
            .count();
        assert_eq!(rejected, 3);
        Ok(())
    }

    #[test]
    fn remove_path_handles_files_directories_and_absence() -> Result<()> {
        let home = home()?;
        let file = home.path().join("file.txt");
        let tree = home.path().join("tree/nested");
        fs::write(&file, "x")?;
        fs::create_dir_all(&tree)?;
        fs::write(tree.join("inner"), "y")?;

        remove_path(&file)?;
        remove_path(&home.path().join("tree"))?;
        remove_path(&home.path().join("never-existed"))?;
        assert!(!file.exists());
        assert!(!home.path().join("tree").exists());
        Ok(())
    }
}

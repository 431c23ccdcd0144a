//! Registry loader: scans a directory of descriptor files and indexes them by id.
//!
//! # Design
//! - Non-recursive scan; files are processed in lexicographic filename order.
//! - Symlinked descriptors are followed; a dangling link is reported as an unreadable file.
//! - Each file is parsed independently; failures become `RegistryLoadError` values.
//! - The first declaration of an id wins; later duplicates are reported.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::defaults::DESCRIPTOR_EXTENSION;
use crate::error::{ConfigError, ConfigResult, LookupError, RegistryLoadCause, RegistryLoadError};
use crate::model::ServiceDescriptor;

/// Indexed collection of validated descriptors for one invocation.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    directory: PathBuf,
    descriptors: BTreeMap<String, ServiceDescriptor>,
    sources: BTreeMap<String, PathBuf>,
}

/// Result of a registry scan: usable descriptors plus per-file failures.
#[derive(Debug)]
pub struct RegistryLoad {
    /// Successfully loaded descriptors.
    pub registry: Registry,
    /// Files that were skipped, in processing order.
    pub errors: Vec<RegistryLoadError>,
}

/// Load every descriptor file directly inside `directory`.
///
/// A missing directory yields an empty registry.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the directory exists but cannot be listed.
pub fn load_all(directory: &Path) -> ConfigResult<RegistryLoad> {
    let mut registry = Registry {
        directory: directory.to_path_buf(),
        ..Registry::default()
    };
    let mut errors = Vec::new();

    let files = match descriptor_files(directory) {
        Ok(files) => files,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(directory = %directory.display(), "registry directory not found");
            return Ok(RegistryLoad { registry, errors });
        }
        Err(err) => return Err(ConfigError::io("registry.read_dir", directory, err)),
    };

    for file in files {
        match load_file(&file) {
            Ok(descriptor) => {
                if let Some(first) = registry.sources.get(descriptor.id()) {
                    errors.push(RegistryLoadError {
                        cause: RegistryLoadCause::DuplicateId {
                            id: descriptor.id().to_string(),
                            first: first.clone(),
                        },
                        file,
                    });
                    continue;
                }
                debug!(id = descriptor.id(), file = %file.display(), "descriptor loaded");
                registry
                    .sources
                    .insert(descriptor.id().to_string(), file);
                registry
                    .descriptors
                    .insert(descriptor.id().to_string(), descriptor);
            }
            Err(cause) => {
                warn!(file = %file.display(), error = %cause, "descriptor skipped");
                errors.push(RegistryLoadError { file, cause });
            }
        }
    }

    Ok(RegistryLoad { registry, errors })
}

fn descriptor_files(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();
        let is_descriptor = path
            .extension()
            .is_some_and(|extension| extension == DESCRIPTOR_EXTENSION);
        if is_descriptor && is_descriptor_file(&entry, &path)? {
            files.push(path);
        }
    }
    files.sort_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(files)
}

fn is_descriptor_file(entry: &fs::DirEntry, path: &Path) -> io::Result<bool> {
    let file_type = entry.file_type()?;
    if !file_type.is_symlink() {
        return Ok(file_type.is_file());
    }
    // Dangling links stay in the scan so the read failure lands in the load errors.
    Ok(fs::metadata(path).map_or(true, |metadata| metadata.is_file()))
}

fn load_file(file: &Path) -> Result<ServiceDescriptor, RegistryLoadCause> {
    let raw = fs::read_to_string(file).map_err(RegistryLoadCause::Read)?;
    Ok(ServiceDescriptor::parse(&raw)?)
}

impl Registry {
    /// Resolve a descriptor by id.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] carrying every known id, sorted.
    pub fn lookup(&self, id: &str) -> Result<&ServiceDescriptor, LookupError> {
        self.descriptors
            .get(id)
            .ok_or_else(|| LookupError::NotFound {
                id: id.to_string(),
                known: self.ids().into_iter().map(ToString::to_string).collect(),
            })
    }

    /// Known ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }

    /// Descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.values()
    }

    /// File a descriptor was loaded from.
    #[must_use]
    pub fn source_of(&self, id: &str) -> Option<&Path> {
        self.sources.get(id).map(PathBuf::as_path)
    }

    /// Directory the registry was loaded from.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of loaded descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no descriptor loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

//! Descriptor builders and filesystem fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use gameserver_config::{ContentRef, ServiceDescriptor};
use gameserver_fsops::{CompletionRecord, ContentStats, RecordStatus, write_record};
use serde_json::{Map, Value, json};
use tempfile::TempDir;

/// Create a temporary directory with a recognisable prefix.
///
/// # Errors
///
/// Returns an error when the directory cannot be created.
pub fn temp_dir(prefix: &str) -> Result<TempDir> {
    Ok(tempfile::Builder::new()
        .prefix(&format!("gameserver-{prefix}-"))
        .tempdir()?)
}

/// JSON builder for descriptor documents.
#[derive(Debug, Clone)]
pub struct DescriptorFixture {
    fields: Map<String, Value>,
}

impl DescriptorFixture {
    /// Minimal valid descriptor for `id` installed under `install_dir`.
    #[must_use]
    pub fn new(id: &str, install_dir: &Path) -> Self {
        let mut fields = Map::new();
        fields.insert("id".into(), json!(id));
        fields.insert("name".into(), json!(format!("Game {id}")));
        fields.insert("unitName".into(), json!(format!("{id}-server")));
        fields.insert("installDir".into(), json!(install_dir.display().to_string()));
        fields.insert(
            "executablePath".into(),
            json!(install_dir.join("server").display().to_string()),
        );
        fields.insert("user".into(), json!("gameserver"));
        Self { fields }
    }

    /// Set the encoded content reference.
    #[must_use]
    pub fn content_ref(self, encoded: &str) -> Self {
        self.set("contentRef", json!(encoded))
    }

    /// Set the executable path.
    #[must_use]
    pub fn executable(self, path: &Path) -> Self {
        self.set("executablePath", json!(path.display().to_string()))
    }

    /// Set the clean patterns.
    #[must_use]
    pub fn clean_paths(self, patterns: &[&str]) -> Self {
        self.set("cleanPaths", json!(patterns))
    }

    /// Set an arbitrary field.
    #[must_use]
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Remove a field.
    #[must_use]
    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    /// Serialised document.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    /// Parse into a validated descriptor.
    ///
    /// # Errors
    ///
    /// Returns the validation error when the document is invalid.
    pub fn build(&self) -> Result<ServiceDescriptor> {
        Ok(ServiceDescriptor::parse(&self.to_json())?)
    }

    /// Write the document to `dir/file_name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        let path = dir.join(file_name);
        fs::write(&path, self.to_json())?;
        Ok(path)
    }
}

/// Write a completion record for `encoded` into the descriptor's install directory.
///
/// # Errors
///
/// Returns an error when the reference is invalid or the record cannot be written.
pub fn write_record_for(
    descriptor: &ServiceDescriptor,
    encoded: &str,
    status: RecordStatus,
) -> Result<CompletionRecord> {
    let reference = ContentRef::decode(encoded)?;
    let install_dir = descriptor.install_dir();
    fs::create_dir_all(install_dir)?;
    let mut record = CompletionRecord::success(
        &reference,
        install_dir,
        ContentStats {
            file_count: 1,
            total_bytes: 1024,
        },
        Utc::now(),
    );
    record.status = status;
    write_record(install_dir, &record)?;
    Ok(record)
}

/// Smallest little-endian x86-64 ELF image that requests a program interpreter.
///
/// It has no sections, so `patchelf` refuses it.
#[must_use]
pub fn dynamic_elf_stub() -> Vec<u8> {
    const PT_INTERP: u32 = 3;
    const PHENTSIZE: u16 = 56;
    let mut image = vec![0_u8; 64];
    image[..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    image[4] = 2;
    image[5] = 1;
    image[18..20].copy_from_slice(&62_u16.to_le_bytes());
    image[32..40].copy_from_slice(&64_u64.to_le_bytes());
    image[54..56].copy_from_slice(&PHENTSIZE.to_le_bytes());
    image[56..58].copy_from_slice(&1_u16.to_le_bytes());
    let mut header = vec![0_u8; usize::from(PHENTSIZE)];
    header[..4].copy_from_slice(&PT_INTERP.to_le_bytes());
    image.extend(header);
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_builds_valid_descriptor() -> Result<()> {
        let dir = temp_dir("fixture")?;
        let descriptor = DescriptorFixture::new("valheim", dir.path())
            .content_ref("896660")
            .build()?;
        assert_eq!(descriptor.unit_name(), "valheim-server");
        assert_eq!(descriptor.executable_path(), dir.path().join("server"));
        assert_eq!(
            descriptor.content_ref().map(ContentRef::encode).as_deref(),
            Some("896660")
        );
        Ok(())
    }

    #[test]
    fn elf_stub_requests_an_interpreter() -> Result<()> {
        let dir = temp_dir("fixture")?;
        let path = dir.path().join("server");
        fs::write(&path, dynamic_elf_stub())?;
        assert!(gameserver_fsops::interpreter::is_dynamic_x86_64_elf(&path)?);
        Ok(())
    }

    #[test]
    fn fixture_removal_yields_invalid_descriptor() -> Result<()> {
        let dir = temp_dir("fixture")?;
        assert!(
            DescriptorFixture::new("valheim", dir.path())
                .without("user")
                .build()
                .is_err()
        );
        Ok(())
    }
}

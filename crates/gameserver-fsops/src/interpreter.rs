//! Executable interpreter fix-up for hosts whose dynamic loader is not at the FHS path.
//!
//! # Design
//! - Loader discovery asks `ldd /bin/ls` first, then scans the Nix store.
//! - Only executable regular files directly under the install directory are candidates.
//! - A candidate must be a little-endian x86-64 ELF with a `PT_INTERP` program header.
//! - Every failure is logged and skipped; the fix-up never fails the caller.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

const LOADER_NAME: &str = "ld-linux-x86-64.so.2";
const NIX_STORE: &str = "/nix/store";

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELF_CLASS_64: u8 = 2;
const ELF_DATA_LE: u8 = 1;
const EM_X86_64: u16 = 62;
const PT_INTERP: u32 = 3;
const ELF64_HEADER_LEN: usize = 64;
const MAX_PROGRAM_HEADERS: u16 = 512;

/// Files touched by one fix-up pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixupReport {
    /// Loader the candidates were pointed at.
    pub loader: Option<PathBuf>,
    /// Files successfully patched.
    pub patched: Vec<PathBuf>,
    /// Files `patchelf` rejected, with its diagnostic.
    pub failed: Vec<(PathBuf, String)>,
}

/// Locate the host dynamic loader.
#[must_use]
pub fn discover_loader() -> Option<PathBuf> {
    let from_ldd = Command::new("ldd")
        .arg("/bin/ls")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| parse_ldd_loader(&String::from_utf8_lossy(&output.stdout)))
        .filter(|path| path.exists());
    from_ldd.or_else(|| nix_store_loader(Path::new(NIX_STORE)))
}

/// Extract the loader path from `ldd` output.
#[must_use]
pub fn parse_ldd_loader(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .find(|line| line.contains(LOADER_NAME))
        .and_then(|line| {
            let resolved = line.split_once("=>").map_or(line, |(_, right)| right);
            resolved.split_whitespace().next()
        })
        .filter(|token| token.starts_with('/'))
        .map(PathBuf::from)
}

fn nix_store_loader(store: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(store)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().contains("glibc-"))
        .map(|entry| entry.path().join("lib64").join(LOADER_NAME))
        .collect();
    candidates.sort();
    candidates.into_iter().find(|path| path.exists())
}

/// Point every dynamically linked x86-64 executable directly under `install_dir` at `loader`
/// using the `patchelf` program.
#[must_use]
pub fn fix_interpreters(install_dir: &Path, loader: &Path, patchelf: &Path) -> FixupReport {
    let mut report = FixupReport {
        loader: Some(loader.to_path_buf()),
        ..FixupReport::default()
    };
    let entries = match fs::read_dir(install_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(install_dir = %install_dir.display(), error = %err, "interpreter fix-up skipped");
            return report;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_candidate(path))
        .collect();
    candidates.sort();

    for path in candidates {
        match patch(patchelf, &path, loader) {
            Ok(()) => {
                debug!(path = %path.display(), "interpreter patched");
                report.patched.push(path);
            }
            Err(reason) => {
                warn!(path = %path.display(), reason = %reason, "interpreter patch failed");
                report.failed.push((path, reason));
            }
        }
    }
    info!(
        patched = report.patched.len(),
        failed = report.failed.len(),
        "interpreter fix-up finished"
    );
    report
}

fn is_candidate(path: &Path) -> bool {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return false;
    };
    if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
        return false;
    }
    match is_dynamic_x86_64_elf(path) {
        Ok(dynamic) => dynamic,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "not inspectable as ELF");
            false
        }
    }
}

fn patch(patchelf: &Path, path: &Path, loader: &Path) -> Result<(), String> {
    let output = Command::new(patchelf)
        .arg("--set-interpreter")
        .arg(loader)
        .arg(path)
        .output()
        .map_err(|err| format!("failed to run {}: {err}", patchelf.display()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

/// Whether the file is a little-endian x86-64 ELF that requests a program interpreter.
///
/// # Errors
///
/// Returns IO errors from opening or reading the file.
pub fn is_dynamic_x86_64_elf(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut header = [0_u8; ELF64_HEADER_LEN];
    if read_full(&mut file, &mut header)? < ELF64_HEADER_LEN {
        return Ok(false);
    }
    if header[..4] != ELF_MAGIC || header[4] != ELF_CLASS_64 || header[5] != ELF_DATA_LE {
        return Ok(false);
    }
    if u16::from_le_bytes([header[18], header[19]]) != EM_X86_64 {
        return Ok(false);
    }

    let mut phoff_bytes = [0_u8; 8];
    phoff_bytes.copy_from_slice(&header[32..40]);
    let phoff = u64::from_le_bytes(phoff_bytes);
    let phentsize = u16::from_le_bytes([header[54], header[55]]);
    let phnum = u16::from_le_bytes([header[56], header[57]]);
    if phoff == 0 || phentsize < 4 || phnum > MAX_PROGRAM_HEADERS {
        return Ok(false);
    }

    let mut p_type = [0_u8; 4];
    for index in 0..u64::from(phnum) {
        file.seek(SeekFrom::Start(phoff + index * u64::from(phentsize)))?;
        if read_full(&mut file, &mut p_type)? < p_type.len() {
            return Ok(false);
        }
        if u32::from_le_bytes(p_type) == PT_INTERP {
            return Ok(true);
        }
    }
    Ok(false)
}

fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            read => filled += read,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn elf_image(machine: u16, program_types: &[u32]) -> Vec<u8> {
        let phoff: u64 = 64;
        let phentsize: u16 = 56;
        let mut image = vec![0_u8; 64];
        image[..4].copy_from_slice(&ELF_MAGIC);
        image[4] = ELF_CLASS_64;
        image[5] = ELF_DATA_LE;
        image[18..20].copy_from_slice(&machine.to_le_bytes());
        image[32..40].copy_from_slice(&phoff.to_le_bytes());
        image[54..56].copy_from_slice(&phentsize.to_le_bytes());
        let phnum = u16::try_from(program_types.len()).unwrap_or(u16::MAX);
        image[56..58].copy_from_slice(&phnum.to_le_bytes());
        for p_type in program_types {
            let mut entry = vec![0_u8; usize::from(phentsize)];
            entry[..4].copy_from_slice(&p_type.to_le_bytes());
            image.extend(entry);
        }
        image
    }

    #[test]
    fn ldd_output_yields_loader_path() {
        let fhs = "\tlinux-vdso.so.1 (0x00007ffd)\n\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f)\n\t/lib64/ld-linux-x86-64.so.2 (0x00007f)\n";
        assert_eq!(
            parse_ldd_loader(fhs),
            Some(PathBuf::from("/lib64/ld-linux-x86-64.so.2"))
        );

        let nix = "\t/nix/store/abc-glibc-2.39/lib/ld-linux-x86-64.so.2 => /nix/store/abc-glibc-2.39/lib64/ld-linux-x86-64.so.2 (0x00007f)\n";
        assert_eq!(
            parse_ldd_loader(nix),
            Some(PathBuf::from(
                "/nix/store/abc-glibc-2.39/lib64/ld-linux-x86-64.so.2"
            ))
        );

        assert_eq!(parse_ldd_loader("\tnot a dynamic executable\n"), None);
    }

    #[test]
    fn nix_store_scan_finds_first_glibc_loader() -> Result<()> {
        let store = tempfile::Builder::new()
            .prefix("gameserver-nix-")
            .tempdir()?;
        fs::create_dir_all(store.path().join("bbb-glibc-2.39/lib64"))?;
        fs::write(store.path().join("bbb-glibc-2.39/lib64").join(LOADER_NAME), "")?;
        fs::create_dir_all(store.path().join("aaa-glibc-2.38-dev"))?;
        fs::create_dir_all(store.path().join("ccc-openssl"))?;

        assert_eq!(
            nix_store_loader(store.path()),
            Some(store.path().join("bbb-glibc-2.39/lib64").join(LOADER_NAME))
        );
        Ok(())
    }

    #[test]
    fn elf_header_inspection() -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("gameserver-elf-")
            .tempdir()?;
        let dynamic = dir.path().join("dynamic");
        let static_bin = dir.path().join("static");
        let arm = dir.path().join("arm");
        let script = dir.path().join("start.sh");
        fs::write(&dynamic, elf_image(EM_X86_64, &[6, PT_INTERP, 1]))?;
        fs::write(&static_bin, elf_image(EM_X86_64, &[1, 1]))?;
        fs::write(&arm, elf_image(183, &[PT_INTERP]))?;
        fs::write(&script, "#!/bin/sh\nexec ./server\n")?;

        assert!(is_dynamic_x86_64_elf(&dynamic)?);
        assert!(!is_dynamic_x86_64_elf(&static_bin)?);
        assert!(!is_dynamic_x86_64_elf(&arm)?);
        assert!(!is_dynamic_x86_64_elf(&script)?);
        Ok(())
    }

    #[test]
    fn only_executable_top_level_elves_are_candidates() -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("gameserver-elf-")
            .tempdir()?;
        let image = elf_image(EM_X86_64, &[PT_INTERP]);
        let executable = dir.path().join("server");
        let plain = dir.path().join("library.so");
        fs::write(&executable, &image)?;
        fs::write(&plain, &image)?;
        fs::set_permissions(&executable, fs::Permissions::from_mode(0o755))?;
        fs::set_permissions(&plain, fs::Permissions::from_mode(0o644))?;

        assert!(is_candidate(&executable));
        assert!(!is_candidate(&plain));
        assert!(!is_candidate(dir.path()));
        Ok(())
    }

    #[test]
    fn directory_without_candidates_patches_nothing() -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("gameserver-elf-")
            .tempdir()?;
        fs::write(dir.path().join("readme.txt"), "hello")?;
        let report = fix_interpreters(
            dir.path(),
            Path::new("/lib64/ld-linux-x86-64.so.2"),
            Path::new("patchelf"),
        );
        assert!(report.patched.is_empty());
        assert!(report.failed.is_empty());
        Ok(())
    }

    #[test]
    fn patch_failures_are_collected_per_file() -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("gameserver-elf-")
            .tempdir()?;
        let server = dir.path().join("server");
        fs::write(&server, elf_image(EM_X86_64, &[PT_INTERP]))?;
        fs::set_permissions(&server, fs::Permissions::from_mode(0o755))?;
        fs::write(dir.path().join("readme.txt"), "hello")?;

        let report = fix_interpreters(
            dir.path(),
            Path::new("/lib64/ld-linux-x86-64.so.2"),
            &dir.path().join("missing-patchelf"),
        );
        assert!(report.patched.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, server);
        assert!(report.failed[0].1.contains("missing-patchelf"));
        Ok(())
    }
}

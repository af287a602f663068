//! Signature-block detection and removal
//!
//! A jar is signed when `META-INF/` directly contains a signature file
//! (`*.SF`) or a signature block (`*.RSA`, `*.DSA`, `*.EC`, `SIG-*`).
//! Detection only reads the central directory, so it is cheap enough to run
//! while planning.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ToolResult;
use crate::manifest::{Manifest, MANIFEST_PATH};

const SIGNATURE_EXTENSIONS: &[&str] = &["SF", "RSA", "DSA", "EC"];

/// Check whether a zip entry name is part of a jar signature
pub fn is_signature_entry(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    if file.is_empty() || file.contains('/') {
        return false;
    }
    let upper = file.to_ascii_uppercase();
    if upper.starts_with("SIG-") {
        return true;
    }
    match upper.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && SIGNATURE_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Check whether a jar carries a signature
pub fn is_signed(jar: &Path) -> ToolResult<bool> {
    let archive = ZipArchive::new(File::open(jar)?)?;
    let signed = archive.file_names().any(is_signature_entry);
    Ok(signed)
}

/// Check whether a jar contains an entry with the given name
pub fn contains_entry(jar: &Path, entry: &str) -> ToolResult<bool> {
    let archive = ZipArchive::new(File::open(jar)?)?;
    let found = archive.file_names().any(|n| n == entry);
    Ok(found)
}

/// List entry names of a jar in archive order
pub fn entry_names(jar: &Path) -> ToolResult<Vec<String>> {
    let archive = ZipArchive::new(File::open(jar)?)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Write an unsigned copy of `input` to `output`.
///
/// Signature entries are dropped and the manifest loses its per-entry
/// digest sections. An unsigned input is copied unchanged. Returns whether
/// a signature was stripped.
pub fn unsign(input: &Path, output: &Path) -> ToolResult<bool> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    if !is_signed(input)? {
        fs::copy(input, output)?;
        return Ok(false);
    }

    let mut archive = ZipArchive::new(File::open(input)?)?;
    let mut writer = ZipWriter::new(File::create(output)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let name = archive.by_index_raw(i)?.name().to_string();
        if is_signature_entry(&name) {
            tracing::debug!(entry = %name, "dropping signature entry");
            continue;
        }
        if name == MANIFEST_PATH {
            let mut text = String::new();
            std::io::Read::read_to_string(&mut archive.by_index(i)?, &mut text)?;
            let mut manifest = Manifest::parse(&text)?;
            manifest.strip_sections();
            writer.start_file(MANIFEST_PATH, options)?;
            writer.write_all(&manifest.to_bytes())?;
            continue;
        }
        writer.raw_copy_file(archive.by_index_raw(i)?)?;
    }
    writer.finish()?;

    Ok(true)
}

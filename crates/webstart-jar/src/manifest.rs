//! Jar manifest (`META-INF/MANIFEST.MF`) handling
//!
//! Manifests are line-oriented `Name: Value` records. Lines are limited to
//! 72 bytes; longer values continue on lines starting with a single space.
//! A blank line separates the main section from per-entry sections.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ToolError, ToolResult};

/// Path of the manifest inside a jar
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

const MAX_LINE_BYTES: usize = 72;

/// A named per-entry section of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSection {
    /// Value of the section's `Name` attribute
    pub name: String,
    /// Remaining attributes in file order
    pub attributes: Vec<(String, String)>,
}

/// Parsed manifest preserving attribute order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Main section attributes
    pub main: Vec<(String, String)>,
    /// Per-entry sections
    pub sections: Vec<ManifestSection>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            main: vec![("Manifest-Version".to_string(), "1.0".to_string())],
            sections: Vec::new(),
        }
    }
}

impl Manifest {
    /// Parse manifest text
    pub fn parse(text: &str) -> ToolResult<Self> {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

        let mut blocks: Vec<Vec<(String, String)>> = vec![Vec::new()];
        let mut pending: Option<String> = None;

        for line in normalized.split('\n') {
            if let Some(rest) = line.strip_prefix(' ') {
                match pending.as_mut() {
                    Some(current) => current.push_str(rest),
                    None => {
                        return Err(ToolError::Manifest(format!(
                            "continuation line without attribute: {line:?}"
                        )))
                    }
                }
                continue;
            }

            if let Some(done) = pending.take() {
                push_attribute(&mut blocks, &done)?;
            }

            if line.is_empty() {
                if blocks.last().map_or(false, |b| !b.is_empty()) {
                    blocks.push(Vec::new());
                }
            } else {
                pending = Some(line.to_string());
            }
        }
        if let Some(done) = pending.take() {
            push_attribute(&mut blocks, &done)?;
        }

        let mut blocks = blocks.into_iter().filter(|b| !b.is_empty());
        let main = blocks.next().unwrap_or_default();

        let mut sections = Vec::new();
        for block in blocks {
            let mut attrs = block.into_iter();
            let (key, name) = attrs
                .next()
                .ok_or_else(|| ToolError::Manifest("empty section".to_string()))?;
            if !key.eq_ignore_ascii_case("Name") {
                return Err(ToolError::Manifest(format!(
                    "section must start with Name, found {key}"
                )));
            }
            sections.push(ManifestSection {
                name,
                attributes: attrs.collect(),
            });
        }

        Ok(Self { main, sections })
    }

    /// Look up a main attribute (case-insensitive, as the JDK does)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.main
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Merge attributes into the main section.
    ///
    /// Existing keys are kept unless `override_existing` is set. Returns the
    /// keys that were written.
    pub fn merge(
        &mut self,
        entries: &BTreeMap<String, String>,
        override_existing: bool,
    ) -> Vec<String> {
        let mut applied = Vec::new();
        for (key, value) in entries {
            match self.main.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
                Some(existing) if override_existing => {
                    existing.1 = value.clone();
                    applied.push(key.clone());
                }
                Some(_) => {
                    tracing::debug!(key = %key, "manifest key already present, keeping it");
                }
                None => {
                    self.main.push((key.clone(), value.clone()));
                    applied.push(key.clone());
                }
            }
        }
        applied
    }

    /// Drop per-entry sections (the digests written by a signer)
    pub fn strip_sections(&mut self) {
        self.sections.clear();
    }

    /// Render to manifest bytes with CRLF line endings and 72-byte wrapping
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for (k, v) in &self.main {
            write_attribute(&mut out, k, v);
        }
        out.push_str("\r\n");
        for section in &self.sections {
            write_attribute(&mut out, "Name", &section.name);
            for (k, v) in &section.attributes {
                write_attribute(&mut out, k, v);
            }
            out.push_str("\r\n");
        }
        out.into_bytes()
    }
}

fn push_attribute(blocks: &mut [Vec<(String, String)>], line: &str) -> ToolResult<()> {
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| ToolError::Manifest(format!("missing ':' in {line:?}")))?;
    let value = value.strip_prefix(' ').unwrap_or(value);
    if let Some(block) = blocks.last_mut() {
        block.push((key.trim().to_string(), value.to_string()));
    }
    Ok(())
}

fn write_attribute(out: &mut String, key: &str, value: &str) {
    let line = format!("{key}: {value}");
    let mut limit = MAX_LINE_BYTES;
    let mut chunk_start = 0;
    let mut chunk_len = 0;

    for (idx, ch) in line.char_indices() {
        if chunk_len + ch.len_utf8() > limit {
            out.push_str(&line[chunk_start..idx]);
            out.push_str("\r\n ");
            chunk_start = idx;
            chunk_len = 0;
            // Continuation lines lose one byte to the leading space
            limit = MAX_LINE_BYTES - 1;
        }
        chunk_len += ch.len_utf8();
    }
    out.push_str(&line[chunk_start..]);
    out.push_str("\r\n");
}

/// Read the manifest of a jar, if it has one
pub fn read_manifest(jar: &Path) -> ToolResult<Option<Manifest>> {
    let mut archive = ZipArchive::new(File::open(jar)?)?;
    let mut entry = match archive.by_name(MANIFEST_PATH) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Manifest::parse(&text).map(Some)
}

/// Copy `input` to `output`, merging `entries` into the main manifest section.
///
/// A jar without a manifest gets a fresh one written as its first entry.
/// Returns the keys that were applied.
pub fn update_manifest(
    input: &Path,
    output: &Path,
    entries: &BTreeMap<String, String>,
    override_existing: bool,
) -> ToolResult<Vec<String>> {
    let mut manifest = read_manifest(input)?.unwrap_or_default();
    let applied = manifest.merge(entries, override_existing);

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut archive = ZipArchive::new(File::open(input)?)?;
    let mut writer = ZipWriter::new(File::create(output)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let has_manifest = archive.file_names().any(|n| n == MANIFEST_PATH);
    if !has_manifest {
        writer.start_file(MANIFEST_PATH, options)?;
        writer.write_all(&manifest.to_bytes())?;
    }

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.name() == MANIFEST_PATH {
            drop(entry);
            writer.start_file(MANIFEST_PATH, options)?;
            writer.write_all(&manifest.to_bytes())?;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }
    writer.finish()?;

    Ok(applied)
}

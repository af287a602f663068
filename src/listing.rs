//! Dependency listing (dependency_listing.json)
//!
//! Handed to the descriptor generator: one entry per deployed jar with its
//! href relative to the final directory, digest, and which jar holds the
//! main class.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use webstart_jar::{JarToolkit, ToolError};

/// Schema version for dependency_listing.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "webstart-deps/dependency_listing@1";

/// Errors building the listing
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("main class {0} not found in any deployed jar")]
    MainClassNotFound(String),

    #[error("cannot inspect {}: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One deployed jar handed to the listing
#[derive(Debug, Clone)]
pub struct DeployedJar {
    pub filename: String,
    pub version: String,
    pub final_file: PathBuf,
    pub packed_file: Option<PathBuf>,
}

/// A single jar in the listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub filename: String,

    /// Path relative to the final directory, `/`-separated
    pub href: String,

    /// Present when versions are embedded in filenames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Holds the application's main class
    pub main: bool,

    pub size: u64,

    pub sha256: String,

    /// Filename of the pack200 companion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packed: Option<String>,
}

/// Listing of every jar deployed by one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyListing {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the listing was created
    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lib_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    /// Entries in deployment order
    pub entries: Vec<ListingEntry>,
}

fn sha256_file(path: &Path) -> io::Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok((contents.len() as u64, hex::encode(hasher.finalize())))
}

/// `com.example.Main` → `com/example/Main.class`
pub fn class_entry(main_class: &str) -> String {
    format!("{}.class", main_class.replace('.', "/"))
}

impl DependencyListing {
    /// Build the listing from deployed jars.
    ///
    /// With a main class configured, the first jar containing it is marked
    /// `main`; no jar containing it is an error.
    pub fn build(
        jars: &[DeployedJar],
        lib_path: Option<&str>,
        output_versions: bool,
        main_class: Option<&str>,
        toolkit: &dyn JarToolkit,
    ) -> Result<Self, ListingError> {
        let main_entry = main_class.map(class_entry);
        let mut main_found = false;
        let mut entries = Vec::with_capacity(jars.len());

        for jar in jars {
            let (size, sha256) = sha256_file(&jar.final_file)?;
            let main = match &main_entry {
                Some(entry) if !main_found => {
                    let contains = toolkit
                        .contains_entry(&jar.final_file, entry)
                        .map_err(|source| ListingError::Inspect {
                            path: jar.final_file.clone(),
                            source,
                        })?;
                    main_found = contains;
                    contains
                }
                _ => false,
            };

            let href = match lib_path.filter(|p| !p.is_empty()) {
                Some(lib) => format!("{}/{}", lib.trim_end_matches('/'), jar.filename),
                None => jar.filename.clone(),
            };

            entries.push(ListingEntry {
                filename: jar.filename.clone(),
                href,
                version: output_versions.then(|| jar.version.clone()),
                main,
                size,
                sha256,
                packed: jar
                    .packed_file
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned()),
            });
        }

        if let Some(class) = main_class {
            if !main_found {
                return Err(ListingError::MainClassNotFound(class.to_string()));
            }
        }

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            lib_path: lib_path.map(str::to_string),
            main_class: main_class.map(str::to_string),
            entries,
        })
    }

    /// Entry holding the main class
    pub fn main_entry(&self) -> Option<&ListingEntry> {
        self.entries.iter().find(|e| e.main)
    }

    /// Total size of listed jars
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Files under `lib_dir` that are neither listed jars nor their packed
    /// companions, sorted. Left behind by renamed or removed dependencies.
    pub fn find_extra_files(&self, lib_dir: &Path) -> Result<Vec<PathBuf>, ListingError> {
        let expected: BTreeSet<&str> = self
            .entries
            .iter()
            .flat_map(|e| std::iter::once(e.filename.as_str()).chain(e.packed.as_deref()))
            .collect();

        let mut extra = Vec::new();
        if !lib_dir.is_dir() {
            return Ok(extra);
        }
        for entry in WalkDir::new(lib_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !expected.contains(name.as_ref()) {
                extra.push(entry.path().to_path_buf());
            }
        }
        extra.sort();
        Ok(extra)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> Result<(), ListingError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load from file
    pub fn from_file(path: &Path) -> Result<Self, ListingError> {
        let json = fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockToolkit;
    use tempfile::TempDir;

    fn deploy(dir: &Path, name: &str, content: &str) -> DeployedJar {
        let final_file = dir.join(name);
        fs::write(&final_file, content).unwrap();
        DeployedJar {
            filename: name.to_string(),
            version: "1.0".to_string(),
            final_file,
            packed_file: None,
        }
    }

    #[test]
    fn test_build_marks_main_jar() {
        let dir = TempDir::new().unwrap();
        let jars = vec![
            deploy(dir.path(), "lib.jar", "org/lib/Util.class"),
            deploy(dir.path(), "app.jar", "com/example/Main.class"),
        ];
        let listing = DependencyListing::build(
            &jars,
            Some("lib"),
            true,
            Some("com.example.Main"),
            &MockToolkit::new(),
        )
        .unwrap();

        assert_eq!(listing.schema_id, SCHEMA_ID);
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.main_entry().unwrap().filename, "app.jar");
        assert_eq!(listing.entries[0].href, "lib/lib.jar");
        assert_eq!(listing.entries[0].version.as_deref(), Some("1.0"));
        assert_eq!(listing.entries[0].size, "org/lib/Util.class".len() as u64);
        assert_eq!(listing.entries[0].sha256.len(), 64);
        assert_eq!(listing.total_size(), 40);
    }

    #[test]
    fn test_missing_main_class() {
        let dir = TempDir::new().unwrap();
        let jars = vec![deploy(dir.path(), "lib.jar", "org/lib/Util.class")];
        let err = DependencyListing::build(
            &jars,
            None,
            false,
            Some("com.example.Main"),
            &MockToolkit::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ListingError::MainClassNotFound(_)));
    }

    #[test]
    fn test_no_main_class_configured() {
        let dir = TempDir::new().unwrap();
        let jars = vec![deploy(dir.path(), "lib.jar", "x")];
        let listing =
            DependencyListing::build(&jars, None, false, None, &MockToolkit::new()).unwrap();
        assert!(listing.main_entry().is_none());
        assert_eq!(listing.entries[0].href, "lib.jar");
        assert_eq!(listing.entries[0].version, None);
    }

    #[test]
    fn test_find_extra_files() {
        let dir = TempDir::new().unwrap();
        let mut jar = deploy(dir.path(), "keep.jar", "x");
        jar.packed_file = Some(dir.path().join("keep.jar.pack.gz"));
        fs::write(dir.path().join("keep.jar.pack.gz"), "p").unwrap();
        fs::write(dir.path().join("stale-0.9.jar"), "old").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let listing =
            DependencyListing::build(&[jar], None, false, None, &MockToolkit::new()).unwrap();
        let extra = listing.find_extra_files(dir.path()).unwrap();
        assert_eq!(extra, vec![dir.path().join("stale-0.9.jar")]);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let jars = vec![deploy(dir.path(), "a.jar", "x")];
        let listing =
            DependencyListing::build(&jars, Some("lib"), false, None, &MockToolkit::new()).unwrap();
        let path = dir.path().join("out/dependency_listing.json");
        listing.write_to_file(&path).unwrap();

        let loaded = DependencyListing::from_file(&path).unwrap();
        assert_eq!(loaded.entries, listing.entries);
        assert_eq!(loaded.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_class_entry() {
        assert_eq!(class_entry("com.example.Main"), "com/example/Main.class");
    }
}

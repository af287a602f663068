//! File selection predicates
//!
//! Small tagged predicates over `(path, metadata)` that compose with
//! `and`, `or` and `not`.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::legacy::UNPROCESSED_PREFIX;

/// Suffixes produced by pack200
pub const PACK200_SUFFIXES: &[&str] = &[".pack", ".pack.gz"];

#[derive(Debug, Clone)]
enum Predicate {
    Jar,
    Unprocessed,
    Pack200Artifact,
    ModifiedSince(SystemTime),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

/// A composable file predicate
#[derive(Debug, Clone)]
pub struct FileFilter {
    predicate: Predicate,
}

impl FileFilter {
    /// Regular files ending in `.jar`
    pub fn is_jar() -> Self {
        Self::from(Predicate::Jar)
    }

    /// Files carrying the unprocessed prefix
    pub fn is_unprocessed() -> Self {
        Self::from(Predicate::Unprocessed)
    }

    /// Files ending in `.pack` or `.pack.gz`
    pub fn is_pack200_artifact() -> Self {
        Self::from(Predicate::Pack200Artifact)
    }

    /// Files modified at or after `time`
    pub fn modified_since(time: SystemTime) -> Self {
        Self::from(Predicate::ModifiedSince(time))
    }

    pub fn and(self, other: FileFilter) -> Self {
        Self::from(Predicate::And(
            Box::new(self.predicate),
            Box::new(other.predicate),
        ))
    }

    pub fn or(self, other: FileFilter) -> Self {
        Self::from(Predicate::Or(
            Box::new(self.predicate),
            Box::new(other.predicate),
        ))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::from(Predicate::Not(Box::new(self.predicate)))
    }

    /// Evaluate against a path and its metadata
    pub fn matches(&self, path: &Path, metadata: &Metadata) -> bool {
        evaluate(&self.predicate, path, metadata)
    }
}

impl From<Predicate> for FileFilter {
    fn from(predicate: Predicate) -> Self {
        Self { predicate }
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn evaluate(predicate: &Predicate, path: &Path, metadata: &Metadata) -> bool {
    match predicate {
        Predicate::Jar => metadata.is_file() && file_name(path).ends_with(".jar"),
        Predicate::Unprocessed => file_name(path).starts_with(UNPROCESSED_PREFIX),
        Predicate::Pack200Artifact => {
            let name = file_name(path);
            metadata.is_file() && PACK200_SUFFIXES.iter().any(|s| name.ends_with(s))
        }
        Predicate::ModifiedSince(time) => metadata
            .modified()
            .map(|modified| modified >= *time)
            .unwrap_or(false),
        Predicate::And(a, b) => evaluate(a, path, metadata) && evaluate(b, path, metadata),
        Predicate::Or(a, b) => evaluate(a, path, metadata) || evaluate(b, path, metadata),
        Predicate::Not(a) => !evaluate(a, path, metadata),
    }
}

/// Non-recursive listing of `dir` entries matching `filter`, sorted by path
pub fn list_files(dir: &Path, filter: &FileFilter) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if filter.matches(&path, &metadata) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

//! Deterministic output filenames for dependencies

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Artifact;

/// Maps an artifact to the filename it is deployed under.
///
/// Implementations must be pure: the same artifact and flags always give
/// the same name, which is what lets the up-to-date check find files from
/// earlier builds.
pub trait FilenameStrategy: Send + Sync + fmt::Debug {
    /// `output_version`: `Some(true)` embeds the version, `Some(false)` and
    /// `None` omit it. With `use_unique_version == false` a timestamped
    /// snapshot is written as `X-SNAPSHOT`.
    fn filename(
        &self,
        artifact: &Artifact,
        output_version: Option<bool>,
        use_unique_version: bool,
    ) -> String;
}

/// `artifactId[-classifier][-version].ext`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFilenameStrategy;

/// `groupId-artifactId[-classifier][-version].ext`
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFilenameStrategy;

impl FilenameStrategy for SimpleFilenameStrategy {
    fn filename(
        &self,
        artifact: &Artifact,
        output_version: Option<bool>,
        use_unique_version: bool,
    ) -> String {
        render(None, artifact, output_version, use_unique_version)
    }
}

impl FilenameStrategy for FullFilenameStrategy {
    fn filename(
        &self,
        artifact: &Artifact,
        output_version: Option<bool>,
        use_unique_version: bool,
    ) -> String {
        render(
            Some(&artifact.group_id),
            artifact,
            output_version,
            use_unique_version,
        )
    }
}

fn render(
    prefix: Option<&str>,
    artifact: &Artifact,
    output_version: Option<bool>,
    use_unique_version: bool,
) -> String {
    let mut name = String::new();
    if let Some(prefix) = prefix {
        name.push_str(prefix);
        name.push('-');
    }
    name.push_str(&artifact.artifact_id);
    if let Some(classifier) = artifact.classifier.as_deref().filter(|c| !c.is_empty()) {
        name.push('-');
        name.push_str(classifier);
    }
    if output_version == Some(true) {
        name.push('-');
        if use_unique_version {
            name.push_str(&artifact.version);
        } else {
            name.push_str(&artifact.base_version());
        }
    }
    name.push('.');
    name.push_str(artifact.extension());
    name
}

/// Strategy selector used in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilenameMapping {
    #[default]
    Simple,
    Full,
}

impl FilenameMapping {
    /// Instantiate the strategy
    pub fn strategy(&self) -> Arc<dyn FilenameStrategy> {
        match self {
            FilenameMapping::Simple => Arc::new(SimpleFilenameStrategy),
            FilenameMapping::Full => Arc::new(FullFilenameStrategy),
        }
    }
}

/// Filename without its last extension (`a-1.0.jar` → `a-1.0`)
pub fn file_basename(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> Artifact {
        Artifact::new("g", "a", "1.0", "/repo/a-1.0.jar")
    }

    #[test]
    fn test_simple_with_and_without_version() {
        let s = SimpleFilenameStrategy;
        assert_eq!(s.filename(&artifact(), Some(true), true), "a-1.0.jar");
        assert_eq!(s.filename(&artifact(), Some(false), true), "a.jar");
        assert_eq!(s.filename(&artifact(), None, true), "a.jar");
    }

    #[test]
    fn test_simple_with_classifier() {
        let s = SimpleFilenameStrategy;
        let a = artifact().with_classifier("sources");
        assert_eq!(s.filename(&a, Some(true), true), "a-sources-1.0.jar");
        assert_eq!(s.filename(&a, Some(false), true), "a-sources.jar");
    }

    #[test]
    fn test_empty_classifier_is_ignored() {
        let a = artifact().with_classifier("");
        assert_eq!(SimpleFilenameStrategy.filename(&a, Some(true), true), "a-1.0.jar");
    }

    #[test]
    fn test_snapshot_unique_and_collapsed() {
        let a = Artifact::new("g", "a", "1.0-20240102.030405-7", "a.jar");
        let s = SimpleFilenameStrategy;
        assert_eq!(s.filename(&a, Some(true), true), "a-1.0-20240102.030405-7.jar");
        assert_eq!(s.filename(&a, Some(true), false), "a-1.0-SNAPSHOT.jar");
        assert_eq!(s.filename(&a, Some(false), false), "a.jar");
    }

    #[test]
    fn test_extension_follows_type() {
        let a = artifact().with_type("test-jar");
        assert_eq!(SimpleFilenameStrategy.filename(&a, Some(true), true), "a-1.0.jar");
        let z = artifact().with_type("zip");
        assert_eq!(SimpleFilenameStrategy.filename(&z, None, true), "a.zip");
    }

    #[test]
    fn test_full_strategy_prefixes_group() {
        let a = Artifact::new("org.example", "lib", "2.0", "lib.jar");
        assert_eq!(
            FullFilenameStrategy.filename(&a, Some(true), true),
            "org.example-lib-2.0.jar"
        );
        assert_eq!(
            FilenameMapping::Full.strategy().filename(&a, None, true),
            "org.example-lib.jar"
        );
    }

    #[test]
    fn test_file_basename() {
        assert_eq!(file_basename("a-1.0.jar"), "a-1.0");
        assert_eq!(file_basename("noext"), "noext");
        assert_eq!(file_basename(".hidden"), ".hidden");
    }
}

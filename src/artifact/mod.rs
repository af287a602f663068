//! Resolved build artifacts
//!
//! Artifacts are handed over by the dependency resolver and never modified
//! here. Identity is the (group, artifact, version, classifier, type) tuple.

mod filename;
mod selection;

pub use filename::{
    file_basename, FilenameMapping, FilenameStrategy, FullFilenameStrategy,
    SimpleFilenameStrategy,
};
pub use selection::{ArtifactPattern, DependencySelector};

use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Suffix of a non-unique snapshot version
pub const SNAPSHOT_SUFFIX: &str = "SNAPSHOT";

/// Dependency scope as reported by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
    System,
}

impl Scope {
    /// Scopes whose artifacts ship with the application
    pub fn is_runtime(&self) -> bool {
        matches!(self, Scope::Compile | Scope::Runtime | Scope::System)
    }
}

/// Identity tuple of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArtifactKey {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// `None` in contexts where type does not take part in identity
    pub artifact_type: Option<String>,
}

/// A resolved dependency: coordinates plus the file the resolver produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub artifact_type: String,
    #[serde(default)]
    pub scope: Scope,
    /// Resolved file
    pub file: PathBuf,
    /// False for transitive dependencies
    #[serde(default = "default_direct")]
    pub direct: bool,
}

fn default_type() -> String {
    "jar".to_string()
}

fn default_direct() -> bool {
    true
}

impl Artifact {
    /// Create a direct, compile-scoped jar artifact
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: None,
            artifact_type: default_type(),
            scope: Scope::Compile,
            file: file.into(),
            direct: true,
        }
    }

    /// Set the classifier
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Set the artifact type
    pub fn with_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.artifact_type = artifact_type.into();
        self
    }

    /// Set the scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Mark as a transitive dependency
    pub fn transitive(mut self) -> Self {
        self.direct = false;
        self
    }

    /// Full identity including type
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
            classifier: self.classifier.clone(),
            artifact_type: Some(self.artifact_type.clone()),
        }
    }

    /// Identity ignoring type
    pub fn key_without_type(&self) -> ArtifactKey {
        ArtifactKey {
            artifact_type: None,
            ..self.key()
        }
    }

    /// File extension for this artifact's type
    pub fn extension(&self) -> &str {
        extension_for_type(&self.artifact_type)
    }

    /// Whether this artifact ships as a jar
    pub fn is_jar(&self) -> bool {
        self.extension() == "jar"
    }

    /// Whether the version is a snapshot (unique or not)
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with(SNAPSHOT_SUFFIX) || timestamped_snapshot(&self.version).is_some()
    }

    /// Version with a timestamped snapshot collapsed to `X-SNAPSHOT`.
    ///
    /// Release and plain snapshot versions are returned unchanged.
    pub fn base_version(&self) -> String {
        match timestamped_snapshot(&self.version) {
            Some(base) => format!("{base}-{SNAPSHOT_SUFFIX}"),
            None => self.version.clone(),
        }
    }

    /// Last modification time of the resolved file
    pub fn last_modified(&self) -> io::Result<SystemTime> {
        fs::metadata(&self.file)?.modified()
    }

    /// Resolved file
    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.artifact_type)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, ":{}", self.version)
    }
}

/// Map an artifact type to its conventional file extension
pub fn extension_for_type(artifact_type: &str) -> &str {
    match artifact_type {
        "jar" | "test-jar" | "ejb-client" | "ejb" | "java-source" | "javadoc"
        | "maven-plugin" => "jar",
        other => other,
    }
}

/// Split a timestamped snapshot (`1.0-20240102.030405-7`) into its base
fn timestamped_snapshot(version: &str) -> Option<&str> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(.*)-(\d{8}\.\d{6})-(\d+)$").expect("snapshot pattern is valid")
    });
    pattern
        .captures(version)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Artifact list handed over by the resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedArtifacts {
    pub artifacts: Vec<Artifact>,
}

impl ResolvedArtifacts {
    /// Load from a JSON file
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_ignores_file_and_scope() {
        let a = Artifact::new("g", "a", "1.0", "/repo/a.jar");
        let b = Artifact::new("g", "a", "1.0", "/other/a.jar").with_scope(Scope::Runtime);
        let c = Artifact::new("g", "a", "1.0", "/repo/a.jar").with_classifier("sources");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_key_without_type() {
        let jar = Artifact::new("g", "a", "1.0", "a.jar");
        let ejb = Artifact::new("g", "a", "1.0", "a.jar").with_type("ejb");

        assert_ne!(jar.key(), ejb.key());
        assert_eq!(jar.key_without_type(), ejb.key_without_type());
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for_type("jar"), "jar");
        assert_eq!(extension_for_type("test-jar"), "jar");
        assert_eq!(extension_for_type("ejb-client"), "jar");
        assert_eq!(extension_for_type("war"), "war");
        assert_eq!(extension_for_type("zip"), "zip");
        assert!(!Artifact::new("g", "a", "1", "a.pom").with_type("pom").is_jar());
    }

    #[test]
    fn test_base_version() {
        let unique = Artifact::new("g", "a", "1.0-20240102.030405-7", "a.jar");
        assert!(unique.is_snapshot());
        assert_eq!(unique.base_version(), "1.0-SNAPSHOT");

        let plain = Artifact::new("g", "a", "1.0-SNAPSHOT", "a.jar");
        assert!(plain.is_snapshot());
        assert_eq!(plain.base_version(), "1.0-SNAPSHOT");

        let release = Artifact::new("g", "a", "2.3.1", "a.jar");
        assert!(!release.is_snapshot());
        assert_eq!(release.base_version(), "2.3.1");
    }

    #[test]
    fn test_display_coordinates() {
        let a = Artifact::new("org.example", "lib", "1.0", "lib.jar").with_classifier("jdk8");
        assert_eq!(a.to_string(), "org.example:lib:jar:jdk8:1.0");
    }

    #[test]
    fn test_resolved_artifacts_json() {
        let json = r#"{
            "artifacts": [
                {"group_id": "g", "artifact_id": "a", "version": "1.0", "file": "a.jar"},
                {"group_id": "g", "artifact_id": "b", "version": "2.0", "type": "jar",
                 "classifier": "x", "scope": "runtime", "file": "b.jar", "direct": false}
            ]
        }"#;
        let resolved: ResolvedArtifacts = serde_json::from_str(json).unwrap();
        assert_eq!(resolved.artifacts.len(), 2);
        assert_eq!(resolved.artifacts[0].artifact_type, "jar");
        assert!(resolved.artifacts[0].direct);
        assert_eq!(resolved.artifacts[1].scope, Scope::Runtime);
        assert!(!resolved.artifacts[1].direct);
    }
}

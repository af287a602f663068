//! Choosing which resolved artifacts get deployed

use std::collections::HashSet;

use globset::{Glob, GlobMatcher};

use super::{Artifact, ArtifactKey};
use crate::config::{ConfigError, DependencyFilterConfig};

/// `groupId[:artifactId[:type[:classifier]]]` with glob segments.
///
/// Omitted trailing segments match anything.
#[derive(Debug, Clone)]
pub struct ArtifactPattern {
    source: String,
    segments: Vec<GlobMatcher>,
}

impl ArtifactPattern {
    const MAX_SEGMENTS: usize = 4;

    /// Parse a pattern, rejecting empty or surplus segments
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = pattern.trim().split(':').collect();
        if parts.len() > Self::MAX_SEGMENTS {
            return Err(invalid("expected at most groupId:artifactId:type:classifier"));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty segment"));
        }

        let segments = parts
            .iter()
            .map(|p| {
                Glob::new(p)
                    .map(|g| g.compile_matcher())
                    .map_err(|e| invalid(&e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match against an artifact's coordinates
    pub fn matches(&self, artifact: &Artifact) -> bool {
        let fields = [
            artifact.group_id.as_str(),
            artifact.artifact_id.as_str(),
            artifact.artifact_type.as_str(),
            artifact.classifier.as_deref().unwrap_or(""),
        ];
        self.segments
            .iter()
            .zip(fields.iter())
            .all(|(glob, field)| glob.is_match(field))
    }
}

/// Filters the resolver's artifact list down to deployable jars
#[derive(Debug, Clone, Default)]
pub struct DependencySelector {
    includes: Vec<ArtifactPattern>,
    excludes: Vec<ArtifactPattern>,
    exclude_transitive: bool,
}

impl DependencySelector {
    /// Build from configuration
    pub fn from_config(
        filter: &DependencyFilterConfig,
        exclude_transitive: bool,
    ) -> Result<Self, ConfigError> {
        let parse_all = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| ArtifactPattern::parse(p))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            includes: parse_all(&filter.includes)?,
            excludes: parse_all(&filter.excludes)?,
            exclude_transitive,
        })
    }

    /// Whether a single artifact is selected
    pub fn accepts(&self, artifact: &Artifact) -> bool {
        if !artifact.is_jar() {
            tracing::debug!(artifact = %artifact, "skipping non-jar artifact");
            return false;
        }
        if !artifact.scope.is_runtime() {
            tracing::debug!(artifact = %artifact, scope = ?artifact.scope, "skipping scope");
            return false;
        }
        if self.exclude_transitive && !artifact.direct {
            tracing::debug!(artifact = %artifact, "skipping transitive dependency");
            return false;
        }
        if !self.includes.is_empty() && !self.includes.iter().any(|p| p.matches(artifact)) {
            tracing::debug!(artifact = %artifact, "not matched by includes");
            return false;
        }
        if let Some(pattern) = self.excludes.iter().find(|p| p.matches(artifact)) {
            tracing::debug!(artifact = %artifact, pattern = pattern.as_str(), "excluded");
            return false;
        }
        true
    }

    /// Select artifacts in input order, dropping duplicate identities
    pub fn select(&self, artifacts: &[Artifact]) -> Vec<Artifact> {
        let mut seen: HashSet<ArtifactKey> = HashSet::new();
        artifacts
            .iter()
            .filter(|a| self.accepts(a))
            .filter(|a| seen.insert(a.key()))
            .cloned()
            .collect()
    }
}

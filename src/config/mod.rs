//! Build configuration (`webstart.toml`)
//!
//! `GlobalConfig` is loaded and validated once per invocation, then shared
//! read-only (behind an `Arc`) by every dependency being processed.
//! `DependencyConfig` narrows it to a single dependency.

mod dependency;
mod sign;

pub use dependency::DependencyConfig;
pub use sign::{Dname, KeystoreConfig, SignConfig};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactPattern, FilenameMapping};

/// Configuration errors. Always fatal, always raised before any file is
/// processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("{artifact} is already signed and unsigning is not permitted (set can_unsign = true)")]
    UnsignNotPermitted { artifact: String },

    #[error("{task} cannot run for {artifact}: {reason}")]
    TaskPrecondition {
        task: String,
        artifact: String,
        reason: String,
    },

    #[error("{first} and {second} both map to {filename}")]
    FilenameCollision {
        filename: String,
        first: String,
        second: String,
    },
}

/// pack200 settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pack200Config {
    /// Run pack200 stages
    pub enabled: bool,
    /// Glob patterns of jar entries passed through uncompressed
    pub pass_files: Vec<String>,
}

/// Include/exclude patterns applied to resolved artifacts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyFilterConfig {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

/// Process-wide settings for one build invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Root of per-dependency scratch directories
    pub working_directory: PathBuf,

    /// Root of the deployable output
    pub final_directory: PathBuf,

    /// Sub-path of `final_directory` receiving the jars
    pub lib_path: Option<String>,

    /// Filename strategy
    pub filename_mapping: FilenameMapping,

    /// Embed versions in deployed filenames
    pub output_jar_versions: bool,

    /// Keep timestamped snapshot versions in filenames
    pub use_unique_versions: bool,

    /// Deploy direct dependencies only
    pub exclude_transitive: bool,

    /// Strip existing signatures before signing
    pub unsign_already_signed_jars: bool,

    /// Whether stripping a third-party signature is allowed at all
    pub can_unsign: bool,

    /// Replace manifest attributes that already exist
    pub override_manifest_entries: bool,

    /// Gzip pack200 output
    pub gzip: bool,

    /// Stop starting dependencies after the first failure
    pub fail_fast: bool,

    /// Worker threads
    pub max_threads: usize,

    pub verbose: bool,

    /// Fully qualified class holding the application's entry point
    pub main_class: Option<String>,

    pub pack200: Pack200Config,

    pub dependencies: DependencyFilterConfig,

    /// Signing is enabled when present
    pub sign: Option<SignConfig>,

    /// Attributes merged into each jar's manifest before signing
    pub update_manifest_entries: BTreeMap<String, String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            working_directory: PathBuf::from("target/jnlp-work"),
            final_directory: PathBuf::from("target/jnlp"),
            lib_path: None,
            filename_mapping: FilenameMapping::default(),
            output_jar_versions: false,
            use_unique_versions: false,
            exclude_transitive: false,
            unsign_already_signed_jars: false,
            can_unsign: true,
            override_manifest_entries: false,
            gzip: false,
            fail_fast: true,
            max_threads: 4,
            verbose: false,
            main_class: None,
            pack200: Pack200Config::default(),
            dependencies: DependencyFilterConfig::default(),
            sign: None,
            update_manifest_entries: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Load and parse config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Parse config from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: GlobalConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::ValidationError(
                "max_threads must be at least 1".to_string(),
            ));
        }

        if self.working_directory == self.final_directory {
            return Err(ConfigError::ValidationError(
                "working_directory and final_directory must differ".to_string(),
            ));
        }

        if let Some(lib_path) = &self.lib_path {
            let path = Path::new(lib_path);
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(ConfigError::ValidationError(format!(
                    "lib_path must be relative and stay inside final_directory: {lib_path}"
                )));
            }
        }

        for pattern in &self.pack200.pass_files {
            Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }

        for pattern in self
            .dependencies
            .includes
            .iter()
            .chain(&self.dependencies.excludes)
        {
            ArtifactPattern::parse(pattern)?;
        }

        for key in self.update_manifest_entries.keys() {
            let valid = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(ConfigError::ValidationError(format!(
                    "invalid manifest attribute name: {key:?}"
                )));
            }
        }

        if let Some(sign) = &self.sign {
            sign.validate()?;
        }

        Ok(())
    }

    /// Signing enabled
    pub fn is_sign(&self) -> bool {
        self.sign.is_some()
    }

    /// pack200 enabled
    pub fn is_pack200(&self) -> bool {
        self.pack200.enabled
    }

    /// Directory receiving deployed jars
    pub fn lib_directory(&self) -> PathBuf {
        match &self.lib_path {
            Some(lib) if !lib.is_empty() => self.final_directory.join(lib),
            _ => self.final_directory.clone(),
        }
    }

    /// Suffix appended by pack200
    pub fn pack_extension(&self) -> &'static str {
        if self.gzip {
            ".pack.gz"
        } else {
            ".pack"
        }
    }
}

//! Per-dependency view of the global configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{GlobalConfig, SignConfig};
use crate::artifact::{file_basename, Artifact, FilenameStrategy};

/// Immutable configuration of one dependency.
///
/// Flags are read through to the shared `GlobalConfig`; only the working
/// directory and output-version choice are specific to the dependency.
#[derive(Debug, Clone)]
pub struct DependencyConfig {
    global: Arc<GlobalConfig>,
    working_directory: PathBuf,
    output_jar_version: bool,
    strategy: Arc<dyn FilenameStrategy>,
}

impl DependencyConfig {
    pub fn new(
        global: Arc<GlobalConfig>,
        working_directory: PathBuf,
        output_jar_version: bool,
        strategy: Arc<dyn FilenameStrategy>,
    ) -> Self {
        Self {
            global,
            working_directory,
            output_jar_version,
            strategy,
        }
    }

    /// Config for `artifact`, with its scratch area at
    /// `<working_directory>/<basename of its final filename>`
    pub fn for_artifact(
        global: Arc<GlobalConfig>,
        artifact: &Artifact,
        output_jar_version: bool,
        strategy: Arc<dyn FilenameStrategy>,
    ) -> Self {
        let mut config = Self::new(global, PathBuf::new(), output_jar_version, strategy);
        let filename = config.filename(artifact);
        config.working_directory = config
            .global
            .working_directory
            .join(file_basename(&filename));
        config
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    /// Scratch directory exclusive to this dependency
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Final filename of `artifact` under this configuration
    pub fn filename(&self, artifact: &Artifact) -> String {
        self.strategy.filename(
            artifact,
            Some(self.output_jar_version),
            self.global.use_unique_versions,
        )
    }

    pub fn is_sign(&self) -> bool {
        self.global.is_sign()
    }

    pub fn sign(&self) -> Option<&SignConfig> {
        self.global.sign.as_ref()
    }

    pub fn is_pack200(&self) -> bool {
        self.global.is_pack200()
    }

    pub fn is_gzip(&self) -> bool {
        self.global.gzip
    }

    pub fn pass_files(&self) -> &[String] {
        &self.global.pack200.pass_files
    }

    pub fn is_unsign_already_signed_jars(&self) -> bool {
        self.global.unsign_already_signed_jars
    }

    pub fn can_unsign(&self) -> bool {
        self.global.can_unsign
    }

    pub fn manifest_entries(&self) -> &BTreeMap<String, String> {
        &self.global.update_manifest_entries
    }

    pub fn is_update_manifest(&self) -> bool {
        !self.global.update_manifest_entries.is_empty()
    }

    pub fn override_manifest_entries(&self) -> bool {
        self.global.override_manifest_entries
    }
}

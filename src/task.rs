//! Stage tasks
//!
//! A task consumes one file and writes one new file into its stage
//! directory. Inputs are never modified in place.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use webstart_jar::{
    JarToolkit, ManifestRequest, PackRequest, SignRequest, ToolError, UnpackRequest,
    UnsignRequest,
};

use crate::config::DependencyConfig;

/// Task errors. They abort the chain of the dependency they occur in.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{task} is not applicable: {reason}")]
    Precondition { task: Task, reason: String },

    #[error("{task} cannot consume {}", path.display())]
    UnexpectedInput { task: Task, path: PathBuf },

    #[error("{task} failed: {source}")]
    Tool {
        task: Task,
        #[source]
        source: ToolError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// One transformation step of a dependency chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Strip existing signature blocks
    Unsign,
    /// Compress a jar with pack200
    Pack200,
    /// Restore a jar from its pack200 form
    UnPack200,
    /// Merge configured attributes into the main manifest section
    UpdateManifest,
    /// Sign into a new jar
    Sign,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Unsign => "Unsign",
            Task::Pack200 => "Pack200",
            Task::UnPack200 => "UnPack200",
            Task::UpdateManifest => "UpdateManifest",
            Task::Sign => "Sign",
        }
    }

    /// Whether this task can run at all under `config`
    pub fn check(&self, config: &DependencyConfig) -> Result<(), TaskError> {
        let reason = match self {
            Task::Sign if !config.is_sign() => Some("signing is not configured"),
            Task::Pack200 | Task::UnPack200 if !config.is_pack200() => {
                Some("pack200 is not enabled")
            }
            Task::UpdateManifest if !config.is_update_manifest() => {
                Some("no manifest entries are configured")
            }
            Task::Unsign if !config.can_unsign() => Some("unsigning is not permitted"),
            _ => None,
        };
        match reason {
            Some(reason) => Err(TaskError::Precondition {
                task: *self,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Name of the file this task produces from `input_name`
    pub fn output_name(&self, config: &DependencyConfig, input_name: &str) -> Option<String> {
        let ext = config.global().pack_extension();
        match self {
            Task::Pack200 => Some(format!("{input_name}{ext}")),
            Task::UnPack200 => input_name
                .strip_suffix(ext)
                .filter(|stem| !stem.is_empty())
                .map(str::to_string),
            _ => Some(input_name.to_string()),
        }
    }

    /// Run against `input`, writing the result into `stage_dir`.
    ///
    /// Returns the path of the produced file.
    pub fn execute(
        &self,
        config: &DependencyConfig,
        toolkit: &dyn JarToolkit,
        input: &Path,
        stage_dir: &Path,
    ) -> Result<PathBuf, TaskError> {
        self.check(config)?;

        let unexpected = || TaskError::UnexpectedInput {
            task: *self,
            path: input.to_path_buf(),
        };
        if !input.is_file() {
            return Err(unexpected());
        }
        let input_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(unexpected)?;
        if *self != Task::UnPack200 && !input_name.ends_with(".jar") {
            return Err(unexpected());
        }
        let output_name = self
            .output_name(config, input_name)
            .ok_or_else(unexpected)?;

        std::fs::create_dir_all(stage_dir)?;
        let output = stage_dir.join(output_name);
        if output == input {
            return Err(unexpected());
        }

        tracing::debug!(
            task = self.name(),
            input = %input.display(),
            output = %output.display(),
            "running task"
        );

        let input = input.to_path_buf();
        let result = match self {
            Task::Unsign => toolkit.unsign(&UnsignRequest {
                input,
                output: output.clone(),
            }),
            Task::Pack200 => toolkit.pack(&PackRequest {
                input,
                output: output.clone(),
                gzip: config.is_gzip(),
                pass_files: config.pass_files().to_vec(),
            }),
            Task::UnPack200 => toolkit.unpack(&UnpackRequest {
                input,
                output: output.clone(),
            }),
            Task::UpdateManifest => toolkit.update_manifest(&ManifestRequest {
                input,
                output: output.clone(),
                entries: config.manifest_entries().clone(),
                override_existing: config.override_manifest_entries(),
            }),
            Task::Sign => {
                let sign = config.sign().ok_or_else(|| TaskError::Precondition {
                    task: Task::Sign,
                    reason: "signing is not configured".to_string(),
                })?;
                toolkit.sign(&SignRequest {
                    input,
                    output: output.clone(),
                    identity: sign.identity(),
                    verify: sign.verify,
                })
            }
        };
        result.map_err(|source| TaskError::Tool {
            task: *self,
            source,
        })?;

        if !output.is_file() {
            return Err(TaskError::Tool {
                task: *self,
                source: ToolError::MissingOutput(output),
            });
        }
        Ok(output)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

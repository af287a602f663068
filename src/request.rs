//! Per-dependency requests
//!
//! A `Request` fixes everything about one dependency before execution
//! starts: its final filename, its working paths, the ordered task chain
//! and whether the previous run's output can be reused.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use webstart_jar::{JarToolkit, ToolError};

use crate::artifact::{Artifact, FilenameStrategy};
use crate::config::{ConfigError, DependencyConfig, GlobalConfig};
use crate::task::Task;

/// Errors raised while building a request
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot inspect {artifact}: {source}")]
    Inspect {
        artifact: String,
        #[source]
        source: ToolError,
    },

    #[error("cannot read {artifact}: {source}")]
    Io {
        artifact: String,
        #[source]
        source: io::Error,
    },
}

/// Identifier of a request within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub usize);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One dependency's processing plan
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    artifact: Artifact,
    config: DependencyConfig,
    filename: String,
    tasks: Vec<Task>,
    original_file: PathBuf,
    final_file: PathBuf,
    uptodate: bool,
}

impl Request {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn config(&self) -> &DependencyConfig {
        &self.config
    }

    /// Deployed filename
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Ordered task chain
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Copy of the resolved file inside the working directory
    pub fn original_file(&self) -> &Path {
        &self.original_file
    }

    /// Deployed jar
    pub fn final_file(&self) -> &Path {
        &self.final_file
    }

    /// Packed companion of the final jar, when the chain ends with pack200
    pub fn packed_file(&self) -> Option<PathBuf> {
        match self.tasks.last() {
            Some(Task::Pack200) => {
                let ext = self.config.global().pack_extension();
                Some(PathBuf::from(format!("{}{ext}", self.final_file.display())))
            }
            _ => None,
        }
    }

    /// Tasks with their index and scratch directory, in chain order
    pub fn stages(&self) -> impl Iterator<Item = (usize, Task, PathBuf)> + '_ {
        self.tasks.iter().enumerate().map(|(index, task)| {
            let dir = self.config.working_directory().join(format!("{index}_{task}"));
            (index, *task, dir)
        })
    }

    /// Scratch directory of the task at `index`
    pub fn stage_directory(&self, index: usize) -> Option<PathBuf> {
        self.stages().nth(index).map(|(_, _, dir)| dir)
    }

    /// Previous output can be reused. Computed once, at construction.
    pub fn is_uptodate(&self) -> bool {
        self.uptodate
    }

    /// Whether the chain signs
    pub fn is_signing(&self) -> bool {
        self.tasks.contains(&Task::Sign)
    }
}

/// Task chain for one dependency.
///
/// `already_signed` only matters when signing with
/// `unsign_already_signed_jars`.
pub fn plan_tasks(config: &DependencyConfig, already_signed: bool) -> Vec<Task> {
    let mut tasks = Vec::new();
    if config.is_sign() {
        if config.is_unsign_already_signed_jars() && already_signed {
            tasks.push(Task::Unsign);
        }
        if config.is_pack200() {
            tasks.push(Task::Pack200);
            tasks.push(Task::UnPack200);
        }
        if config.is_update_manifest() {
            tasks.push(Task::UpdateManifest);
        }
        tasks.push(Task::Sign);
    }
    if config.is_pack200() {
        tasks.push(Task::Pack200);
    }
    tasks
}

fn newer_than(path: &Path, reference: SystemTime) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|modified| modified > reference)
        .unwrap_or(false)
}

/// Builds requests against a shared configuration
pub struct RequestBuilder {
    global: Arc<GlobalConfig>,
    strategy: Arc<dyn FilenameStrategy>,
    toolkit: Arc<dyn JarToolkit>,
    next_id: AtomicUsize,
}

impl RequestBuilder {
    pub fn new(global: Arc<GlobalConfig>, toolkit: Arc<dyn JarToolkit>) -> Self {
        let strategy = global.filename_mapping.strategy();
        Self {
            global,
            strategy,
            toolkit,
            next_id: AtomicUsize::new(0),
        }
    }

    /// Use a custom filename strategy
    pub fn with_strategy(mut self, strategy: Arc<dyn FilenameStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Final filename of `artifact`
    pub fn filename(&self, artifact: &Artifact, output_jar_version: bool) -> String {
        self.strategy.filename(
            artifact,
            Some(output_jar_version),
            self.global.use_unique_versions,
        )
    }

    /// Build the request for one artifact.
    ///
    /// Configuration problems (a signed jar that may not be unsigned, a task
    /// that cannot run) are raised here, before anything is copied.
    pub fn create_request(
        &self,
        artifact: &Artifact,
        output_jar_version: bool,
    ) -> Result<Request, RequestError> {
        let config = DependencyConfig::for_artifact(
            Arc::clone(&self.global),
            artifact,
            output_jar_version,
            Arc::clone(&self.strategy),
        );
        let filename = config.filename(artifact);

        let already_signed = if config.is_sign() && config.is_unsign_already_signed_jars() {
            let signed = self
                .toolkit
                .is_signed(artifact.file())
                .map_err(|source| RequestError::Inspect {
                    artifact: artifact.to_string(),
                    source,
                })?;
            if signed && !config.can_unsign() {
                return Err(ConfigError::UnsignNotPermitted {
                    artifact: artifact.to_string(),
                }
                .into());
            }
            signed
        } else {
            false
        };

        let tasks = plan_tasks(&config, already_signed);
        for task in &tasks {
            task.check(&config)
                .map_err(|e| ConfigError::TaskPrecondition {
                    task: task.to_string(),
                    artifact: artifact.to_string(),
                    reason: e.to_string(),
                })?;
        }

        let source_modified = artifact.last_modified().map_err(|source| RequestError::Io {
            artifact: artifact.to_string(),
            source,
        })?;

        let original_file = config.working_directory().join(&filename);
        let final_file = self.global.lib_directory().join(&filename);
        let mut uptodate =
            newer_than(&original_file, source_modified) && newer_than(&final_file, source_modified);
        if let Some(Task::Pack200) = tasks.last() {
            let packed = format!("{}{}", final_file.display(), self.global.pack_extension());
            uptodate = uptodate && newer_than(Path::new(&packed), source_modified);
        }

        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(
            request = %id,
            artifact = %artifact,
            filename = %filename,
            tasks = ?tasks,
            uptodate,
            "created request"
        );

        Ok(Request {
            id,
            artifact: artifact.clone(),
            config,
            filename,
            tasks,
            original_file,
            final_file,
            uptodate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignConfig;
    use crate::mock::{MockToolkit, SIGNED_MARKER};
    use std::collections::BTreeMap;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        global: GlobalConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let mut global = GlobalConfig::default();
            global.working_directory = dir.path().join("work");
            global.final_directory = dir.path().join("out");
            Self { dir, global }
        }

        fn signing(mut self) -> Self {
            self.global.sign = Some(
                toml::from_str::<SignConfig>(
                    "keystore = \"ks.jks\"\nalias = \"app\"\nstorepass = \"secret\"",
                )
                .unwrap(),
            );
            self
        }

        fn artifact(&self, name: &str, content: &[u8]) -> Artifact {
            let path = self.dir.path().join("repo").join(format!("{name}-1.0.jar"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            let past = SystemTime::now() - Duration::from_secs(3600);
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(past)
                .unwrap();
            Artifact::new("org.example", name, "1.0", path)
        }

        fn builder(&self) -> RequestBuilder {
            RequestBuilder::new(Arc::new(self.global.clone()), Arc::new(MockToolkit::new()))
        }
    }

    #[test]
    fn test_chain_without_signing() {
        let fx = Fixture::new();
        let a = fx.artifact("a", b"x");
        let request = fx.builder().create_request(&a, false).unwrap();
        assert!(request.tasks().is_empty());
        assert_eq!(request.filename(), "a.jar");
        assert_eq!(request.original_file(), fx.dir.path().join("work/a/a.jar"));
        assert_eq!(request.final_file(), fx.dir.path().join("out/a.jar"));
        assert!(!request.is_uptodate());
    }

    #[test]
    fn test_chain_full() {
        let mut fx = Fixture::new().signing();
        fx.global.unsign_already_signed_jars = true;
        fx.global.pack200.enabled = true;
        fx.global.update_manifest_entries =
            BTreeMap::from([("Codebase".to_string(), "*".to_string())]);

        let signed = fx.artifact("signed", &[SIGNED_MARKER, b"body".as_slice()].concat());
        let request = fx.builder().create_request(&signed, true).unwrap();
        assert_eq!(
            request.tasks(),
            &[
                Task::Unsign,
                Task::Pack200,
                Task::UnPack200,
                Task::UpdateManifest,
                Task::Sign,
                Task::Pack200
            ]
        );
        assert_eq!(request.filename(), "signed-1.0.jar");
        assert_eq!(
            request.stage_directory(0).unwrap(),
            fx.dir.path().join("work/signed-1.0/0_Unsign")
        );
        assert_eq!(
            request.stage_directory(5).unwrap(),
            fx.dir.path().join("work/signed-1.0/5_Pack200")
        );
        assert!(request.stage_directory(6).is_none());
        assert_eq!(
            request.packed_file().unwrap(),
            fx.dir.path().join("out/signed-1.0.jar.pack")
        );

        let plain = fx.artifact("plain", b"body");
        let request = fx.builder().create_request(&plain, true).unwrap();
        assert_eq!(request.tasks().first(), Some(&Task::Pack200));
    }

    #[test]
    fn test_pack_only_chain() {
        let mut fx = Fixture::new();
        fx.global.pack200.enabled = true;
        let a = fx.artifact("a", b"x");
        let request = fx.builder().create_request(&a, false).unwrap();
        assert_eq!(request.tasks(), &[Task::Pack200]);
        assert!(!request.is_signing());
    }

    #[test]
    fn test_signed_jar_without_unsign_permission() {
        let mut fx = Fixture::new().signing();
        fx.global.unsign_already_signed_jars = true;
        fx.global.can_unsign = false;

        let signed = fx.artifact("signed", &[SIGNED_MARKER, b"body".as_slice()].concat());
        let err = fx.builder().create_request(&signed, false).unwrap_err();
        assert!(matches!(
            err,
            RequestError::Config(ConfigError::UnsignNotPermitted { .. })
        ));

        let plain = fx.artifact("plain", b"body");
        assert!(fx.builder().create_request(&plain, false).is_ok());
    }

    #[test]
    fn test_missing_resolved_file() {
        let fx = Fixture::new();
        let ghost = Artifact::new("g", "ghost", "1", fx.dir.path().join("nope.jar"));
        let err = fx.builder().create_request(&ghost, false).unwrap_err();
        assert!(matches!(err, RequestError::Io { .. }));
    }

    #[test]
    fn test_uptodate_requires_both_copies() {
        let fx = Fixture::new();
        let a = fx.artifact("a", b"x");
        let builder = fx.builder();

        let request = builder.create_request(&a, false).unwrap();
        fs::create_dir_all(request.original_file().parent().unwrap()).unwrap();
        fs::write(request.original_file(), b"x").unwrap();
        assert!(!builder.create_request(&a, false).unwrap().is_uptodate());

        fs::create_dir_all(request.final_file().parent().unwrap()).unwrap();
        fs::write(request.final_file(), b"x").unwrap();
        assert!(builder.create_request(&a, false).unwrap().is_uptodate());

        // Source touched after the copies were made
        File::options()
            .write(true)
            .open(a.file())
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        assert!(!builder.create_request(&a, false).unwrap().is_uptodate());
    }

    #[test]
    fn test_ids_are_distinct() {
        let fx = Fixture::new();
        let builder = fx.builder();
        let a = fx.artifact("a", b"x");
        let b = fx.artifact("b", b"y");
        let first = builder.create_request(&a, false).unwrap();
        let second = builder.create_request(&b, false).unwrap();
        assert_ne!(first.id(), second.id());
    }
}

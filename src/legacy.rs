//! Single-pass directory processing (deprecated)
//!
//! Works on one directory holding `unprocessed_`-prefixed jars and runs each
//! stage over the whole batch before starting the next:
//!
//! unsign all → pack all → unpack all → sign all | rename all → pack all
//!
//! Kept for layouts that predate per-dependency working directories. New
//! callers should use [`crate::pipeline::Pipeline::run`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use webstart_jar::{JarToolkit, ToolError};

use crate::artifact::Artifact;
use crate::config::{ConfigError, DependencyConfig, GlobalConfig};
use crate::filter::{list_files, FileFilter};
use crate::retry::Toucher;
use crate::task::{Task, TaskError};

/// Prefix marking a jar that has not been through the stages yet
pub const UNPROCESSED_PREFIX: &str = "unprocessed_";

const SCRATCH_DIR: &str = ".legacy-work";

/// Errors from the legacy path. All are fatal for the batch.
#[derive(Debug, thiserror::Error)]
pub enum LegacyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{} does not carry the {UNPROCESSED_PREFIX} prefix", .0.display())]
    MissingPrefix(PathBuf),

    #[error("{task} failed for {}: {source}", path.display())]
    Task {
        task: Task,
        path: PathBuf,
        #[source]
        source: TaskError,
    },

    #[error("cannot inspect {}: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Run-wide state of a legacy invocation
#[derive(Debug, Clone)]
pub struct LegacyContext {
    start_time: SystemTime,
    global: Arc<GlobalConfig>,
}

impl LegacyContext {
    /// Capture the start time, truncated to whole seconds so files staged
    /// during this run match `modified_since` on coarse filesystems
    pub fn new(global: Arc<GlobalConfig>) -> Self {
        let now = SystemTime::now();
        let secs = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::with_start_time(global, UNIX_EPOCH + Duration::from_secs(secs))
    }

    pub fn with_start_time(global: Arc<GlobalConfig>, start_time: SystemTime) -> Self {
        Self { start_time, global }
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }
}

/// Copy `artifact` into `dir` as `unprocessed_<filename>` unless
/// `dir/<filename>` is already newer than it.
///
/// Returns whether the artifact was staged.
pub fn stage_unprocessed(
    artifact: &Artifact,
    filename: &str,
    dir: &Path,
    toucher: &Toucher,
) -> io::Result<bool> {
    let final_file = dir.join(filename);
    let source_modified = artifact.last_modified()?;
    let current = fs::metadata(&final_file)
        .and_then(|m| m.modified())
        .map(|modified| modified > source_modified)
        .unwrap_or(false);
    if current {
        tracing::debug!(filename, "already deployed");
        return Ok(false);
    }

    fs::create_dir_all(dir)?;
    let staged = dir.join(format!("{UNPROCESSED_PREFIX}{filename}"));
    fs::copy(artifact.file(), &staged)?;
    toucher.touch(&staged);
    Ok(true)
}

/// Refuse a batch holding a signed jar when signed jars must be unsigned
/// and unsigning is not permitted. Runs before anything is staged or
/// transformed.
pub fn check_unsign_permitted<'a, I>(
    global: &GlobalConfig,
    toolkit: &dyn JarToolkit,
    jars: I,
) -> Result<(), LegacyError>
where
    I: IntoIterator<Item = (String, &'a Path)>,
{
    if !(global.is_sign() && global.unsign_already_signed_jars && !global.can_unsign) {
        return Ok(());
    }
    for (name, path) in jars {
        let signed = toolkit
            .is_signed(path)
            .map_err(|source| LegacyError::Inspect {
                path: path.to_path_buf(),
                source,
            })?;
        if signed {
            return Err(ConfigError::UnsignNotPermitted { artifact: name }.into());
        }
    }
    Ok(())
}

/// What a legacy run produced
#[derive(Debug, Default)]
pub struct LegacyReport {
    /// Finalized jars, sorted
    pub processed: Vec<PathBuf>,
    /// Jars signed in this run
    pub signed_count: usize,
    /// Distribution pack200 files
    pub packed: Vec<PathBuf>,
}

/// Runs the batch stages over one directory
pub struct LegacyProcessor {
    context: LegacyContext,
    toolkit: Arc<dyn JarToolkit>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Name without the unprocessed prefix; a missing prefix is fatal
fn strip_prefix(path: &Path) -> Result<String, LegacyError> {
    file_name(path)
        .strip_prefix(UNPROCESSED_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LegacyError::MissingPrefix(path.to_path_buf()))
}

fn require_prefix(path: &Path) -> Result<(), LegacyError> {
    strip_prefix(path).map(|_| ())
}

impl LegacyProcessor {
    pub fn new(context: LegacyContext, toolkit: Arc<dyn JarToolkit>) -> Self {
        Self { context, toolkit }
    }

    pub fn context(&self) -> &LegacyContext {
        &self.context
    }

    fn task_config(&self, dir: &Path) -> DependencyConfig {
        let global = Arc::clone(&self.context.global);
        let strategy = global.filename_mapping.strategy();
        DependencyConfig::new(
            global,
            dir.join(SCRATCH_DIR),
            self.context.global.output_jar_versions,
            strategy,
        )
    }

    /// Run `task` on `input` and move its output to `dir/target_name`
    fn run_into(
        &self,
        config: &DependencyConfig,
        task: Task,
        input: &Path,
        dir: &Path,
        target_name: &str,
    ) -> Result<PathBuf, LegacyError> {
        let scratch = config.working_directory().join(task.name());
        let output = task
            .execute(config, self.toolkit.as_ref(), input, &scratch)
            .map_err(|source| LegacyError::Task {
                task,
                path: input.to_path_buf(),
                source,
            })?;
        let target = dir.join(target_name);
        fs::rename(&output, &target)?;
        Ok(target)
    }

    /// Process every unprocessed jar staged since the context's start time
    pub fn process_directory(&self, dir: &Path) -> Result<LegacyReport, LegacyError> {
        tracing::warn!(
            dir = %dir.display(),
            "single-pass processing is deprecated; use per-dependency processing"
        );
        let global = self.context.global();
        let config = self.task_config(dir);
        let ext = global.pack_extension();

        let staged = FileFilter::is_jar()
            .and(FileFilter::is_unprocessed())
            .and(FileFilter::modified_since(self.context.start_time));
        let unprocessed = list_files(dir, &staged)?;
        tracing::info!(count = unprocessed.len(), "legacy batch");

        let mut report = LegacyReport::default();
        if unprocessed.is_empty() {
            return Ok(report);
        }
        check_unsign_permitted(
            global,
            self.toolkit.as_ref(),
            unprocessed.iter().map(|jar| (file_name(jar), jar.as_path())),
        )?;

        if global.is_sign() {
            if global.unsign_already_signed_jars {
                for jar in &unprocessed {
                    require_prefix(jar)?;
                    let signed = self.toolkit.is_signed(jar).map_err(|source| {
                        LegacyError::Inspect {
                            path: jar.clone(),
                            source,
                        }
                    })?;
                    if signed {
                        self.run_into(&config, Task::Unsign, jar, dir, &file_name(jar))?;
                    }
                }
            }

            if global.is_pack200() {
                let mut packed = Vec::with_capacity(unprocessed.len());
                for jar in &unprocessed {
                    require_prefix(jar)?;
                    let name = format!("{}{ext}", file_name(jar));
                    packed.push(self.run_into(&config, Task::Pack200, jar, dir, &name)?);
                }
                for pack in &packed {
                    require_prefix(pack)?;
                    let name = file_name(pack)
                        .strip_suffix(ext)
                        .map(str::to_string)
                        .unwrap_or_default();
                    self.run_into(&config, Task::UnPack200, pack, dir, &name)?;
                    fs::remove_file(pack)?;
                }
            }

            for jar in &unprocessed {
                let target = strip_prefix(jar)?;
                let signed = self.run_into(&config, Task::Sign, jar, dir, &target)?;
                fs::remove_file(jar)?;
                report.signed_count += 1;
                report.processed.push(signed);
            }
        } else {
            for jar in &unprocessed {
                let target = dir.join(strip_prefix(jar)?);
                fs::rename(jar, &target)?;
                report.processed.push(target);
            }
        }

        if global.is_pack200() {
            for jar in &report.processed {
                let name = format!("{}{ext}", file_name(jar));
                report
                    .packed
                    .push(self.run_into(&config, Task::Pack200, jar, dir, &name)?);
            }
        }

        let scratch = config.working_directory();
        if scratch.exists() {
            fs::remove_dir_all(scratch)?;
        }
        report.processed.sort();
        tracing::info!(
            processed = report.processed.len(),
            signed = report.signed_count,
            "legacy batch done"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignConfig;
    use crate::mock::{FailingMtime, MockToolkit, ToolOp, PACK_MARKER, SIGNED_MARKER};
    use crate::retry::Sleeper;
    use std::fs::File;
    use tempfile::TempDir;

    fn sign() -> SignConfig {
        toml::from_str("keystore = \"k\"\nalias = \"a\"\nstorepass = \"p\"").unwrap()
    }

    fn stage(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(format!("{UNPROCESSED_PREFIX}{name}"));
        fs::write(&path, content).unwrap();
        path
    }

    fn processor(global: GlobalConfig, toolkit: Arc<MockToolkit>) -> LegacyProcessor {
        let context = LegacyContext::with_start_time(
            Arc::new(global),
            SystemTime::now() - Duration::from_secs(5),
        );
        LegacyProcessor::new(context, toolkit)
    }

    #[test]
    fn test_rename_without_signing() {
        let dir = TempDir::new().unwrap();
        stage(dir.path(), "a.jar", b"a");
        stage(dir.path(), "b.jar", b"b");

        let toolkit = Arc::new(MockToolkit::new());
        let report = processor(GlobalConfig::default(), toolkit.clone())
            .process_directory(dir.path())
            .unwrap();

        assert_eq!(report.processed.len(), 2);
        assert_eq!(report.signed_count, 0);
        assert_eq!(fs::read(dir.path().join("a.jar")).unwrap(), b"a");
        assert!(!dir.path().join("unprocessed_a.jar").exists());
        assert!(toolkit.calls().is_empty());
    }

    #[test]
    fn test_stages_run_as_batch_barriers() {
        let dir = TempDir::new().unwrap();
        stage(dir.path(), "a.jar", &[SIGNED_MARKER, b"a".as_slice()].concat());
        stage(dir.path(), "b.jar", b"b");

        let mut global = GlobalConfig::default();
        global.sign = Some(sign());
        global.pack200.enabled = true;
        global.unsign_already_signed_jars = true;

        let toolkit = Arc::new(MockToolkit::new());
        let report = processor(global, toolkit.clone())
            .process_directory(dir.path())
            .unwrap();

        let ops: Vec<ToolOp> = toolkit.calls().iter().map(|c| c.op).collect();
        assert_eq!(
            ops,
            vec![
                ToolOp::Unsign,
                ToolOp::Pack,
                ToolOp::Pack,
                ToolOp::Unpack,
                ToolOp::Unpack,
                ToolOp::Sign,
                ToolOp::Sign,
                ToolOp::Pack,
                ToolOp::Pack,
            ]
        );
        assert_eq!(report.signed_count, 2);
        assert_eq!(report.packed.len(), 2);

        let a = fs::read(dir.path().join("a.jar")).unwrap();
        assert_eq!(a, [SIGNED_MARKER, b"a".as_slice()].concat());
        assert!(fs::read(dir.path().join("b.jar.pack"))
            .unwrap()
            .starts_with(PACK_MARKER));

        let leftovers = list_files(dir.path(), &FileFilter::is_unprocessed()).unwrap();
        assert!(leftovers.is_empty(), "{leftovers:?}");
        assert!(!dir.path().join(SCRATCH_DIR).exists());
    }

    #[test]
    fn test_files_older_than_start_are_ignored() {
        let dir = TempDir::new().unwrap();
        let old = stage(dir.path(), "old.jar", b"old");
        File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
        stage(dir.path(), "new.jar", b"new");

        let report = processor(GlobalConfig::default(), Arc::new(MockToolkit::new()))
            .process_directory(dir.path())
            .unwrap();
        assert_eq!(report.processed, vec![dir.path().join("new.jar")]);
        assert!(old.exists());
    }

    #[test]
    fn test_sign_failure_aborts_batch() {
        let dir = TempDir::new().unwrap();
        stage(dir.path(), "a.jar", b"a");
        let mut global = GlobalConfig::default();
        global.sign = Some(sign());

        let toolkit = Arc::new(MockToolkit::new());
        toolkit.fail_on(ToolOp::Sign, "a.jar");
        let err = processor(global, toolkit)
            .process_directory(dir.path())
            .unwrap_err();
        assert!(matches!(err, LegacyError::Task { task: Task::Sign, .. }));
        assert!(dir.path().join("unprocessed_a.jar").exists());
    }

    #[test]
    fn test_missing_prefix_is_fatal() {
        let err = strip_prefix(Path::new("/lib/a.jar")).unwrap_err();
        assert!(matches!(err, LegacyError::MissingPrefix(_)));
        assert!(strip_prefix(Path::new("/lib/unprocessed_")).is_err());
        assert_eq!(strip_prefix(Path::new("/lib/unprocessed_a.jar")).unwrap(), "a.jar");
    }

    #[test]
    fn test_stage_unprocessed() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("a-1.0.jar");
        fs::write(&repo, b"a").unwrap();
        File::options()
            .write(true)
            .open(&repo)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();
        let artifact = Artifact::new("g", "a", "1.0", &repo);
        let lib = dir.path().join("lib");

        let toucher = Toucher::new();
        assert!(stage_unprocessed(&artifact, "a.jar", &lib, &toucher).unwrap());
        assert!(lib.join("unprocessed_a.jar").exists());

        fs::rename(lib.join("unprocessed_a.jar"), lib.join("a.jar")).unwrap();
        assert!(!stage_unprocessed(&artifact, "a.jar", &lib, &toucher).unwrap());
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    #[test]
    fn test_stage_survives_failed_timestamp_update() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("a-1.0.jar");
        fs::write(&repo, b"a").unwrap();
        let artifact = Artifact::new("g", "a", "1.0", &repo);
        let lib = dir.path().join("lib");

        let mtime = Arc::new(FailingMtime::new());
        let toucher = Toucher::new()
            .with_sleeper(Arc::new(NoSleep))
            .with_writer(mtime.clone());
        assert!(stage_unprocessed(&artifact, "a.jar", &lib, &toucher).unwrap());
        assert_eq!(fs::read(lib.join("unprocessed_a.jar")).unwrap(), b"a");
        assert_eq!(mtime.attempts(), 3);
    }

    #[test]
    fn test_signed_jar_without_unsign_permission_is_refused_upfront() {
        let dir = TempDir::new().unwrap();
        stage(dir.path(), "plain.jar", b"plain");
        stage(dir.path(), "vendor.jar", &[SIGNED_MARKER, b"v".as_slice()].concat());

        let mut global = GlobalConfig::default();
        global.sign = Some(sign());
        global.pack200.enabled = true;
        global.unsign_already_signed_jars = true;
        global.can_unsign = false;

        let toolkit = Arc::new(MockToolkit::new());
        let err = processor(global, toolkit.clone())
            .process_directory(dir.path())
            .unwrap_err();

        assert!(matches!(
            err,
            LegacyError::Config(ConfigError::UnsignNotPermitted { ref artifact })
                if artifact == "unprocessed_vendor.jar"
        ));
        assert!(toolkit.calls().is_empty());
        assert!(dir.path().join("unprocessed_plain.jar").exists());
        assert!(!dir.path().join("plain.jar").exists());
    }

    #[test]
    fn test_context_start_time_is_whole_seconds() {
        let context = LegacyContext::new(Arc::new(GlobalConfig::default()));
        let since_epoch = context.start_time().duration_since(UNIX_EPOCH).unwrap();
        assert_eq!(since_epoch.subsec_nanos(), 0);
    }
}

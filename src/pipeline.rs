//! Pipeline orchestration
//!
//! One invocation:
//! - select deployable dependencies
//! - build every request, surfacing configuration errors before any
//!   side effect
//! - generate the signing keystore (when configured)
//! - execute the requests on the worker pool
//! - check the signed-count invariant
//! - write the dependency listing

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use webstart_jar::{JarToolkit, ToolError};

use crate::artifact::{Artifact, DependencySelector};
use crate::config::{ConfigError, GlobalConfig};
use crate::executor::{Executor, RequestOutcome, Results};
use crate::legacy::{
    check_unsign_permitted, stage_unprocessed, LegacyContext, LegacyError, LegacyProcessor,
    LegacyReport,
};
use crate::listing::{DependencyListing, DeployedJar, ListingError};
use crate::request::{Request, RequestBuilder, RequestError};
use crate::retry::{Sleeper, Toucher};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Request(#[from] RequestError),

    #[error("keystore generation failed: {0}")]
    Keystore(#[source] ToolError),

    #[error("{} dependencies failed ({not_started} not started): {}", failures.len(), failures.join("; "))]
    DependenciesFailed {
        failures: Vec<String>,
        not_started: usize,
    },

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("legacy processing failed: {0}")]
    Legacy(#[from] LegacyError),

    #[error("listing error: {0}")]
    Listing(#[from] ListingError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 2,
            PipelineError::Request(RequestError::Config(_)) => 2,
            PipelineError::Request(_) => 10,
            PipelineError::Keystore(_) => 20,
            PipelineError::DependenciesFailed { .. } => 50,
            PipelineError::Listing(_) => 60,
            PipelineError::Invariant(_) => 70,
            PipelineError::Legacy(LegacyError::MissingPrefix(_)) => 70,
            PipelineError::Legacy(_) => 50,
            PipelineError::Io(_) => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Outcome of a successful run
#[derive(Debug)]
pub struct PipelineReport {
    pub results: Results,
    pub listing: DependencyListing,
    /// Requests that were not up to date when planned
    pub modified: usize,
}

/// Dependency pipeline bound to one configuration and toolkit
pub struct Pipeline {
    global: Arc<GlobalConfig>,
    toolkit: Arc<dyn JarToolkit>,
    toucher: Toucher,
}

impl Pipeline {
    /// Validate `global` and bind it to `toolkit`
    pub fn new(global: GlobalConfig, toolkit: Arc<dyn JarToolkit>) -> PipelineResult<Self> {
        global.validate()?;
        Ok(Self {
            global: Arc::new(global),
            toolkit,
            toucher: Toucher::new(),
        })
    }

    /// Replace the delay source used by timestamp retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.toucher = self.toucher.with_sleeper(sleeper);
        self
    }

    /// Replace the timestamp updater used after copies
    pub fn with_toucher(mut self, toucher: Toucher) -> Self {
        self.toucher = toucher;
        self
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    fn builder(&self) -> RequestBuilder {
        RequestBuilder::new(Arc::clone(&self.global), Arc::clone(&self.toolkit))
    }

    /// Deployable artifacts, in input order.
    ///
    /// Two artifacts mapping to the same final filename is an error.
    pub fn select(&self, artifacts: &[Artifact]) -> Result<Vec<Artifact>, ConfigError> {
        let selector = DependencySelector::from_config(
            &self.global.dependencies,
            self.global.exclude_transitive,
        )?;
        let selected = selector.select(artifacts);

        let builder = self.builder();
        let mut seen: HashMap<String, &Artifact> = HashMap::new();
        for artifact in &selected {
            let filename = builder.filename(artifact, self.global.output_jar_versions);
            if let Some(first) = seen.get(&filename) {
                return Err(ConfigError::FilenameCollision {
                    filename,
                    first: first.to_string(),
                    second: artifact.to_string(),
                });
            }
            seen.insert(filename, artifact);
        }

        tracing::info!(
            resolved = artifacts.len(),
            selected = selected.len(),
            "selected dependencies"
        );
        Ok(selected)
    }

    /// Build the request for every selected artifact
    pub fn plan(&self, artifacts: &[Artifact]) -> PipelineResult<Vec<Request>> {
        let selected = self.select(artifacts)?;
        let builder = self.builder();
        let requests = selected
            .iter()
            .map(|a| builder.create_request(a, self.global.output_jar_versions))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    /// Generate the signing key when `sign.keystore_config.generate` is set.
    ///
    /// Returns whether a keystore was generated.
    pub fn generate_keystore(&self) -> PipelineResult<bool> {
        let Some(request) = self.global.sign.as_ref().and_then(|s| s.keystore_request()) else {
            return Ok(false);
        };
        tracing::info!(keystore = %request.identity.keystore.display(), "generating keystore");
        self.toolkit
            .generate_keystore(&request)
            .map_err(PipelineError::Keystore)?;
        Ok(true)
    }

    /// Process all artifacts
    pub fn run(&self, artifacts: &[Artifact]) -> PipelineResult<PipelineReport> {
        self.run_with(artifacts, |_| {})
    }

    /// Process all artifacts, calling `on_complete` per finished request
    pub fn run_with<F>(&self, artifacts: &[Artifact], on_complete: F) -> PipelineResult<PipelineReport>
    where
        F: Fn(&RequestOutcome) + Sync,
    {
        let requests = self.plan(artifacts)?;
        self.generate_keystore()?;

        let modified = requests.iter().filter(|r| !r.is_uptodate()).count();
        let deployed: Vec<DeployedJar> = requests
            .iter()
            .map(|r| DeployedJar {
                filename: r.filename().to_string(),
                version: r.artifact().version.clone(),
                final_file: r.final_file().to_path_buf(),
                packed_file: r.packed_file(),
            })
            .collect();

        let executor = Executor::new(Arc::clone(&self.toolkit), self.global.max_threads)
            .with_fail_fast(self.global.fail_fast)
            .with_toucher(self.toucher.clone());
        let results = executor.execute_with(requests, on_complete);

        tracing::info!(
            processed = results.processed_count(),
            uptodate = results.uptodate_count(),
            failed = results.errors().len(),
            not_started = results.not_started_count(),
            "dependencies done"
        );

        if results.has_errors() {
            return Err(PipelineError::DependenciesFailed {
                failures: results.errors().iter().map(|e| e.to_string()).collect(),
                not_started: results.not_started_count(),
            });
        }

        check_signed_count(&self.global, results.signed_count(), modified)?;

        let lib_dir = self.global.lib_directory();
        let listing = DependencyListing::build(
            &deployed,
            self.global.lib_path.as_deref(),
            self.global.output_jar_versions,
            self.global.main_class.as_deref(),
            self.toolkit.as_ref(),
        )?;
        for extra in listing.find_extra_files(&lib_dir)? {
            tracing::warn!(file = %extra.display(), "file in lib directory is not a current dependency");
        }

        Ok(PipelineReport {
            results,
            listing,
            modified,
        })
    }

    /// Process all artifacts through the single-pass directory path
    pub fn run_legacy(&self, artifacts: &[Artifact]) -> PipelineResult<LegacyReport> {
        let selected = self.select(artifacts)?;
        check_unsign_permitted(
            &self.global,
            self.toolkit.as_ref(),
            selected.iter().map(|a| (a.to_string(), a.file())),
        )
        .map_err(legacy_error)?;
        self.generate_keystore()?;

        let context = LegacyContext::new(Arc::clone(&self.global));
        let lib_dir = self.global.lib_directory();
        let builder = self.builder();

        let mut modified = 0;
        for artifact in &selected {
            let filename = builder.filename(artifact, self.global.output_jar_versions);
            if stage_unprocessed(artifact, &filename, &lib_dir, &self.toucher)? {
                modified += 1;
            }
        }

        let report = self.process_legacy_directory(context, &lib_dir)?;
        check_signed_count(&self.global, report.signed_count, modified)?;
        Ok(report)
    }

    /// Run the single-pass stages over jars already staged in `dir`
    pub fn process_legacy_directory(
        &self,
        context: LegacyContext,
        dir: &Path,
    ) -> PipelineResult<LegacyReport> {
        let processor = LegacyProcessor::new(context, Arc::clone(&self.toolkit));
        processor.process_directory(dir).map_err(legacy_error)
    }
}

/// Configuration errors keep their category whichever path raised them
fn legacy_error(error: LegacyError) -> PipelineError {
    match error {
        LegacyError::Config(e) => PipelineError::Config(e),
        other => PipelineError::Legacy(other),
    }
}

/// Every modified dependency must have been signed when signing is on
fn check_signed_count(global: &GlobalConfig, signed: usize, modified: usize) -> PipelineResult<()> {
    if global.is_sign() && signed != modified {
        return Err(PipelineError::Invariant(format!(
            "signed {signed} jars but {modified} dependencies were modified"
        )));
    }
    Ok(())
}

//! Parallel request executor
//!
//! Each request runs its whole chain on one worker thread:
//! 1. copy the resolved file to `<working>/<filename>`
//! 2. run task `i` in `<working>/<i>_<Task>/` on a fresh copy of the
//!    previous output
//! 3. copy the last jar (and packed companion) to the final directory
//!
//! A stage failure ends that request only. With fail-fast, no request
//! starts after the first failure is recorded.

mod pool;
mod results;

pub use pool::WorkerPool;
pub use results::{ProcessError, RequestOutcome, RequestState, Results, ResultsCollector, Stage};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use webstart_jar::JarToolkit;

use crate::request::Request;
use crate::retry::{RetryPolicy, Sleeper, Toucher};
use crate::task::TaskError;

/// Runs requests on a bounded worker pool
pub struct Executor {
    toolkit: Arc<dyn JarToolkit>,
    toucher: Toucher,
    pool: WorkerPool,
    fail_fast: bool,
}

impl Executor {
    pub fn new(toolkit: Arc<dyn JarToolkit>, threads: usize) -> Self {
        Self {
            toolkit,
            toucher: Toucher::new(),
            pool: WorkerPool::new(threads),
            fail_fast: true,
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.toucher = self.toucher.with_sleeper(sleeper);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.toucher = self.toucher.with_policy(retry);
        self
    }

    /// Replace the timestamp updater used after each copy
    pub fn with_toucher(mut self, toucher: Toucher) -> Self {
        self.toucher = toucher;
        self
    }

    /// Run all requests and wait for them
    pub fn execute(&self, requests: Vec<Request>) -> Results {
        self.execute_with(requests, |_| {})
    }

    /// Run all requests, calling `on_complete` as each one finishes
    pub fn execute_with<F>(&self, requests: Vec<Request>, on_complete: F) -> Results
    where
        F: Fn(&RequestOutcome) + Sync,
    {
        tracing::info!(
            requests = requests.len(),
            threads = self.pool.threads(),
            fail_fast = self.fail_fast,
            "executing requests"
        );

        let collector = ResultsCollector::new();
        let stop = AtomicBool::new(false);

        let not_started = self.pool.run(
            requests,
            &stop,
            |request| self.process(request),
            |_, outcome| {
                if outcome.error.is_some() && self.fail_fast {
                    stop.store(true, Ordering::SeqCst);
                }
                on_complete(&outcome);
                collector.insert(outcome);
            },
        );

        if !not_started.is_empty() {
            tracing::warn!(
                count = not_started.len(),
                "fail-fast: requests not started"
            );
        }
        for request in &not_started {
            collector.insert(RequestOutcome::pending(request));
        }

        collector.into_results()
    }

    /// Run one request's chain on the calling thread
    pub fn process(&self, request: &Request) -> RequestOutcome {
        let _span = tracing::info_span!("request", artifact = %request.artifact()).entered();
        let mut outcome = RequestOutcome::pending(request);

        if request.is_uptodate() {
            outcome.transition(RequestState::UpToDate);
            tracing::info!(filename = request.filename(), "up to date");
            return outcome;
        }

        outcome.transition(RequestState::Running);
        match self.run_chain(request, &mut outcome) {
            Ok(()) => {
                outcome.signed = request.is_signing();
                outcome.transition(RequestState::Done);
                tracing::info!(
                    filename = request.filename(),
                    tasks = outcome.tasks_run.len(),
                    "processed"
                );
            }
            Err(error) => {
                tracing::error!(stage = %error.stage, error = %error.cause, "processing failed");
                outcome.error = Some(error);
                outcome.transition(RequestState::Failed);
            }
        }
        outcome
    }

    fn run_chain(&self, request: &Request, outcome: &mut RequestOutcome) -> Result<(), ProcessError> {
        let original = request.original_file();
        copy_into(request.artifact().file(), original)
            .map_err(|e| ProcessError::new(request, Stage::Copy, e))?;
        self.toucher.touch(original);

        let mut current = original.to_path_buf();
        let mut last_jar = current.clone();

        for (index, task, stage_dir) in request.stages() {
            let fail = |e: TaskError| ProcessError::at_task(request, index, task, e);
            let input = fresh_stage(&stage_dir, &current).map_err(|e| fail(e.into()))?;
            let output = task
                .execute(request.config(), self.toolkit.as_ref(), &input, &stage_dir)
                .map_err(fail)?;

            tracing::debug!(stage = %format!("{index}_{task}"), output = %output.display(), "stage done");
            outcome.tasks_run.push(task);
            if output.extension().map(|e| e == "jar").unwrap_or(false) {
                last_jar = output.clone();
            }
            current = output;
        }

        let deploy = |e: io::Error| ProcessError::new(request, Stage::Deploy, e);
        copy_into(&last_jar, request.final_file()).map_err(deploy)?;
        self.toucher.touch(request.final_file());
        if let Some(packed) = request.packed_file() {
            copy_into(&current, &packed).map_err(deploy)?;
            self.toucher.touch(&packed);
        }
        Ok(())
    }
}

/// Copy `from` to `to`, creating parent directories
fn copy_into(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

/// Recreate `stage_dir` and place a copy of `previous` in its `input/`
fn fresh_stage(stage_dir: &Path, previous: &Path) -> io::Result<PathBuf> {
    if stage_dir.exists() {
        fs::remove_dir_all(stage_dir)?;
    }
    let name = previous
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "stage input has no name"))?;
    let input = stage_dir.join("input").join(name);
    copy_into(previous, &input)?;
    Ok(input)
}

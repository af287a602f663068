//! Per-request outcomes
//!
//! Request states: PENDING → {UP_TO_DATE | RUNNING → {DONE | FAILED}}.
//! Requests left PENDING after a run were never started (fail-fast).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;

use crate::request::{Request, RequestId};
use crate::task::{Task, TaskError};

/// Request state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    /// Not started
    Pending,
    /// Output of a previous run reused
    UpToDate,
    /// Chain executing
    Running,
    /// Chain completed and final file written
    Done,
    /// A stage failed
    Failed,
}

impl RequestState {
    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: RequestState) -> bool {
        matches!(
            (self, target),
            (RequestState::Pending, RequestState::UpToDate)
                | (RequestState::Pending, RequestState::Running)
                | (RequestState::Running, RequestState::Done)
                | (RequestState::Running, RequestState::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::UpToDate | RequestState::Done | RequestState::Failed
        )
    }
}

/// Where in a chain a failure happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Copying the resolved file into the working directory
    Copy,
    /// A chain task, with its position
    Task { index: usize, task: String },
    /// Copying the result to the final directory
    Deploy,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Copy => f.write_str("copy"),
            Stage::Task { index, task } => write!(f, "{index}_{task}"),
            Stage::Deploy => f.write_str("deploy"),
        }
    }
}

/// Failure of one dependency's chain
#[derive(Debug, thiserror::Error)]
#[error("{artifact} failed at {stage}: {cause}")]
pub struct ProcessError {
    pub artifact: String,
    pub stage: Stage,
    #[source]
    pub cause: TaskError,
}

impl ProcessError {
    pub fn new(request: &Request, stage: Stage, cause: impl Into<TaskError>) -> Self {
        Self {
            artifact: request.artifact().to_string(),
            stage,
            cause: cause.into(),
        }
    }

    pub fn at_task(request: &Request, index: usize, task: Task, cause: TaskError) -> Self {
        Self::new(
            request,
            Stage::Task {
                index,
                task: task.to_string(),
            },
            cause,
        )
    }
}

/// Outcome of one request
#[derive(Debug)]
pub struct RequestOutcome {
    pub id: RequestId,
    pub artifact: String,
    pub filename: String,
    pub state: RequestState,
    pub final_file: PathBuf,
    pub packed_file: Option<PathBuf>,
    /// Chain contains Sign and ran in this invocation
    pub signed: bool,
    /// Tasks that completed, in order
    pub tasks_run: Vec<Task>,
    pub error: Option<ProcessError>,
}

impl RequestOutcome {
    /// A request that has not (yet) started
    pub fn pending(request: &Request) -> Self {
        Self {
            id: request.id(),
            artifact: request.artifact().to_string(),
            filename: request.filename().to_string(),
            state: RequestState::Pending,
            final_file: request.final_file().to_path_buf(),
            packed_file: request.packed_file(),
            signed: false,
            tasks_run: Vec::new(),
            error: None,
        }
    }

    /// Move to `target`, ignoring invalid transitions
    pub fn transition(&mut self, target: RequestState) -> bool {
        if self.state.can_transition_to(target) {
            self.state = target;
            true
        } else {
            tracing::warn!(
                request = %self.id,
                from = ?self.state,
                to = ?target,
                "invalid request state transition"
            );
            false
        }
    }

    /// Processed in this invocation (not up to date, not skipped)
    pub fn is_processed(&self) -> bool {
        self.state == RequestState::Done
    }
}

/// Aggregated outcomes of one executor run, keyed by request id
#[derive(Debug, Default)]
pub struct Results {
    outcomes: BTreeMap<RequestId, RequestOutcome>,
}

impl Results {
    pub fn get(&self, id: RequestId) -> Option<&RequestOutcome> {
        self.outcomes.get(&id)
    }

    /// All outcomes ordered by request id
    pub fn outcomes(&self) -> impl Iterator<Item = &RequestOutcome> {
        self.outcomes.values()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn count(&self, state: RequestState) -> usize {
        self.outcomes.values().filter(|o| o.state == state).count()
    }

    /// Requests whose chain ran to completion
    pub fn processed_count(&self) -> usize {
        self.count(RequestState::Done)
    }

    pub fn uptodate_count(&self) -> usize {
        self.count(RequestState::UpToDate)
    }

    /// Requests never started because of fail-fast
    pub fn not_started_count(&self) -> usize {
        self.count(RequestState::Pending)
    }

    /// Processed requests that went through signing
    pub fn signed_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| o.is_processed() && o.signed)
            .count()
    }

    pub fn errors(&self) -> Vec<&ProcessError> {
        self.outcomes
            .values()
            .filter_map(|o| o.error.as_ref())
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.outcomes.values().any(|o| o.error.is_some())
    }
}

/// Collector shared between worker threads
#[derive(Debug, Default)]
pub struct ResultsCollector {
    inner: Mutex<Results>,
}

impl ResultsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, outcome: RequestOutcome) {
        let mut results = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        results.outcomes.insert(outcome.id, outcome);
    }

    pub fn into_results(self) -> Results {
        match self.inner.into_inner() {
            Ok(results) => results,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

//! webstart-deps - dependency packaging for Java Web Start deployments
//!
//! Takes the resolved dependencies of a desktop application and lays them
//! out for network deployment: each jar is copied, optionally unsigned,
//! compressed and signed, then renamed into the final directory. Work is
//! cached on file timestamps and runs concurrently across dependencies.

pub mod artifact;
pub mod config;
pub mod executor;
pub mod filter;
pub mod legacy;
pub mod listing;
pub mod mock;
pub mod pipeline;
pub mod request;
pub mod retry;
pub mod task;

pub use artifact::{Artifact, FilenameStrategy, ResolvedArtifacts};
pub use config::{ConfigError, DependencyConfig, GlobalConfig};
pub use executor::{Executor, RequestOutcome, RequestState, Results};
pub use listing::DependencyListing;
pub use pipeline::{Pipeline, PipelineError, PipelineReport};
pub use request::{Request, RequestBuilder};
pub use task::{Task, TaskError};
pub use webstart_jar::{CommandToolkit, JarToolkit};

//! webstart-deps CLI
//!
//! Entry point for the `webstart-deps` command-line tool.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::SystemTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use webstart_deps::legacy::LegacyContext;
use webstart_deps::{
    Artifact, CommandToolkit, ConfigError, GlobalConfig, Pipeline, PipelineError, RequestState,
    ResolvedArtifacts,
};

#[derive(Parser)]
#[command(name = "webstart-deps")]
#[command(about = "Package dependencies for Java Web Start deployment", version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Common {
    /// Path to config file
    #[arg(long, short = 'c', default_value = "webstart.toml")]
    config: PathBuf,

    /// JDK home used to locate jarsigner, keytool and pack200
    #[arg(long)]
    java_home: Option<PathBuf>,

    /// Worker threads (overrides max_threads)
    #[arg(long)]
    threads: Option<usize>,

    /// Stop starting dependencies after the first failure
    #[arg(long, conflicts_with = "no_fail_fast")]
    fail_fast: bool,

    /// Process every dependency even after failures
    #[arg(long)]
    no_fail_fast: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process resolved dependencies into the final directory
    Process {
        #[command(flatten)]
        common: Common,

        /// Resolved artifacts JSON
        #[arg(long, short = 'a')]
        artifacts: PathBuf,

        /// Write the dependency listing here
        #[arg(long)]
        listing: Option<PathBuf>,
    },

    /// Show each dependency's task chain without processing
    Plan {
        #[command(flatten)]
        common: Common,

        /// Resolved artifacts JSON
        #[arg(long, short = 'a')]
        artifacts: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Single-pass processing (deprecated)
    Legacy {
        #[command(flatten)]
        common: Common,

        /// Resolved artifacts JSON; when omitted, only jars already staged
        /// in --dir are processed
        #[arg(long, short = 'a')]
        artifacts: Option<PathBuf>,

        /// Directory of unprocessed jars (default: the lib directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let result = match cli.command {
        Commands::Process {
            common,
            artifacts,
            listing,
        } => load(&common, verbose).and_then(|(pipeline, verbose)| {
            init_logging(verbose);
            run_process(&pipeline, &artifacts, listing.as_deref())
        }),
        Commands::Plan {
            common,
            artifacts,
            json,
        } => load(&common, verbose).and_then(|(pipeline, verbose)| {
            init_logging(verbose);
            run_plan(&pipeline, &artifacts, json)
        }),
        Commands::Legacy {
            common,
            artifacts,
            dir,
        } => load(&common, verbose).and_then(|(pipeline, verbose)| {
            init_logging(verbose);
            run_legacy(&pipeline, artifacts.as_deref(), dir.as_deref())
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Load config, apply CLI overrides, build the pipeline
fn load(common: &Common, verbose: bool) -> Result<(Pipeline, bool), PipelineError> {
    let mut config = GlobalConfig::from_file(&common.config)?;
    if let Some(threads) = common.threads {
        config.max_threads = threads;
    }
    if common.fail_fast {
        config.fail_fast = true;
    }
    if common.no_fail_fast {
        config.fail_fast = false;
    }
    config.verbose |= verbose;
    let verbose = config.verbose;

    let toolkit = match &common.java_home {
        Some(home) => CommandToolkit::new().with_java_home(home),
        None => CommandToolkit::new(),
    };
    let pipeline = Pipeline::new(config, Arc::new(toolkit))?;
    Ok((pipeline, verbose))
}

fn load_artifacts(path: &Path) -> Result<Vec<Artifact>, PipelineError> {
    Ok(ResolvedArtifacts::from_file(path)?.artifacts)
}

fn run_process(
    pipeline: &Pipeline,
    artifacts_path: &Path,
    listing_path: Option<&Path>,
) -> Result<(), PipelineError> {
    let artifacts = load_artifacts(artifacts_path)?;
    let report = pipeline.run_with(&artifacts, |outcome| match outcome.state {
        RequestState::Done => tracing::info!(filename = %outcome.filename, "done"),
        RequestState::UpToDate => tracing::debug!(filename = %outcome.filename, "up to date"),
        RequestState::Failed => tracing::error!(filename = %outcome.filename, "failed"),
        _ => {}
    })?;

    if let Some(path) = listing_path {
        report.listing.write_to_file(path)?;
        tracing::info!(path = %path.display(), "wrote dependency listing");
    }

    println!(
        "{} processed, {} up to date, {} signed",
        report.results.processed_count(),
        report.results.uptodate_count(),
        report.results.signed_count()
    );
    Ok(())
}

#[derive(serde::Serialize)]
struct PlanEntry<'a> {
    artifact: String,
    filename: &'a str,
    tasks: Vec<&'static str>,
    uptodate: bool,
    final_file: &'a Path,
}

fn run_plan(pipeline: &Pipeline, artifacts_path: &Path, json: bool) -> Result<(), PipelineError> {
    let artifacts = load_artifacts(artifacts_path)?;
    let requests = pipeline.plan(&artifacts)?;

    let entries: Vec<PlanEntry> = requests
        .iter()
        .map(|r| PlanEntry {
            artifact: r.artifact().to_string(),
            filename: r.filename(),
            tasks: r.tasks().iter().map(|t| t.name()).collect(),
            uptodate: r.is_uptodate(),
            final_file: r.final_file(),
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&entries).map_err(std::io::Error::from)?;
        println!("{}", out);
        return Ok(());
    }

    for entry in &entries {
        let chain = if entry.tasks.is_empty() {
            "copy".to_string()
        } else {
            entry.tasks.join(" -> ")
        };
        let state = if entry.uptodate { "up to date" } else { "pending" };
        println!("{}  {}  [{}]  {}", entry.filename, entry.artifact, state, chain);
    }
    Ok(())
}

fn run_legacy(
    pipeline: &Pipeline,
    artifacts_path: Option<&Path>,
    dir: Option<&Path>,
) -> Result<(), PipelineError> {
    let report = match (artifacts_path, dir) {
        (Some(_), Some(_)) => {
            return Err(PipelineError::Config(ConfigError::ValidationError(
                "--artifacts and --dir cannot be combined".to_string(),
            )))
        }
        (Some(path), None) => pipeline.run_legacy(&load_artifacts(path)?)?,
        (None, dir) => {
            // Everything already staged counts, whenever it was staged
            let context = LegacyContext::with_start_time(
                Arc::new(pipeline.global().clone()),
                SystemTime::UNIX_EPOCH,
            );
            let dir = dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| pipeline.global().lib_directory());
            pipeline.process_legacy_directory(context, &dir)?
        }
    };

    println!(
        "{} processed, {} signed, {} packed",
        report.processed.len(),
        report.signed_count,
        report.packed.len()
    );
    Ok(())
}

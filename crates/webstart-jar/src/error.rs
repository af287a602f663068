//! Error types for jar primitives

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for jar tool operations
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors raised by jar primitives and external JDK tools
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid pass-file pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("malformed manifest: {0}")]
    Manifest(String),

    #[error("{tool} failed to start: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("signature verification failed for {0}")]
    VerificationFailed(PathBuf),

    #[error("tool produced no output at {0}")]
    MissingOutput(PathBuf),
}

//! Error taxonomy for smellmerge.

use std::path::PathBuf;

use crate::model::ToolId;

/// Errors produced while locating the corpus of repositories.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("'{dir_name}' directory not found from {start:?} or any of its ancestors")]
    NotFound { dir_name: String, start: PathBuf },

    #[error("error reading repositories directory {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline errors.
///
/// Only [`PipelineError::Discovery`] and a [`PipelineError::Filesystem`] on the
/// shared output root abort a run; every other variant is contained at the
/// tool, row or repository level.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{tool} directory not found within project (looked for {subpath:?})")]
    ToolNotFound { tool: ToolId, subpath: PathBuf },

    #[error("{tool} timeout for {repo} (exceeded {timeout_secs}s)")]
    ToolTimeout {
        tool: ToolId,
        repo: String,
        timeout_secs: u64,
    },

    #[error("{tool} error (exit code {exit_code}): {stderr}")]
    ToolExecutionError {
        tool: ToolId,
        exit_code: i32,
        stderr: String,
    },

    #[error("malformed {tool} artifact {path:?}: {reason}")]
    MalformedArtifact {
        tool: ToolId,
        path: PathBuf,
        reason: String,
    },

    #[error("malformed {tool} location {raw:?}")]
    MalformedLocation { tool: ToolId, raw: String },

    #[error("method extraction failed: {0}")]
    EnrichmentFailure(String),

    #[error("filesystem error at {path:?}: {reason}")]
    Filesystem { path: PathBuf, reason: String },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    /// Wrap an I/O failure on `path` as a [`PipelineError::Filesystem`].
    pub fn filesystem(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        PipelineError::Filesystem {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

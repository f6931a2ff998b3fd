//! Ingestion error types
//!
//! Every pipeline stage has its own failure variants. None of them is retried;
//! the orchestrator logs the error with its stage and hands it to the caller.

use std::path::PathBuf;

use brt_common::BrtError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::pipeline::Stage;

/// Result type alias for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Database failure carrying the driver error unmodified
#[derive(Error, Debug)]
#[error("Database operation failed: {0}")]
pub struct StorageError(#[from] pub sqlx::Error);

/// Encoding or decoding failure of a snapshot file
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Pipeline errors, grouped by stage
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Upstream {url} answered HTTP {status}")]
    UpstreamHttp { url: String, status: StatusCode },

    #[error("Request to {url} failed: {source}")]
    UpstreamRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream body is not a valid snapshot: {0}")]
    UpstreamFormat(#[source] BrtError),

    #[error("Snapshot directory does not exist: {}", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("Failed to write snapshot {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Failed to read snapshot {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Failed to provision {object}: {source}")]
    Provisioning {
        object: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestError {
    /// Stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::UpstreamHttp { .. }
            | IngestError::UpstreamRequest { .. }
            | IngestError::UpstreamFormat(_) => Stage::Fetch,
            IngestError::DirectoryMissing(_) | IngestError::Write { .. } => Stage::Persist,
            IngestError::Read { .. } => Stage::Reload,
            IngestError::Provisioning { .. } => Stage::Provision,
            IngestError::Storage(_) => Stage::Insert,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: impl Into<CodecError>) -> Self {
        IngestError::Write {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: impl Into<CodecError>) -> Self {
        IngestError::Read {
            path: path.into(),
            source: source.into(),
        }
    }
}

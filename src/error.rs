//! Errors that refuse or abort a whole import run.
//!
//! Record- and year-level problems are never raised as errors; they are
//! accumulated into [`ImportResult`](crate::models::ImportResult).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// `manifest.json` could not be read.
    #[error("manifest unreadable at {path}: {source}")]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `manifest.json` is not a valid manifest.
    #[error("manifest invalid at {path}: {source}")]
    ManifestInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The integrity gate failed; nothing was imported.
    #[error("integrity check failed with {} error(s): {}", .0.len(), .0.join("; "))]
    IntegrityFailed(Vec<String>),

    /// Legacy conversion could not produce a dataset.
    #[error("conversion failed: {0:#}")]
    Conversion(anyhow::Error),

    /// The item store rejected an operation.
    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

use cinder_core::error::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Job store persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write job store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode job store: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

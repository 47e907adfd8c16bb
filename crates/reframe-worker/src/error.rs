//! Worker error types.

use reframe_media::MediaError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Manifest error: {0}")]
    Manifest(#[from] reframe_models::ManifestError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether every remaining clip would fail the same way.
    pub fn is_batch_fatal(&self) -> bool {
        match self {
            WorkerError::Config(_) => true,
            WorkerError::Media(e) => matches!(
                e,
                MediaError::FfmpegNotFound | MediaError::FfprobeNotFound
            ),
            WorkerError::Manifest(_) | WorkerError::Report(_) | WorkerError::Io(_) => false,
        }
    }
}

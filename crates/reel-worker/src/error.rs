//! Worker error types.

use thiserror::Error;

use reel_models::JobId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Job record not found: {0}")]
    JobNotFound(JobId),

    #[error("No eligible audio track for a {0:.3}s video")]
    NoAudio(f64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] reel_models::ModelError),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] reel_firestore::FirestoreError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// A filter graph the compiler should never have built.
    pub fn is_defect(&self) -> bool {
        matches!(self, WorkerError::Media(e) if e.is_graph_defect())
    }
}

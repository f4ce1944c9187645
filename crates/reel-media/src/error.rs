//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Result type for filter-graph construction.
pub type GraphResult<T> = Result<T, GraphError>;

/// Filter-graph construction defects.
///
/// These never come from bad input data; they mean the assembler wired the
/// graph wrong and must not be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("{primitive} received no input streams")]
    NoInputs { primitive: &'static str },

    #[error("{primitive} expects {expected} input streams, got {actual}")]
    Arity {
        primitive: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Stream label '{0}' is produced twice")]
    DuplicateLabel(String),

    #[error("Stream label '{0}' is consumed before it is produced")]
    UnknownLabel(String),

    #[error("Stream label '{0}' is consumed twice")]
    LabelReused(String),

    #[error("Operation has no outputs")]
    NoOutputs,

    #[error("Wipe of {transition_ms}ms leaves no room in a {scene_ms}ms slide")]
    WipeTooLong { transition_ms: u64, scene_ms: u64 },
}

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Fetch of {url} failed after {attempts} attempts: {message}")]
    FetchFailed {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Filter graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a fetch failure error.
    pub fn fetch_failed(url: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this is a graph construction defect.
    pub fn is_graph_defect(&self) -> bool {
        matches!(self, MediaError::Graph(_))
    }
}

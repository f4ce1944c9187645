//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures of the S3 client, keyed by the object they concern.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage misconfigured: {0}")]
    Config(String),

    #[error("Object {key} does not exist")]
    NotFound { key: String },

    /// URL outside the bucket's public base, so no key can be derived.
    #[error("{0} is not served from this bucket")]
    ForeignUrl(String),

    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("Download of {key} failed: {message}")]
    Download { key: String, message: String },

    #[error("Bucket {bucket} unreachable: {message}")]
    Unreachable { bucket: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn upload(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Upload {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn download(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Download {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_object() {
        assert_eq!(
            StorageError::upload("video/j1/video2.mp4", "timeout").to_string(),
            "Upload of video/j1/video2.mp4 failed: timeout"
        );
        assert_eq!(
            StorageError::not_found("video/j1/video.mp4").to_string(),
            "Object video/j1/video.mp4 does not exist"
        );
        assert_eq!(
            StorageError::ForeignUrl("https://elsewhere/a.mp4".to_string()).to_string(),
            "https://elsewhere/a.mp4 is not served from this bucket"
        );
    }
}

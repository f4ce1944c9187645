//! S3-compatible storage for rendered videos.
//!
//! This crate provides:
//! - Public-read uploads of batch partials and final renders
//! - Artifact key layout (`video/<job-id>/<segment>.mp4`)
//! - Public URL derivation for stored artifacts
//! - Download and deletion for the join step

pub mod client;
pub mod error;
pub mod keys;

pub use client::{S3Client, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use keys::{final_segment_name, video_key, VIDEO_EXTENSION, VIDEO_PREFIX};

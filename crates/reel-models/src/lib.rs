//! Shared data models for the slideshow renderer.
//!
//! This crate provides Serde-serializable types for:
//! - Job identifiers, statuses and the persisted job record
//! - Scene options (effect, transition, timing, resolution)
//! - Batch and request descriptors carried over the queue
//! - The background audio catalog
//! - Encoding configuration

pub mod audio;
pub mod batch;
pub mod encoding;
pub mod error;
pub mod job;
pub mod options;

// Re-export common types
pub use audio::{AudioCatalog, AudioKind, AudioTrack};
pub use batch::{BatchJob, VideoRequest};
pub use encoding::{EncodingConfig, FPS};
pub use error::{ModelError, ModelResult};
pub use job::{BatchOutput, BatchSummary, JobId, JobRecord, JobStatus};
pub use options::{BatchContinuation, Effect, SceneOptions, Transition, WipeMode, ZoomMode};

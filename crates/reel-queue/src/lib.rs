//! Redis Streams job queue.
//!
//! This crate provides:
//! - Job enqueueing with idempotency-key deduplication
//! - Consumer group reads, acknowledgement and a dead-letter stream
//! - Reclaiming messages left pending by crashed workers

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::QueueJob;
pub use queue::{JobQueue, QueueConfig, QueuedJob};

//! Slideshow worker.
//!
//! This crate provides:
//! - The batch orchestrator: split, per-batch render, join under audio
//! - Job executor over the Redis Streams queue with pending-claim and DLQ
//! - Production adapters for the record store, queue, storage and FFmpeg
//! - Local directory rendering for the `reel-render` binary
//! - Graceful shutdown

pub mod adapters;
pub mod backend;
pub mod batching;
pub mod config;
pub mod error;
pub mod executor;
pub mod local;
pub mod logging;
pub mod orchestrator;
pub mod telemetry;

#[cfg(test)]
mod memory;

pub use adapters::HttpSource;
pub use backend::{BatchDispatcher, BlobStore, Fetcher, JobStore, Renderer};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use orchestrator::Orchestrator;

//! Firestore REST API client.
//!
//! This crate provides:
//! - The job record repository (field updates, atomic output appends,
//!   precondition-guarded status transitions)
//! - Service account authentication via gcp_auth, or the local emulator
//! - Retry with backoff for transient failures

pub mod client;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use jobs::{JobRepository, StoredJob};
pub use retry::RetryConfig;
pub use token_cache::{AccessTokens, StaticToken, TokenCache};
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

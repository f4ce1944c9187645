//! Collaborators of the orchestrator.
//!
//! Production implementations live in [`crate::adapters`]; tests use
//! in-memory ones.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use reel_media::RenderPlan;
use reel_models::{AudioCatalog, BatchJob, BatchOutput, JobId, JobRecord, JobStatus};

use crate::error::WorkerResult;

/// The job record store.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: &JobId) -> WorkerResult<Option<JobRecord>>;

    async fn set_batch_count(&self, id: &JobId, count: u32) -> WorkerResult<()>;

    /// Set the status unconditionally, along with the final video URL.
    async fn set_status(
        &self,
        id: &JobId,
        status: JobStatus,
        video: Option<&str>,
    ) -> WorkerResult<()>;

    /// Append one output. Appending an identical entry again is a no-op.
    async fn append_output(&self, id: &JobId, output: &BatchOutput) -> WorkerResult<()>;

    /// Atomically move the job from processing to joining, recording
    /// `batch` as the owner. `true` when `batch` owns the join afterwards,
    /// also when it had already claimed it.
    async fn claim_join(&self, id: &JobId, batch: u32) -> WorkerResult<bool>;

    async fn mark_failed(&self, id: &JobId, error: &str) -> WorkerResult<()>;
}

/// Publishes batch descriptors for other workers.
#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    async fn dispatch(&self, batch: BatchJob) -> WorkerResult<()>;
}

/// Blob storage for rendered videos.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `path` as `segment` of the job and return its public URL.
    async fn upload_video(&self, job_id: &JobId, segment: &str, path: &Path)
        -> WorkerResult<String>;

    /// Download a previously uploaded video by URL.
    async fn download(&self, url: &str, path: &Path) -> WorkerResult<()>;
}

/// The rendering engine and the media prober.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, plan: &RenderPlan, output: &Path) -> WorkerResult<()>;

    async fn duration(&self, path: &Path) -> WorkerResult<f64>;

    async fn frame_size(&self, path: &Path) -> WorkerResult<(u32, u32)>;
}

/// Remote inputs: slides, audio tracks and the audio catalog.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// URLs that resolve to images, in input order.
    async fn filter_valid(&self, urls: &[String]) -> Vec<String>;

    async fn fetch(&self, url: &str, dir: &Path) -> WorkerResult<PathBuf>;

    /// Download every URL, results in input order.
    async fn fetch_all(&self, urls: &[String], dir: &Path) -> WorkerResult<Vec<PathBuf>>;

    /// The audio catalog, `None` when no catalog is configured.
    async fn audio_catalog(&self) -> WorkerResult<Option<AudioCatalog>>;
}

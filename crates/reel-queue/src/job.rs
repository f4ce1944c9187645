//! Job types for the queue.

use serde::{Deserialize, Serialize};

use reel_models::{BatchJob, JobId, VideoRequest};

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    /// Orchestration job: validate slides, then render directly or split into batches
    CreateVideo(VideoRequest),
    /// Render one batch of a split job and join when it is the last to report
    RenderBatch(BatchJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::CreateVideo(r) => &r.job_id,
            QueueJob::RenderBatch(b) => &b.job_id,
        }
    }

    /// Batch number for render jobs.
    pub fn batch(&self) -> Option<u32> {
        match self {
            QueueJob::CreateVideo(_) => None,
            QueueJob::RenderBatch(b) => Some(b.batch),
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::CreateVideo(r) => r.idempotency_key(),
            QueueJob::RenderBatch(b) => b.idempotency_key(),
        }
    }

    /// Short job kind for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            QueueJob::CreateVideo(_) => "create_video",
            QueueJob::RenderBatch(_) => "render_batch",
        }
    }
}

impl From<VideoRequest> for QueueJob {
    fn from(request: VideoRequest) -> Self {
        QueueJob::CreateVideo(request)
    }
}

impl From<BatchJob> for QueueJob {
    fn from(batch: BatchJob) -> Self {
        QueueJob::RenderBatch(batch)
    }
}

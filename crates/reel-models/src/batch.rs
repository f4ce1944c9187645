//! Request and batch descriptors carried over the job queue.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};
use crate::job::JobId;
use crate::options::{BatchContinuation, SceneOptions};

/// A slideshow request as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRequest {
    pub job_id: JobId,

    /// Slide image URLs in display order
    pub urls: Vec<String>,

    #[serde(default)]
    pub options: SceneOptions,
}

impl VideoRequest {
    pub fn new(job_id: JobId, urls: Vec<String>, options: SceneOptions) -> Self {
        Self {
            job_id,
            urls,
            options,
        }
    }

    /// Check URL syntax, slide count and option ranges.
    ///
    /// Reachability is checked later by the worker; unreachable slides are
    /// dropped there rather than rejected here.
    pub fn validate(&self, max_slides: usize) -> ModelResult<()> {
        if self.urls.is_empty() {
            return Err(ModelError::EmptyRequest);
        }

        if self.urls.len() > max_slides {
            return Err(ModelError::TooManySlides {
                count: self.urls.len(),
                limit: max_slides,
            });
        }

        for raw in &self.urls {
            let parsed = Url::parse(raw).map_err(|e| ModelError::InvalidUrl {
                url: raw.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ModelError::InvalidUrl {
                    url: raw.clone(),
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
        }

        self.options.validate()
    }

    /// Idempotency key for the queue job that starts this request.
    pub fn idempotency_key(&self) -> String {
        format!("create:{}", self.job_id)
    }
}

/// One independently renderable slice of a batched job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchJob {
    pub job_id: JobId,

    /// 1-based batch sequence number
    pub batch: u32,

    /// Slide URLs for this batch, in display order
    pub urls: Vec<String>,

    /// Options for this batch. Audio is always off; it is added at join.
    pub options: SceneOptions,
}

impl BatchJob {
    /// Build the descriptor for batch `batch` (1-based).
    pub fn new(job_id: JobId, batch: u32, urls: Vec<String>, options: &SceneOptions) -> Self {
        let continuation = if batch <= 1 {
            BatchContinuation::Initial
        } else {
            BatchContinuation::Continuation
        };

        Self {
            job_id,
            batch,
            urls,
            options: options
                .clone()
                .with_audio(false)
                .with_continuation(continuation),
        }
    }

    /// Idempotency key for queue deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("batch:{}:{}", self.job_id, self.batch)
    }

    /// Blob segment name for this batch's partial render.
    pub fn segment_name(&self) -> String {
        format!("video{}", self.batch)
    }
}

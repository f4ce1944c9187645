//! Production implementations of the orchestrator's collaborators.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use reel_firestore::JobRepository;
use reel_media::{probe_duration, probe_frame_size, FfmpegRenderer, HttpFetcher, RenderPlan};
use reel_models::{AudioCatalog, BatchJob, BatchOutput, JobId, JobRecord, JobStatus};
use reel_queue::JobQueue;
use reel_storage::{S3Client, StorageError};

use crate::backend::{BatchDispatcher, BlobStore, Fetcher, JobStore, Renderer};
use crate::error::WorkerResult;

#[async_trait]
impl JobStore for JobRepository {
    async fn get(&self, id: &JobId) -> WorkerResult<Option<JobRecord>> {
        Ok(JobRepository::get(self, id).await?.map(|stored| stored.record))
    }

    async fn set_batch_count(&self, id: &JobId, count: u32) -> WorkerResult<()> {
        Ok(JobRepository::set_batch_count(self, id, count).await?)
    }

    async fn set_status(
        &self,
        id: &JobId,
        status: JobStatus,
        video: Option<&str>,
    ) -> WorkerResult<()> {
        Ok(JobRepository::set_status(self, id, status, video).await?)
    }

    async fn append_output(&self, id: &JobId, output: &BatchOutput) -> WorkerResult<()> {
        Ok(JobRepository::append_output(self, id, output).await?)
    }

    async fn claim_join(&self, id: &JobId, batch: u32) -> WorkerResult<bool> {
        Ok(JobRepository::claim_join(self, id, batch).await?)
    }

    async fn mark_failed(&self, id: &JobId, error: &str) -> WorkerResult<()> {
        Ok(JobRepository::mark_failed(self, id, error).await?)
    }
}

#[async_trait]
impl BatchDispatcher for JobQueue {
    async fn dispatch(&self, batch: BatchJob) -> WorkerResult<()> {
        match self.enqueue(batch).await {
            Ok(_) => Ok(()),
            // Already dispatched by an earlier delivery of the same split
            Err(e) if e.is_duplicate() => {
                debug!("Batch already dispatched: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for S3Client {
    async fn upload_video(
        &self,
        job_id: &JobId,
        segment: &str,
        path: &Path,
    ) -> WorkerResult<String> {
        Ok(S3Client::upload_video(self, job_id, segment, path).await?)
    }

    async fn download(&self, url: &str, path: &Path) -> WorkerResult<()> {
        let key = self
            .key_for_url(url)
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        Ok(self.download_file(&key, path).await?)
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, plan: &RenderPlan, output: &Path) -> WorkerResult<()> {
        Ok(FfmpegRenderer::render(self, plan, output).await?)
    }

    async fn duration(&self, path: &Path) -> WorkerResult<f64> {
        Ok(probe_duration(path).await?)
    }

    async fn frame_size(&self, path: &Path) -> WorkerResult<(u32, u32)> {
        Ok(probe_frame_size(path).await?)
    }
}

/// HTTP inputs with a fixed download concurrency.
#[derive(Debug, Clone)]
pub struct HttpSource {
    fetcher: HttpFetcher,
    concurrency: usize,
    audio_index_url: Option<String>,
}

impl HttpSource {
    pub fn new(fetcher: HttpFetcher, concurrency: usize, audio_index_url: Option<String>) -> Self {
        Self {
            fetcher,
            concurrency,
            audio_index_url,
        }
    }
}

#[async_trait]
impl Fetcher for HttpSource {
    async fn filter_valid(&self, urls: &[String]) -> Vec<String> {
        self.fetcher.filter_valid(urls, self.concurrency).await
    }

    async fn fetch(&self, url: &str, dir: &Path) -> WorkerResult<PathBuf> {
        Ok(self.fetcher.fetch(url, dir).await?)
    }

    async fn fetch_all(&self, urls: &[String], dir: &Path) -> WorkerResult<Vec<PathBuf>> {
        Ok(self.fetcher.fetch_all(urls, dir, self.concurrency).await?)
    }

    async fn audio_catalog(&self) -> WorkerResult<Option<AudioCatalog>> {
        match &self.audio_index_url {
            Some(url) => Ok(Some(self.fetcher.fetch_catalog(url).await?)),
            None => Ok(None),
        }
    }
}

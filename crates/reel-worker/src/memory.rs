//! In-memory collaborators for orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use reel_media::{MediaError, RenderPlan};
use reel_models::{
    AudioCatalog, BatchJob, BatchOutput, BatchSummary, JobId, JobRecord, JobStatus,
};

use crate::backend::{BatchDispatcher, BlobStore, Fetcher, JobStore, Renderer};
use crate::error::{WorkerError, WorkerResult};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<JobId, JobRecord>>,
    transitions: AtomicUsize,
}

impl MemoryStore {
    pub fn insert(&self, record: JobRecord) {
        self.records.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn record(&self, id: &JobId) -> JobRecord {
        self.records.lock().unwrap().get(id).cloned().unwrap()
    }

    /// Successful compare-and-swap transitions so far.
    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }

    fn update<T>(&self, id: &JobId, f: impl FnOnce(&mut JobRecord) -> T) -> WorkerResult<T> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(id)
            .ok_or_else(|| WorkerError::JobNotFound(id.clone()))?;
        Ok(f(record))
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get(&self, id: &JobId) -> WorkerResult<Option<JobRecord>> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    async fn set_batch_count(&self, id: &JobId, count: u32) -> WorkerResult<()> {
        self.update(id, |r| {
            r.batches.get_or_insert_with(BatchSummary::default).count = count;
        })
    }

    async fn set_status(
        &self,
        id: &JobId,
        status: JobStatus,
        video: Option<&str>,
    ) -> WorkerResult<()> {
        self.update(id, |r| {
            r.status = status;
            r.video = video.map(str::to_string);
        })
    }

    async fn append_output(&self, id: &JobId, output: &BatchOutput) -> WorkerResult<()> {
        self.update(id, |r| {
            let outputs = &mut r.batches.get_or_insert_with(BatchSummary::default).outputs;
            if !outputs.contains(output) {
                outputs.push(output.clone());
            }
        })
    }

    async fn claim_join(&self, id: &JobId, batch: u32) -> WorkerResult<bool> {
        self.update(id, |r| {
            if r.join_owned_by(batch) {
                return true;
            }
            if r.status != JobStatus::Processing {
                return false;
            }
            r.status = JobStatus::Joining;
            r.joiner = Some(batch);
            self.transitions.fetch_add(1, Ordering::SeqCst);
            true
        })
    }

    async fn mark_failed(&self, id: &JobId, error: &str) -> WorkerResult<()> {
        self.update(id, |r| {
            r.status = JobStatus::Failed;
            r.error = Some(error.to_string());
        })
    }
}

#[derive(Default)]
pub struct MemoryDispatcher {
    pub batches: Mutex<Vec<BatchJob>>,
}

impl MemoryDispatcher {
    pub fn dispatched(&self) -> Vec<BatchJob> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchDispatcher for MemoryDispatcher {
    async fn dispatch(&self, batch: BatchJob) -> WorkerResult<()> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }
}

/// Blob store keyed by `mem://<job>/<segment>`.
#[derive(Default)]
pub struct MemoryBlobs {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
}

impl MemoryBlobs {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn upload_video(
        &self,
        job_id: &JobId,
        segment: &str,
        path: &Path,
    ) -> WorkerResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let url = format!("mem://{}/{}", job_id, segment);
        self.objects.lock().unwrap().insert(url.clone(), bytes);
        self.uploads.lock().unwrap().push(url.clone());
        Ok(url)
    }

    async fn download(&self, url: &str, path: &Path) -> WorkerResult<()> {
        let bytes = self
            .objects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| reel_storage::StorageError::not_found(url))?;
        self.downloads.lock().unwrap().push(url.to_string());
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

/// A plan the renderer was asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCall {
    pub inputs: usize,
    pub audio: bool,
    pub duration: Option<f64>,
}

/// Writes the plan's duration into the output so `duration` can read it back.
pub struct MemoryRenderer {
    calls: Mutex<Vec<RenderCall>>,
    fail: AtomicBool,
    /// Reported for plans without a known duration, i.e. joins
    pub joined_duration: f64,
    pub frame: (u32, u32),
}

impl Default for MemoryRenderer {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            joined_duration: 60.0,
            frame: (1200, 800),
        }
    }
}

impl MemoryRenderer {
    pub fn failing() -> Self {
        let renderer = Self::default();
        renderer.fail.store(true, Ordering::SeqCst);
        renderer
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for MemoryRenderer {
    async fn render(&self, plan: &RenderPlan, output: &Path) -> WorkerResult<()> {
        self.calls.lock().unwrap().push(RenderCall {
            inputs: plan.input_count(),
            audio: plan.has_audio(),
            duration: plan.duration(),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::internal("render failed").into());
        }
        let duration = plan.duration().unwrap_or(self.joined_duration);
        tokio::fs::write(output, duration.to_string()).await?;
        Ok(())
    }

    async fn duration(&self, path: &Path) -> WorkerResult<f64> {
        let text = tokio::fs::read_to_string(path).await?;
        text.trim()
            .parse()
            .map_err(|_| MediaError::internal("unreadable duration").into())
    }

    async fn frame_size(&self, _path: &Path) -> WorkerResult<(u32, u32)> {
        Ok(self.frame)
    }
}

/// Slide source that writes each URL into a local file.
#[derive(Default)]
pub struct MemoryFetcher {
    pub invalid: HashSet<String>,
    pub failing: HashSet<String>,
    pub catalog: Option<AudioCatalog>,
    counter: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn with_catalog(catalog: AudioCatalog) -> Self {
        Self {
            catalog: Some(catalog),
            ..Self::default()
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn filter_valid(&self, urls: &[String]) -> Vec<String> {
        urls.iter()
            .filter(|u| !self.invalid.contains(*u))
            .cloned()
            .collect()
    }

    async fn fetch(&self, url: &str, dir: &Path) -> WorkerResult<PathBuf> {
        if self.failing.contains(url) {
            return Err(MediaError::fetch_failed(url, 3, "connection refused").into());
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = dir.join(format!("input-{}", n));
        tokio::fs::write(&path, url).await?;
        self.fetched.lock().unwrap().push(url.to_string());
        Ok(path)
    }

    async fn fetch_all(&self, urls: &[String], dir: &Path) -> WorkerResult<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(urls.len());
        for url in urls {
            paths.push(self.fetch(url, dir).await?);
        }
        Ok(paths)
    }

    async fn audio_catalog(&self) -> WorkerResult<Option<AudioCatalog>> {
        Ok(self.catalog.clone())
    }
}

//! Application state.

use std::sync::Arc;

use async_trait::async_trait;

use reel_firestore::{FirestoreClient, FirestoreConfig, JobRepository};
use reel_models::{JobId, JobRecord, VideoRequest};
use reel_queue::JobQueue;

use crate::config::ApiConfig;
use crate::error::ApiResult;

/// Record store and queue as seen by the handlers.
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn create_job(&self, record: &JobRecord) -> ApiResult<()>;

    async fn get_job(&self, id: &JobId) -> ApiResult<Option<JobRecord>>;

    async fn mark_failed(&self, id: &JobId, error: &str) -> ApiResult<()>;

    async fn enqueue(&self, request: VideoRequest) -> ApiResult<()>;

    async fn check_store(&self) -> ApiResult<()>;

    async fn check_queue(&self) -> ApiResult<()>;
}

/// Firestore records and the Redis Streams queue.
pub struct CloudBackend {
    jobs: JobRepository,
    queue: JobQueue,
}

impl CloudBackend {
    pub fn new(jobs: JobRepository, queue: JobQueue) -> Self {
        Self { jobs, queue }
    }
}

#[async_trait]
impl JobBackend for CloudBackend {
    async fn create_job(&self, record: &JobRecord) -> ApiResult<()> {
        Ok(self.jobs.create(record).await?)
    }

    async fn get_job(&self, id: &JobId) -> ApiResult<Option<JobRecord>> {
        Ok(self.jobs.get(id).await?.map(|stored| stored.record))
    }

    async fn mark_failed(&self, id: &JobId, error: &str) -> ApiResult<()> {
        Ok(self.jobs.mark_failed(id, error).await?)
    }

    async fn enqueue(&self, request: VideoRequest) -> ApiResult<()> {
        self.queue.enqueue(request).await?;
        Ok(())
    }

    async fn check_store(&self) -> ApiResult<()> {
        // A missing document still proves Firestore is reachable
        self.jobs.get(&JobId::from("_health")).await?;
        Ok(())
    }

    async fn check_queue(&self) -> ApiResult<()> {
        Ok(self.queue.ping().await?)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub backend: Arc<dyn JobBackend>,
}

impl AppState {
    pub fn new(config: ApiConfig, backend: Arc<dyn JobBackend>) -> Self {
        Self { config, backend }
    }

    /// Connect to Firestore and Redis using environment configuration.
    pub async fn from_env(config: ApiConfig) -> ApiResult<Self> {
        let firestore = FirestoreClient::new(FirestoreConfig::from_env()?).await?;
        let queue = JobQueue::from_env()?;
        queue.init().await?;

        let backend = CloudBackend::new(JobRepository::new(firestore), queue);
        Ok(Self::new(config, Arc::new(backend)))
    }
}

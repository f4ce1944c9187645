//! Job queue using Redis Streams.

use std::time::Duration;

use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// Queue configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// How long XREADGROUP blocks waiting for new messages
    pub block: Duration,
    /// Idle time after which another worker's pending message may be claimed
    pub claim_idle: Duration,
    /// Deliveries after which a reclaimed message goes to the DLQ
    pub max_deliveries: u64,
    /// How long an idempotency key suppresses duplicate enqueues
    pub dedup_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "reel:jobs".to_string(),
            consumer_group: "reel-workers".to_string(),
            dlq_stream_name: "reel:dlq".to_string(),
            block: Duration::from_millis(5000),
            claim_idle: Duration::from_secs(600), // 10 minutes
            max_deliveries: 3,
            dedup_ttl: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let string = |name: &str, fallback: String| std::env::var(name).unwrap_or(fallback);
        let number = |name: &str, fallback: u64| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback)
        };

        Self {
            redis_url: string("REDIS_URL", defaults.redis_url),
            stream_name: string("QUEUE_STREAM", defaults.stream_name),
            consumer_group: string("QUEUE_GROUP", defaults.consumer_group),
            dlq_stream_name: string("QUEUE_DLQ", defaults.dlq_stream_name),
            block: Duration::from_millis(number("QUEUE_BLOCK_MS", defaults.block.as_millis() as u64)),
            claim_idle: Duration::from_millis(number(
                "QUEUE_CLAIM_IDLE_MS",
                defaults.claim_idle.as_millis() as u64,
            )),
            max_deliveries: number("QUEUE_MAX_DELIVERIES", defaults.max_deliveries),
            dedup_ttl: Duration::from_secs(number(
                "QUEUE_DEDUP_TTL_SECS",
                defaults.dedup_ttl.as_secs(),
            )),
        }
    }
}

/// A message read from the stream.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub message_id: String,
    pub job: QueueJob,
    /// Times the message has been delivered, including this one
    pub deliveries: u64,
}

/// Decode the `job` field of a stream entry.
fn decode_entry(entry: &StreamId) -> Option<QueueResult<QueueJob>> {
    match entry.map.get("job") {
        Some(redis::Value::BulkString(payload)) => {
            Some(serde_json::from_slice::<QueueJob>(payload).map_err(QueueError::from))
        }
        Some(redis::Value::SimpleString(payload)) => {
            Some(serde_json::from_str::<QueueJob>(payload).map_err(QueueError::from))
        }
        _ => None,
    }
}

/// Job queue client.
#[derive(Clone)]
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Check the Redis connection.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    /// Enqueue a job, rejecting it if its idempotency key was seen recently.
    pub async fn enqueue(&self, job: impl Into<QueueJob>) -> QueueResult<String> {
        let job = job.into();
        let mut conn = self.connection().await?;

        let payload = serde_json::to_string(&job)?;
        let idempotency_key = job.idempotency_key();
        let dedup_key = format!("reel:dedup:{}", idempotency_key);

        let claimed: Option<String> = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.config.dedup_ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            warn!("Duplicate job rejected: {}", idempotency_key);
            return Err(QueueError::Duplicate(idempotency_key));
        }

        let added: Result<String, redis::RedisError> = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .query_async(&mut conn)
            .await;

        let message_id = match added {
            Ok(id) => id,
            Err(e) => {
                // Release the key so the caller can retry
                conn.del::<_, ()>(&dedup_key).await.ok();
                return Err(QueueError::enqueue_failed(e.to_string()));
            }
        };

        info!(
            job_id = %job.job_id(),
            kind = job.kind(),
            message_id = %message_id,
            "Enqueued job"
        );

        Ok(message_id)
    }

    /// Acknowledge a job (mark as completed).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    /// Move a job to the dead letter queue.
    pub async fn dlq(&self, message_id: &str, job: &QueueJob, error: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!(job_id = %job.job_id(), "Moved job to DLQ: {}", error);
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    /// Read new jobs for this consumer, blocking up to the configured time.
    pub async fn consume(&self, consumer_name: &str, count: usize) -> QueueResult<Vec<QueuedJob>> {
        let mut conn = self.connection().await?;

        let result: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(self.config.block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.map(|r| r.keys).unwrap_or_default() {
            for entry in stream_key.ids {
                if let Some(job) = self.accept(&entry, 1).await {
                    debug!(job_id = %job.job.job_id(), "Consumed job from stream");
                    jobs.push(job);
                }
            }
        }

        Ok(jobs)
    }

    /// Claim jobs other consumers left pending for longer than the idle timeout.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        count: usize,
    ) -> QueueResult<Vec<QueuedJob>> {
        let mut conn = self.connection().await?;
        let min_idle_ms = self.config.claim_idle.as_millis() as u64;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut claim = redis::cmd("XCLAIM");
        claim
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms);
        for p in &pending.ids {
            claim.arg(&p.id);
        }
        let claimed: StreamClaimReply = claim.query_async(&mut conn).await?;

        let mut jobs = Vec::new();
        for entry in claimed.ids {
            let deliveries = pending
                .ids
                .iter()
                .find(|p| p.id == entry.id)
                .map(|p| p.times_delivered as u64 + 1)
                .unwrap_or(1);

            if let Some(job) = self.accept(&entry, deliveries).await {
                info!(
                    job_id = %job.job.job_id(),
                    deliveries,
                    "Claimed pending job from stream"
                );
                jobs.push(job);
            }
        }

        Ok(jobs)
    }

    /// Decode an entry, acking payloads that can never be processed.
    async fn accept(&self, entry: &StreamId, deliveries: u64) -> Option<QueuedJob> {
        match decode_entry(entry) {
            Some(Ok(job)) => Some(QueuedJob {
                message_id: entry.id.clone(),
                job,
                deliveries,
            }),
            Some(Err(e)) => {
                warn!("Failed to parse job payload {}: {}", entry.id, e);
                self.ack(&entry.id).await.ok();
                None
            }
            None => {
                warn!("Stream entry {} has no job field", entry.id);
                self.ack(&entry.id).await.ok();
                None
            }
        }
    }

    pub fn max_deliveries(&self) -> u64 {
        self.config.max_deliveries
    }
}

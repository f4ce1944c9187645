//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reel_queue::{JobQueue, QueuedJob};

use crate::error::{WorkerError, WorkerResult};
use crate::orchestrator::Orchestrator;

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    orchestrator: Arc<Orchestrator>,
    queue: Arc<JobQueue>,
    job_semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(orchestrator: Orchestrator, queue: JobQueue) -> Self {
        let max_concurrent_jobs = orchestrator.config().max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);

        Self {
            orchestrator: Arc::new(orchestrator),
            queue: Arc::new(queue),
            job_semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
            shutdown,
            consumer_name: format!("worker-{}", Uuid::new_v4()),
        }
    }

    /// Handle that stops [`run`](Self::run) when `true` is sent.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Consume until shutdown, then wait for in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = tokio::spawn(Self::claim_loop(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.queue),
            Arc::clone(&self.job_semaphore),
            self.consumer_name.clone(),
            self.shutdown.subscribe(),
        ));

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let grace = self.orchestrator.config().shutdown_timeout;
        if tokio::time::timeout(grace, self.wait_for_jobs()).await.is_err() {
            warn!(
                "In-flight jobs still running after {}s; their messages stay pending",
                grace.as_secs()
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, available.min(5))
            .await?;
        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());
        for job in jobs {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let orchestrator = Arc::clone(&self.orchestrator);
            let queue = Arc::clone(&self.queue);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(orchestrator, queue, job).await;
            });
        }

        Ok(())
    }

    /// Periodically take over messages a crashed consumer left pending.
    async fn claim_loop(
        orchestrator: Arc<Orchestrator>,
        queue: Arc<JobQueue>,
        semaphore: Arc<Semaphore>,
        consumer_name: String,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(orchestrator.config().claim_interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let jobs = match queue.claim_pending(&consumer_name, 5).await {
                        Ok(jobs) => jobs,
                        Err(e) => {
                            warn!("Failed to claim pending jobs: {}", e);
                            continue;
                        }
                    };
                    if !jobs.is_empty() {
                        info!("Claimed {} pending jobs", jobs.len());
                    }

                    for job in jobs {
                        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                            return;
                        };
                        let orchestrator = Arc::clone(&orchestrator);
                        let queue = Arc::clone(&queue);
                        tokio::spawn(async move {
                            let _permit = permit;
                            Self::execute_job(orchestrator, queue, job).await;
                        });
                    }
                }
            }
        }
    }

    /// Run one delivery, then ack it or move it to the DLQ.
    ///
    /// There is no job-level retry: a failed job is marked failed by the
    /// orchestrator and its message dead-lettered.
    async fn execute_job(orchestrator: Arc<Orchestrator>, queue: Arc<JobQueue>, queued: QueuedJob) {
        let QueuedJob {
            message_id,
            job,
            deliveries,
        } = queued;
        let job_id = job.job_id().clone();

        if deliveries > queue.max_deliveries() {
            let err = WorkerError::job_failed(format!(
                "Abandoned after {} deliveries",
                deliveries - 1
            ));
            warn!(job_id = %job_id, "{}", err);
            orchestrator.fail(&job_id, &err).await;
            if let Err(e) = queue.dlq(&message_id, &job, &err.to_string()).await {
                error!("Failed to move job {} to DLQ: {}", job_id, e);
            }
            return;
        }

        info!(job_id = %job_id, kind = job.kind(), deliveries, "Executing job");
        let timeout = orchestrator.config().job_timeout;
        let result = match tokio::time::timeout(timeout, orchestrator.handle(&job)).await {
            Ok(result) => result,
            Err(_) => {
                let err = WorkerError::Timeout(timeout.as_secs());
                orchestrator.fail(&job_id, &err).await;
                Err(err)
            }
        };

        match result {
            Ok(()) => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!("Failed to ack job {}: {}", job_id, e);
                }
            }
            Err(e) => {
                error!("Job {} failed: {}", job_id, e);
                if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                    error!("Failed to move job {} to DLQ: {}", job_id, dlq_err);
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

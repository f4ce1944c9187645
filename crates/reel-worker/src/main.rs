//! Slideshow worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use reel_firestore::{FirestoreClient, FirestoreConfig, JobRepository};
use reel_media::{check_ffmpeg, FetchPolicy, FfmpegRenderer, HttpFetcher};
use reel_models::EncodingConfig;
use reel_queue::JobQueue;
use reel_storage::S3Client;
use reel_worker::{telemetry, HttpSource, JobExecutor, Orchestrator, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    info!("Starting reel-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        telemetry::install_metrics(port)?;
        info!("Serving metrics on port {}", port);
    }

    check_ffmpeg().context("ffmpeg is required")?;
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("creating {}", config.work_dir.display()))?;

    let queue = JobQueue::from_env().context("creating job queue")?;
    let firestore = FirestoreClient::new(FirestoreConfig::from_env()?)
        .await
        .context("creating Firestore client")?;
    let storage = S3Client::from_env().await.context("creating storage client")?;
    if let Err(e) = storage.check_connectivity().await {
        warn!("Storage not reachable at startup: {}", e);
    }

    let policy = FetchPolicy::default().with_retry_unit(config.fetch_retry_unit);
    let fetcher = HttpSource::new(
        HttpFetcher::new(policy)?,
        config.fetch_concurrency,
        config.audio_index_url.clone(),
    );
    let renderer =
        FfmpegRenderer::new(EncodingConfig::default()).with_timeout(config.ffmpeg_timeout.as_secs());

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(JobRepository::new(firestore)),
        Arc::new(queue.clone()),
        Arc::new(storage),
        Arc::new(renderer),
        Arc::new(fetcher),
    );
    let executor = JobExecutor::new(orchestrator, queue);

    let shutdown = executor.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown.send(true);
    });

    executor.run().await?;

    info!("Worker shutdown complete");
    Ok(())
}

//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Slides per batch when a request is split
    pub batch_size: usize,
    /// Largest request the worker accepts
    pub max_slides: usize,
    /// Parent directory for per-job scratch directories
    pub work_dir: PathBuf,
    /// Concurrent validations and downloads per job
    pub fetch_concurrency: usize,
    /// Retry `k` of a download waits `k` units
    pub fetch_retry_unit: Duration,
    /// Upper bound for one FFmpeg run
    pub ffmpeg_timeout: Duration,
    /// Location of the audio catalog document
    pub audio_index_url: Option<String>,
    /// Job timeout
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Port of the Prometheus listener, none to disable
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            batch_size: 20,
            max_slides: 1000,
            work_dir: std::env::temp_dir(),
            fetch_concurrency: 8,
            fetch_retry_unit: Duration::from_millis(1000),
            ffmpeg_timeout: Duration::from_secs(1800),
            audio_index_url: None,
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(60),
            claim_interval: Duration::from_secs(30),
            metrics_port: None,
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_jobs: parsed::<usize>("WORKER_MAX_JOBS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            batch_size: parsed::<usize>("BATCH_SIZE")
                .filter(|n| *n > 1)
                .unwrap_or(defaults.batch_size),
            max_slides: parsed("MAX_SLIDES_PER_REQUEST").unwrap_or(defaults.max_slides),
            work_dir: std::env::var("WORK_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            fetch_concurrency: parsed::<usize>("FETCH_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.fetch_concurrency),
            fetch_retry_unit: parsed("FETCH_RETRY_UNIT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch_retry_unit),
            ffmpeg_timeout: parsed("FFMPEG_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ffmpeg_timeout),
            audio_index_url: std::env::var("AUDIO_INDEX_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            job_timeout: parsed("JOB_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            shutdown_timeout: parsed("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            claim_interval: parsed("WORKER_CLAIM_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_interval),
            metrics_port: parsed("METRICS_PORT"),
        }
    }
}

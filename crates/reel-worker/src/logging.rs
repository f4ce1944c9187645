//! Structured job logging utilities.

use std::time::Instant;

use tracing::{error, info, warn, Span};

use reel_models::JobId;

/// Job logger for structured logging with consistent formatting.
///
/// Every event carries the job ID, the operation and, for batch renders,
/// the batch number. Completion and failure include elapsed milliseconds.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
    batch: Option<u32>,
    started: Instant,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
            batch: None,
            started: Instant::now(),
        }
    }

    pub fn with_batch(mut self, batch: Option<u32>) -> Self {
        self.batch = batch;
        self
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            batch = self.batch,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            batch = self.batch,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            batch = self.batch,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            batch = self.batch,
            elapsed_ms = self.elapsed_ms(),
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            batch = self.batch,
            elapsed_ms = self.elapsed_ms(),
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation,
            batch = self.batch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "render_batch").with_batch(Some(2));

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "render_batch");
        assert_eq!(logger.batch, Some(2));
    }
}

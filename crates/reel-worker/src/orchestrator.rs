//! Per-job state machine: split, render one batch, join.
//!
//! A `CreateVideo` job either renders the whole slideshow in place or splits
//! it into overlapping batches and dispatches one `RenderBatch` job per
//! batch. Each batch appends its output to the job record; the batch that
//! completes the set wins the `processing -> joining` compare-and-swap,
//! recorded as the join owner, and joins the partials in batch order under a
//! fitted audio track. A redelivery of the owner's message finishes a join
//! its first delivery never completed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempDir;
use tracing::{debug, error, warn, Instrument};

use reel_media::{select_track, RenderPlan, SceneSpec, Slide};
use reel_models::{BatchJob, BatchOutput, JobId, JobRecord, JobStatus, SceneOptions, VideoRequest};
use reel_queue::QueueJob;
use reel_storage::final_segment_name;

use crate::backend::{BatchDispatcher, BlobStore, Fetcher, JobStore, Renderer};
use crate::batching::plan_batches;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

pub struct Orchestrator {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    dispatcher: Arc<dyn BatchDispatcher>,
    blobs: Arc<dyn BlobStore>,
    renderer: Arc<dyn Renderer>,
    fetcher: Arc<dyn Fetcher>,
}

impl Orchestrator {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        dispatcher: Arc<dyn BatchDispatcher>,
        blobs: Arc<dyn BlobStore>,
        renderer: Arc<dyn Renderer>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            blobs,
            renderer,
            fetcher,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one queue job. A failure marks the job record failed before the
    /// error is returned.
    pub async fn handle(&self, job: &QueueJob) -> WorkerResult<()> {
        let log = JobLogger::new(job.job_id(), job.kind()).with_batch(job.batch());
        let started = Instant::now();

        let result = async {
            match job {
                QueueJob::CreateVideo(request) => self.create_video(request, &log).await,
                QueueJob::RenderBatch(batch) => self.render_batch(batch, &log).await,
            }
        }
        .instrument(log.create_span())
        .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!("reel_jobs_total", "kind" => job.kind(), "outcome" => outcome)
            .increment(1);
        metrics::histogram!("reel_job_duration_seconds", "kind" => job.kind())
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            if e.is_defect() {
                error!(job_id = %job.job_id(), "Filter graph defect: {}", e);
            }
            log.log_error(&e.to_string());
            if matches!(job, QueueJob::RenderBatch(_)) {
                metrics::counter!("reel_batches_failed_total").increment(1);
            }
            self.fail(job.job_id(), e).await;
        }
        result
    }

    /// Mark the job failed. The record may already be gone or unreachable;
    /// that is logged and otherwise ignored.
    pub async fn fail(&self, job_id: &JobId, error: &WorkerError) {
        if let Err(e) = self.store.mark_failed(job_id, &error.to_string()).await {
            warn!(job_id = %job_id, "Failed to mark job failed: {}", e);
        }
    }

    async fn create_video(&self, request: &VideoRequest, log: &JobLogger) -> WorkerResult<()> {
        let job_id = &request.job_id;
        log.log_start(&format!("{} slides requested", request.urls.len()));

        let record = self.load(job_id).await?;
        if record.status.is_terminal() {
            log.log_warning(&format!("Job already {}, skipping", record.status));
            return Ok(());
        }

        request.validate(self.config.max_slides)?;

        let urls = self.fetcher.filter_valid(&request.urls).await;
        if urls.is_empty() {
            log.log_warning("No valid slides, nothing to render");
            self.store
                .set_status(job_id, JobStatus::Processed, None)
                .await?;
            return Ok(());
        }
        if urls.len() < request.urls.len() {
            log.log_warning(&format!(
                "Dropped {} unreachable slides",
                request.urls.len() - urls.len()
            ));
        }

        let scratch = self.scratch_dir()?;
        let options = self
            .fixed_size_options(&request.options, &urls[0], scratch.path())
            .await?;

        if !options.batch_mode || urls.len() <= self.config.batch_size {
            log.log_progress(&format!("Rendering {} slides in one pass", urls.len()));
            let output = self
                .render_slides(&urls, &options, scratch.path(), log)
                .await?;
            let url = self
                .blobs
                .upload_video(job_id, final_segment_name(), &output)
                .await?;
            self.store
                .set_status(job_id, JobStatus::Processed, Some(&url))
                .await?;
            log.log_completion(&url);
            return Ok(());
        }

        let batches = plan_batches(job_id, &urls, &options, self.config.batch_size);
        self.store
            .set_batch_count(job_id, batches.len() as u32)
            .await?;
        let count = batches.len();
        for batch in batches {
            self.dispatcher.dispatch(batch).await?;
        }
        log.log_completion(&format!("Dispatched {} batches", count));
        Ok(())
    }

    async fn render_batch(&self, batch: &BatchJob, log: &JobLogger) -> WorkerResult<()> {
        let job_id = &batch.job_id;
        log.log_start(&format!("{} slides", batch.urls.len()));

        let record = self.load(job_id).await?;
        if record.status == JobStatus::Failed {
            log.log_warning("Job already failed, skipping batch");
            return Ok(());
        }

        if record.received_batches().contains_key(&batch.batch) {
            log.log_warning("Batch output already recorded");
        } else {
            let scratch = self.scratch_dir()?;
            let slides = self.fetcher.fetch_all(&batch.urls, scratch.path()).await?;
            let plan = slideshow_plan(slides, &batch.options)?;
            let output = scratch.path().join("batch.mp4");
            self.renderer.render(&plan, &output).await?;

            let url = self
                .blobs
                .upload_video(job_id, &batch.segment_name(), &output)
                .await?;
            self.store
                .append_output(job_id, &BatchOutput::new(batch.batch, url))
                .await?;
            metrics::counter!("reel_batches_rendered_total").increment(1);
            log.log_progress("Batch uploaded");
        }

        self.join_if_complete(job_id, batch.batch, log).await
    }

    /// Join when every batch has reported. The first batch to claim the join
    /// owns it; a redelivery of that batch resumes a join that never finished.
    async fn join_if_complete(
        &self,
        job_id: &JobId,
        batch: u32,
        log: &JobLogger,
    ) -> WorkerResult<()> {
        let record = self.load(job_id).await?;
        if record.join_owned_by(batch) {
            log.log_warning("Resuming unfinished join");
            return self.join(&record, log).await;
        }
        if !record.ready_to_join() {
            log.log_completion(&format!(
                "{} of {} batches received",
                record.received_batches().len(),
                record.expected_batches()
            ));
            return Ok(());
        }

        let claimed = self.store.claim_join(job_id, batch).await?;
        if !claimed {
            debug!(job_id = %job_id, "Join already claimed by another worker");
            return Ok(());
        }

        self.join(&record, log).await
    }

    async fn join(&self, record: &JobRecord, log: &JobLogger) -> WorkerResult<()> {
        let job_id = &record.id;
        let outputs = record.ordered_outputs();
        log.log_progress(&format!("Joining {} batches", outputs.len()));

        let scratch = self.scratch_dir()?;
        let mut parts = Vec::with_capacity(outputs.len());
        for output in &outputs {
            let path = scratch.path().join(format!("part{}.mp4", output.batch));
            self.blobs.download(&output.output, &path).await?;
            parts.push(path);
        }

        let joined = scratch.path().join("joined.mp4");
        self.renderer
            .render(&RenderPlan::concat(&parts)?, &joined)
            .await?;
        let duration = self.renderer.duration(&joined).await?;

        let (track, native) = self
            .audio_for(duration, scratch.path())
            .await?
            .ok_or(WorkerError::NoAudio(duration))?;
        let (plan, fit) = RenderPlan::remux_with_audio(&joined, &track, native, duration)?;
        debug!(
            job_id = %job_id,
            repetitions = fit.repetitions,
            duration = fit.duration,
            "Fitted background audio"
        );

        let output = scratch.path().join("video.mp4");
        self.renderer.render(&plan, &output).await?;
        let url = self
            .blobs
            .upload_video(job_id, final_segment_name(), &output)
            .await?;
        self.store
            .set_status(job_id, JobStatus::Processed, Some(&url))
            .await?;

        metrics::counter!("reel_joins_completed_total").increment(1);
        log.log_completion(&url);
        Ok(())
    }

    /// Render `urls` as one slideshow, with audio when the options ask for
    /// it and a track is available.
    async fn render_slides(
        &self,
        urls: &[String],
        options: &SceneOptions,
        dir: &Path,
        log: &JobLogger,
    ) -> WorkerResult<PathBuf> {
        let slides = self.fetcher.fetch_all(urls, dir).await?;
        let mut plan = slideshow_plan(slides, options)?;

        if options.audio {
            if let Some(target) = plan.duration() {
                match self.audio_for(target, dir).await {
                    Ok(Some((track, native))) => {
                        plan = plan.with_audio(&track, native)?.0;
                    }
                    Ok(None) => log.log_warning("No eligible audio track, rendering silent"),
                    Err(e) => log.log_warning(&format!("Audio unavailable: {}", e)),
                }
            }
        }

        let output = dir.join("video.mp4");
        self.renderer.render(&plan, &output).await?;
        Ok(output)
    }

    /// Download a random eligible track for `target` seconds.
    ///
    /// `None` when no catalog is configured or nothing in it qualifies.
    async fn audio_for(&self, target: f64, dir: &Path) -> WorkerResult<Option<(PathBuf, f64)>> {
        let Some(catalog) = self.fetcher.audio_catalog().await? else {
            return Ok(None);
        };
        let track = {
            let mut rng = rand::rng();
            select_track(&catalog, target, &mut rng).cloned()
        };
        let Some(track) = track else {
            return Ok(None);
        };

        let path = self.fetcher.fetch(&track.url, dir).await?;
        Ok(Some((path, track.length)))
    }

    /// Pin both dimensions, probing the first slide when only one is given,
    /// so every batch renders at the same size.
    async fn fixed_size_options(
        &self,
        options: &SceneOptions,
        first_url: &str,
        dir: &Path,
    ) -> WorkerResult<SceneOptions> {
        if !options.needs_source_size() {
            return Ok(options.clone());
        }
        let probe = self.fetcher.fetch(first_url, dir).await?;
        let frame = self.renderer.frame_size(&probe).await?;
        let (width, height) = options.resolve_size(Some(frame));
        Ok(options.clone().with_size(Some(width), Some(height)))
    }

    async fn load(&self, job_id: &JobId) -> WorkerResult<JobRecord> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| WorkerError::JobNotFound(job_id.clone()))
    }

    /// A scratch directory removed when dropped.
    fn scratch_dir(&self) -> WorkerResult<TempDir> {
        std::fs::create_dir_all(&self.config.work_dir)?;
        Ok(tempfile::Builder::new()
            .prefix("reel-")
            .tempdir_in(&self.config.work_dir)?)
    }
}

pub(crate) fn slideshow_plan(
    slides: Vec<PathBuf>,
    options: &SceneOptions,
) -> WorkerResult<RenderPlan> {
    let slides: Vec<Slide> = slides.into_iter().map(Slide::still).collect();
    let spec = {
        let mut rng = rand::rng();
        SceneSpec::from_options(options, options.resolve_size(None), &mut rng)
    };
    Ok(RenderPlan::slideshow(&slides, &spec)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBlobs, MemoryDispatcher, MemoryFetcher, MemoryRenderer, MemoryStore};
    use reel_models::{AudioCatalog, AudioKind, AudioTrack, Transition};

    struct Harness {
        store: Arc<MemoryStore>,
        dispatcher: Arc<MemoryDispatcher>,
        blobs: Arc<MemoryBlobs>,
        renderer: Arc<MemoryRenderer>,
        fetcher: Arc<MemoryFetcher>,
        orchestrator: Arc<Orchestrator>,
        _work: TempDir,
    }

    fn catalog() -> AudioCatalog {
        AudioCatalog::new(vec![AudioTrack::new(
            "https://audio/loop.mp3",
            30.0,
            AudioKind::Loop,
        )])
    }

    fn harness(renderer: MemoryRenderer, fetcher: MemoryFetcher) -> Harness {
        let work = TempDir::new().unwrap();
        let config = WorkerConfig {
            work_dir: work.path().to_path_buf(),
            ..WorkerConfig::default()
        };

        let store = Arc::new(MemoryStore::default());
        let dispatcher = Arc::new(MemoryDispatcher::default());
        let blobs = Arc::new(MemoryBlobs::default());
        let renderer = Arc::new(renderer);
        let fetcher = Arc::new(fetcher);

        let orchestrator = Arc::new(Orchestrator::new(
            config,
            store.clone(),
            dispatcher.clone(),
            blobs.clone(),
            renderer.clone(),
            fetcher.clone(),
        ));

        Harness {
            store,
            dispatcher,
            blobs,
            renderer,
            fetcher,
            orchestrator,
            _work: work,
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://img/{}.jpg", i)).collect()
    }

    fn request(h: &Harness, id: &str, n: usize, options: SceneOptions) -> QueueJob {
        let job_id = JobId::from(id);
        h.store.insert(JobRecord::new(job_id.clone()));
        QueueJob::CreateVideo(VideoRequest::new(job_id, urls(n), options))
    }

    #[tokio::test]
    async fn test_no_valid_slides_is_processed_without_video() {
        let mut fetcher = MemoryFetcher::default();
        fetcher.invalid = urls(3).into_iter().collect();
        let h = harness(MemoryRenderer::default(), fetcher);

        let job = request(&h, "empty", 3, SceneOptions::default());
        h.orchestrator.handle(&job).await.unwrap();

        let record = h.store.record(&JobId::from("empty"));
        assert_eq!(record.status, JobStatus::Processed);
        assert!(record.video.is_none());
        assert!(h.renderer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_small_request_renders_in_one_pass() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::with_catalog(catalog()));

        let options = SceneOptions::default()
            .with_transition(Transition::SlideWipe)
            .with_audio(true);
        let job = request(&h, "single", 5, options);
        h.orchestrator.handle(&job).await.unwrap();

        let record = h.store.record(&JobId::from("single"));
        assert_eq!(record.status, JobStatus::Processed);
        assert_eq!(record.video.as_deref(), Some("mem://single/video"));
        assert!(h.dispatcher.dispatched().is_empty());

        let calls = h.renderer.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].audio);
        assert!(h.fetcher.fetched().contains(&"https://audio/loop.mp3".to_string()));
    }

    #[tokio::test]
    async fn test_missing_audio_is_not_fatal_for_single_render() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::default());

        let job = request(&h, "silent", 3, SceneOptions::default().with_audio(true));
        h.orchestrator.handle(&job).await.unwrap();

        assert_eq!(h.store.record(&JobId::from("silent")).status, JobStatus::Processed);
        assert!(!h.renderer.calls()[0].audio);
    }

    #[tokio::test]
    async fn test_unreachable_slides_are_dropped() {
        let mut fetcher = MemoryFetcher::default();
        fetcher.invalid.insert("https://img/1.jpg".to_string());
        let h = harness(MemoryRenderer::default(), fetcher);

        let job = request(&h, "drop", 4, SceneOptions::default());
        h.orchestrator.handle(&job).await.unwrap();

        assert!(!h.fetcher.fetched().contains(&"https://img/1.jpg".to_string()));
        assert_eq!(h.fetcher.fetched().len(), 3);
    }

    #[tokio::test]
    async fn test_large_request_dispatches_batches() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::default());

        let job = request(&h, "big", 45, SceneOptions::default().with_audio(true));
        h.orchestrator.handle(&job).await.unwrap();

        let batches = h.dispatcher.dispatched();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1].urls[0], "https://img/19.jpg");
        assert!(batches.iter().all(|b| !b.options.audio));

        let record = h.store.record(&JobId::from("big"));
        assert_eq!(record.status, JobStatus::Processing);
        assert_eq!(record.expected_batches(), 3);
        assert!(h.renderer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_mode_off_renders_in_one_pass() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::default());

        let mut options = SceneOptions::default();
        options.batch_mode = false;
        let job = request(&h, "forced", 45, options);
        h.orchestrator.handle(&job).await.unwrap();

        assert!(h.dispatcher.dispatched().is_empty());
        assert_eq!(h.renderer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_single_dimension_is_pinned_before_split() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::default());

        let options = SceneOptions::default().with_size(Some(600), None);
        let job = request(&h, "sized", 30, options);
        h.orchestrator.handle(&job).await.unwrap();

        for batch in h.dispatcher.dispatched() {
            assert_eq!(batch.options.width, Some(600));
            assert_eq!(batch.options.height, Some(400));
        }
    }

    async fn split(h: &Harness, id: &str, n: usize) -> Vec<BatchJob> {
        let job = request(h, id, n, SceneOptions::default());
        h.orchestrator.handle(&job).await.unwrap();
        h.dispatcher.dispatched()
    }

    #[tokio::test]
    async fn test_out_of_order_batches_join_once_in_order() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::with_catalog(catalog()));
        let batches = split(&h, "scatter", 45).await;
        let job_id = JobId::from("scatter");

        for index in [2, 0] {
            let job = QueueJob::RenderBatch(batches[index].clone());
            h.orchestrator.handle(&job).await.unwrap();
            assert_eq!(h.store.record(&job_id).status, JobStatus::Processing);
        }
        h.orchestrator
            .handle(&QueueJob::RenderBatch(batches[1].clone()))
            .await
            .unwrap();

        let record = h.store.record(&job_id);
        assert_eq!(record.status, JobStatus::Processed);
        assert_eq!(record.video.as_deref(), Some("mem://scatter/video"));
        assert_eq!(h.store.transitions(), 1);
        assert_eq!(
            h.blobs.downloads(),
            vec![
                "mem://scatter/video1".to_string(),
                "mem://scatter/video2".to_string(),
                "mem://scatter/video3".to_string(),
            ]
        );

        // Three batch renders, the concat and the audio remux
        let calls = h.renderer.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[3].inputs, 3);
        assert!(calls[4].audio);
        assert_eq!(calls[4].duration, Some(60.0));
    }

    #[tokio::test]
    async fn test_redelivered_batch_is_recorded_once() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::with_catalog(catalog()));
        let batches = split(&h, "dup", 45).await;
        let job_id = JobId::from("dup");

        let first = QueueJob::RenderBatch(batches[0].clone());
        h.orchestrator.handle(&first).await.unwrap();
        h.orchestrator.handle(&first).await.unwrap();

        let record = h.store.record(&job_id);
        assert_eq!(record.batches.as_ref().map(|b| b.outputs.len()), Some(1));
        assert_eq!(h.renderer.calls().len(), 1);

        for batch in &batches[1..] {
            h.orchestrator
                .handle(&QueueJob::RenderBatch(batch.clone()))
                .await
                .unwrap();
        }
        // A late duplicate after the join changes nothing
        h.orchestrator
            .handle(&QueueJob::RenderBatch(batches[2].clone()))
            .await
            .unwrap();

        assert_eq!(h.store.record(&job_id).status, JobStatus::Processed);
        assert_eq!(h.store.transitions(), 1);
        assert_eq!(h.blobs.uploads().iter().filter(|u| u.ends_with("/video")).count(), 1);
    }

    #[tokio::test]
    async fn test_redelivered_owner_finishes_interrupted_join() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::with_catalog(catalog()));
        let batches = split(&h, "resume", 45).await;
        let job_id = JobId::from("resume");

        for batch in &batches[..2] {
            h.orchestrator
                .handle(&QueueJob::RenderBatch(batch.clone()))
                .await
                .unwrap();
        }

        // Batch 3 uploaded, recorded and claimed the join, then its worker died
        let partial = h._work.path().join("video3.mp4");
        std::fs::write(&partial, "20").unwrap();
        let url = h.blobs.upload_video(&job_id, "video3", &partial).await.unwrap();
        h.store
            .append_output(&job_id, &BatchOutput::new(3, url))
            .await
            .unwrap();
        assert!(h.store.claim_join(&job_id, 3).await.unwrap());
        let renders = h.renderer.calls().len();

        // Another batch arriving again does not take over the join
        h.orchestrator
            .handle(&QueueJob::RenderBatch(batches[0].clone()))
            .await
            .unwrap();
        assert_eq!(h.store.record(&job_id).status, JobStatus::Joining);
        assert_eq!(h.renderer.calls().len(), renders);

        h.orchestrator
            .handle(&QueueJob::RenderBatch(batches[2].clone()))
            .await
            .unwrap();

        let record = h.store.record(&job_id);
        assert_eq!(record.status, JobStatus::Processed);
        assert_eq!(record.video.as_deref(), Some("mem://resume/video"));
        assert_eq!(record.joiner, Some(3));
        assert_eq!(h.store.transitions(), 1);
        // Concat and audio remux, no batch re-render
        assert_eq!(h.renderer.calls().len(), renders + 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_final_batches_join_once() {
        for round in 0..20 {
            let h = harness(MemoryRenderer::default(), MemoryFetcher::with_catalog(catalog()));
            let id = format!("race-{}", round);
            let batches = split(&h, &id, 45).await;

            h.orchestrator
                .handle(&QueueJob::RenderBatch(batches[0].clone()))
                .await
                .unwrap();

            let tasks: Vec<_> = batches[1..]
                .iter()
                .map(|batch| {
                    let orchestrator = h.orchestrator.clone();
                    let job = QueueJob::RenderBatch(batch.clone());
                    tokio::spawn(async move { orchestrator.handle(&job).await })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let record = h.store.record(&JobId::from(id.clone()));
            assert_eq!(record.status, JobStatus::Processed, "round {}", round);
            assert_eq!(h.store.transitions(), 1, "round {}", round);
            let finals = h.blobs.uploads().iter().filter(|u| u.ends_with("/video")).count();
            assert_eq!(finals, 1, "round {}", round);
        }
    }

    #[tokio::test]
    async fn test_join_without_audio_fails_job() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::default());
        let batches = split(&h, "mute", 30).await;
        assert_eq!(batches.len(), 2);

        h.orchestrator
            .handle(&QueueJob::RenderBatch(batches[0].clone()))
            .await
            .unwrap();
        let err = h
            .orchestrator
            .handle(&QueueJob::RenderBatch(batches[1].clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::NoAudio(d) if d == 60.0));
        let record = h.store.record(&JobId::from("mute"));
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error.unwrap().contains("No eligible audio track"));
    }

    #[tokio::test]
    async fn test_render_failure_marks_job_failed() {
        let h = harness(MemoryRenderer::failing(), MemoryFetcher::default());

        let job = request(&h, "broken", 3, SceneOptions::default());
        assert!(h.orchestrator.handle(&job).await.is_err());

        let record = h.store.record(&JobId::from("broken"));
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error.is_some());
        assert!(h.blobs.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_batch_and_later_batches_skip() {
        let mut fetcher = MemoryFetcher::default();
        fetcher.failing.insert("https://img/5.jpg".to_string());
        let h = harness(MemoryRenderer::default(), fetcher);
        let batches = split(&h, "flaky", 45).await;

        let err = h
            .orchestrator
            .handle(&QueueJob::RenderBatch(batches[0].clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Media(_)));
        assert_eq!(h.store.record(&JobId::from("flaky")).status, JobStatus::Failed);

        h.orchestrator
            .handle(&QueueJob::RenderBatch(batches[1].clone()))
            .await
            .unwrap();
        assert!(h.renderer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_any_work() {
        let h = harness(MemoryRenderer::default(), MemoryFetcher::default());

        let mut options = SceneOptions::default();
        options.transition_duration = options.scene_duration;
        let job = request(&h, "invalid", 3, options);

        let err = h.orchestrator.handle(&job).await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidRequest(_)));
        assert_eq!(h.store.record(&JobId::from("invalid")).status, JobStatus::Failed);
        assert!(h.fetcher.fetched().is_empty());
    }
}

//! Render plans: compiled graphs bound to concrete input files.
//!
//! A plan owns the ordered input list, the filter graph and the labels that
//! get mapped into the output. Three shapes cover every render:
//! - `slideshow`: still (or segment) slides through the scene assembler
//! - `concat`: pre-rendered batch partials joined end to end
//! - `remux_with_audio`: an existing video with a fitted track, video copied

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use reel_models::{EncodingConfig, FPS};

use crate::audio::{fit_audio, AudioFit};
use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{Concat, Filter, StreamKind};
use crate::graph::{FilterGraph, StreamLabel};
use crate::scene::{assemble, SceneSpec};

/// How a slide file is fed to FFmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideKind {
    /// Image looped for the scene duration
    Still,
    /// Pre-rendered video, used as is
    Segment,
}

/// One local input of the video timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub path: PathBuf,
    pub kind: SlideKind,
}

impl Slide {
    pub fn still(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: SlideKind::Still,
        }
    }

    pub fn segment(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: SlideKind::Segment,
        }
    }

    fn input(&self, scene_duration: f64) -> FfmpegInput {
        match self.kind {
            SlideKind::Still => FfmpegInput::still(&self.path, FPS, scene_duration),
            SlideKind::Segment => FfmpegInput::new(&self.path),
        }
    }
}

/// A ready-to-run render.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    inputs: Vec<FfmpegInput>,
    graph: FilterGraph,
    video: StreamLabel,
    audio: Option<StreamLabel>,
    copy_video: bool,
    duration: Option<f64>,
}

impl RenderPlan {
    /// Compile a slideshow over `slides`.
    ///
    /// A continuation run without overlapping transitions leaves its first
    /// slide out; it was already shown by the previous batch.
    pub fn slideshow(slides: &[Slide], spec: &SceneSpec) -> MediaResult<Self> {
        let slides = if !spec.uses_overlap_slide() && slides.len() > 1 {
            &slides[1..]
        } else {
            slides
        };

        let scene = assemble(spec, slides.len())?;
        debug!(
            slides = slides.len(),
            ops = scene.graph.ops().len(),
            duration = scene.duration,
            "Compiled slideshow graph"
        );

        Ok(Self {
            inputs: slides
                .iter()
                .map(|s| s.input(spec.scene_duration))
                .collect(),
            graph: scene.graph,
            video: scene.video,
            audio: None,
            copy_video: false,
            duration: Some(scene.duration),
        })
    }

    /// Join pre-rendered partials in the given order.
    ///
    /// The joined length is not known until the result is probed.
    pub fn concat(segments: &[PathBuf]) -> MediaResult<Self> {
        if segments.is_empty() {
            return Err(MediaError::InvalidMedia("no segments to join".to_string()));
        }

        let mut graph = FilterGraph::new();
        let labels: Vec<StreamLabel> = (0..segments.len()).map(StreamLabel::video_input).collect();
        let concat = Concat::new(graph.labeler("join"), StreamKind::Video, segments.len());
        let video = single(graph.append(concat.compile(&labels)?)?)?;

        Ok(Self {
            inputs: segments.iter().map(FfmpegInput::new).collect(),
            graph,
            video,
            audio: None,
            copy_video: false,
            duration: None,
        })
    }

    /// Copy `video` and lay a track fitted to `target` seconds under it.
    pub fn remux_with_audio(
        video: &Path,
        track: &Path,
        native: f64,
        target: f64,
    ) -> MediaResult<(Self, AudioFit)> {
        let mut graph = FilterGraph::new();
        let (audio, fit) = fit_audio(&mut graph, StreamLabel::audio_input(1), native, target)?;

        let plan = Self {
            inputs: vec![FfmpegInput::new(video), FfmpegInput::new(track)],
            graph,
            video: StreamLabel::video_input(0),
            audio: Some(audio),
            copy_video: true,
            duration: Some(target),
        };
        Ok((plan, fit))
    }

    /// Add a track fitted to this plan's own duration.
    pub fn with_audio(mut self, track: &Path, native: f64) -> MediaResult<(Self, AudioFit)> {
        let target = self.duration.ok_or_else(|| {
            MediaError::internal("audio needs a plan with a known duration")
        })?;

        let index = self.inputs.len();
        self.inputs.push(FfmpegInput::new(track));
        let (audio, fit) = fit_audio(
            &mut self.graph,
            StreamLabel::audio_input(index),
            native,
            target,
        )?;
        self.audio = Some(audio);
        Ok((self, fit))
    }

    /// Expected output length, when known from the graph.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn graph(&self) -> &FilterGraph {
        &self.graph
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Build the FFmpeg invocation writing to `output`.
    pub fn to_command(&self, output: &Path, encoding: &EncodingConfig) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(output)
            .inputs(self.inputs.iter().cloned())
            .filter_complex(self.graph.render())
            .map(self.video.map_arg());

        if let Some(audio) = &self.audio {
            cmd = cmd.map(audio.map_arg());
        }

        cmd = if self.copy_video {
            cmd.video_codec("copy")
        } else {
            cmd.output_args(encoding.video_args())
        };

        if self.audio.is_some() {
            cmd = cmd.output_args(encoding.audio_args());
        }

        cmd.output_args(["-movflags", "+faststart"])
    }
}

fn single(mut outputs: Vec<StreamLabel>) -> MediaResult<StreamLabel> {
    if outputs.len() != 1 {
        return Err(MediaError::internal(format!(
            "expected one output stream, got {}",
            outputs.len()
        )));
    }
    Ok(outputs.remove(0))
}

/// Runs render plans through the FFmpeg CLI.
#[derive(Clone)]
pub struct FfmpegRenderer {
    encoding: Arc<EncodingConfig>,
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegRenderer {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding: Arc::new(encoding),
            timeout_secs: None,
            cancel_rx: None,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }

    /// Render `plan` to `output`. Blocks until FFmpeg exits.
    pub async fn render(&self, plan: &RenderPlan, output: &Path) -> MediaResult<()> {
        let cmd = plan.to_command(output, &self.encoding);

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }

        let expected = plan.duration();
        info!(
            inputs = plan.input_count(),
            audio = plan.has_audio(),
            output = %output.display(),
            "Rendering"
        );

        runner
            .run_with_progress(&cmd, move |progress| {
                if let Some(total) = expected {
                    debug!(
                        percent = progress.percentage(total),
                        speed = progress.speed,
                        "Render progress"
                    );
                }
            })
            .await?;

        if !output.exists() {
            return Err(MediaError::FileNotFound(output.to_path_buf()));
        }
        Ok(())
    }
}

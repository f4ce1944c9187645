//! Scene options controlling how slides are timed, sized and joined.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default seconds each slide stays on screen.
pub const DEFAULT_SCENE_DURATION: f64 = 5.0;
/// Default seconds a transition overlaps two slides.
pub const DEFAULT_TRANSITION_DURATION: f64 = 0.5;
/// Frame size used when neither dimension is requested.
pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 1000;
/// Accepted range for an explicit width or height.
pub const MIN_DIMENSION: u32 = 16;
pub const MAX_DIMENSION: u32 = 7680;

/// Per-slide visual effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Effect {
    #[default]
    None,
    /// Ken Burns zoom ramp across the slide.
    #[serde(alias = "zoompan")]
    PanZoom,
}

/// Transition between consecutive slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    /// Hard cut.
    #[default]
    None,
    /// Each slide fades in from and out to black.
    #[serde(alias = "fadeinout")]
    Fade,
    /// The next slide slides over the previous one.
    #[serde(alias = "slidein")]
    SlideWipe,
    /// Slide wipe with a zoom ramp on each slide's steady segment.
    #[serde(alias = "slidein-zoompan")]
    SlideWipeWithPanZoom,
}

impl Transition {
    /// Whether consecutive slides share a time window.
    pub fn overlaps(&self) -> bool {
        matches!(self, Transition::SlideWipe | Transition::SlideWipeWithPanZoom)
    }
}

/// How slide wipes pick their direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WipeMode {
    /// Cycle left-to-right, top-to-bottom, right-to-left, bottom-to-top.
    #[default]
    Alternate,
    /// One direction drawn at random for the whole render.
    Random,
    LeftToRight,
    TopToBottom,
    RightToLeft,
    BottomToTop,
}

/// How pan-zoom picks between zooming in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomMode {
    /// Even slides zoom in, odd slides zoom out.
    #[default]
    Alternate,
    /// One direction drawn at random for the whole render.
    Random,
    In,
    Out,
}

/// Position of a render call within a batched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchContinuation {
    /// Not part of a batched job.
    #[default]
    None,
    /// First batch: slide 0 is a fresh scene.
    Initial,
    /// Later batch: slide 0 repeats the previous batch's last slide.
    Continuation,
}

impl BatchContinuation {
    pub fn is_continuation(&self) -> bool {
        matches!(self, BatchContinuation::Continuation)
    }
}

/// Options for one render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneOptions {
    /// Seconds per slide
    #[serde(default = "default_scene_duration")]
    pub scene_duration: f64,

    /// Seconds of overlap between consecutive slides
    #[serde(default = "default_transition_duration")]
    pub transition_duration: f64,

    /// Target width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Target height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default)]
    pub effect: Effect,

    #[serde(default)]
    pub transition: Transition,

    #[serde(default)]
    pub wipe_direction: WipeMode,

    #[serde(default)]
    pub zoom_direction: ZoomMode,

    /// Attach a fitted background track
    #[serde(default)]
    pub audio: bool,

    #[serde(default)]
    pub batch_continuation: BatchContinuation,

    /// Split large requests into batches. When false, every request renders in one pass.
    #[serde(default = "default_batch_mode")]
    pub batch_mode: bool,
}

fn default_scene_duration() -> f64 {
    DEFAULT_SCENE_DURATION
}
fn default_transition_duration() -> f64 {
    DEFAULT_TRANSITION_DURATION
}
fn default_batch_mode() -> bool {
    true
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            scene_duration: DEFAULT_SCENE_DURATION,
            transition_duration: DEFAULT_TRANSITION_DURATION,
            width: None,
            height: None,
            effect: Effect::None,
            transition: Transition::None,
            wipe_direction: WipeMode::Alternate,
            zoom_direction: ZoomMode::Alternate,
            audio: false,
            batch_continuation: BatchContinuation::None,
            batch_mode: true,
        }
    }
}

impl SceneOptions {
    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_audio(mut self, audio: bool) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_continuation(mut self, continuation: BatchContinuation) -> Self {
        self.batch_continuation = continuation;
        self
    }

    /// Validate timing and size constraints.
    pub fn validate(&self) -> ModelResult<()> {
        if !(self.scene_duration.is_finite() && self.scene_duration > 0.0) {
            return Err(ModelError::invalid_options("scene_duration must be positive"));
        }

        if !(self.transition_duration.is_finite() && self.transition_duration >= 0.0) {
            return Err(ModelError::invalid_options(
                "transition_duration must not be negative",
            ));
        }

        if self.transition_duration >= self.scene_duration {
            return Err(ModelError::invalid_options(
                "transition_duration must be shorter than scene_duration",
            ));
        }

        // Wipes carve a lead and a tail window out of every interior slide.
        if self.transition.overlaps() && self.transition_duration * 2.0 >= self.scene_duration {
            return Err(ModelError::invalid_options(
                "slide transitions need scene_duration longer than twice transition_duration",
            ));
        }

        for (name, value) in [("width", self.width), ("height", self.height)] {
            if let Some(v) = value {
                if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&v) {
                    return Err(ModelError::invalid_options(format!(
                        "{} must be within {}..={}",
                        name, MIN_DIMENSION, MAX_DIMENSION
                    )));
                }
            }
        }

        Ok(())
    }

    /// Resolve the output frame size.
    ///
    /// When only one dimension is given the other follows the source aspect
    /// ratio (or stays square without a source). Both are rounded to even
    /// pixel counts.
    pub fn resolve_size(&self, source: Option<(u32, u32)>) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (even(w as f64), even(h as f64)),
            (Some(w), None) => {
                let h = match source {
                    Some((sw, sh)) if sw > 0 => w as f64 * sh as f64 / sw as f64,
                    _ => w as f64,
                };
                (even(w as f64), even(h))
            }
            (None, Some(h)) => {
                let w = match source {
                    Some((sw, sh)) if sh > 0 => h as f64 * sw as f64 / sh as f64,
                    _ => h as f64,
                };
                (even(w), even(h as f64))
            }
            (None, None) => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
        }
    }

    /// Whether the size depends on the source frame.
    pub fn needs_source_size(&self) -> bool {
        self.width.is_some() != self.height.is_some()
    }
}

fn even(value: f64) -> u32 {
    (((value / 2.0).round() as u32) * 2).max(2)
}

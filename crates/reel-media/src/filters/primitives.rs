//! Atomic filter primitives.

use reel_models::FPS;

use super::{Expression, Filter, Variants};
use crate::error::{GraphError, GraphResult};
use crate::graph::{num, FilterOp, Labeler, Stage, StreamLabel};

/// Kind of stream a multi-stream primitive works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

fn require_inputs(primitive: &'static str, inputs: &[StreamLabel]) -> GraphResult<()> {
    if inputs.is_empty() {
        return Err(GraphError::NoInputs { primitive });
    }
    Ok(())
}

/// Cut a stream to `[0, duration)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trim {
    pub duration: f64,
}

impl Trim {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }
}

impl Expression for Trim {
    fn expression(&self, _index: usize) -> String {
        format!("trim=duration={}", num(self.duration))
    }
}

/// Cut a stream to `[start, end)` of its own timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl Expression for Segment {
    fn expression(&self, _index: usize) -> String {
        format!("trim=start={}:end={}", num(self.start), num(self.end))
    }
}

/// Fit inside `width`x`height` keeping aspect ratio, then pad to the exact frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleLetterbox {
    pub width: u32,
    pub height: u32,
}

impl ScaleLetterbox {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Expression for ScaleLetterbox {
    fn expression(&self, _index: usize) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = self.width,
            h = self.height
        )
    }
}

/// Square pixels and timestamps rebased to zero. Required before concat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalize;

impl Expression for Normalize {
    fn expression(&self, _index: usize) -> String {
        "setsar=1:1,setpts=PTS-STARTPTS".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Zoom ramp between 1.0 and `max_zoom` over `frames` output frames.
#[derive(Debug, Clone, PartialEq)]
pub struct PanZoom {
    pub max_zoom: f64,
    pub frames: u32,
    pub width: u32,
    pub height: u32,
    pub directions: Variants<ZoomDirection>,
}

impl PanZoom {
    pub const DEFAULT_MAX_ZOOM: f64 = 1.5;

    pub fn new(max_zoom: f64, frames: u32, width: u32, height: u32) -> Self {
        Self {
            max_zoom,
            frames: frames.max(1),
            width,
            height,
            directions: Variants::Alternate(vec![ZoomDirection::In, ZoomDirection::Out]),
        }
    }

    pub fn with_directions(mut self, directions: Variants<ZoomDirection>) -> Self {
        self.directions = directions;
        self
    }

    /// Zoom change per frame.
    pub fn step(&self) -> f64 {
        (self.max_zoom - 1.0) / self.frames as f64
    }
}

impl Expression for PanZoom {
    fn expression(&self, index: usize) -> String {
        let step = num(self.step());
        let max = num(self.max_zoom);
        let zoom = match self.directions.pick(index) {
            ZoomDirection::In => format!("min(zoom+{},{})", step, max),
            ZoomDirection::Out => format!(
                "if(lte(zoom,1.0),{max},max(1.001,zoom-{step}))",
                max = max,
                step = step
            ),
        };
        format!(
            "zoompan=z='{}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={}:s={}x{}:fps={}",
            zoom, self.frames, self.width, self.height, FPS
        )
    }
}

/// Fade in over the first and out over the last `duration` seconds of `total`.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeInOut {
    pub duration: f64,
    pub total: f64,
}

impl FadeInOut {
    pub fn new(duration: f64, total: f64) -> Self {
        Self { duration, total }
    }
}

impl Expression for FadeInOut {
    fn expression(&self, _index: usize) -> String {
        format!(
            "fade=t=in:st=0:d={d},fade=t=out:st={st}:d={d}",
            d = num(self.duration),
            st = num(self.total - self.duration)
        )
    }
}

/// Trim audio to `[0, length)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrim {
    pub length: f64,
}

impl AudioTrim {
    pub fn new(length: f64) -> Self {
        Self { length }
    }
}

impl Expression for AudioTrim {
    fn expression(&self, _index: usize) -> String {
        format!("atrim=duration={},asetpts=PTS-STARTPTS", num(self.length))
    }
}

/// Linear fade to silence over `[start, start + length)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFadeOut {
    pub start: f64,
    pub length: f64,
}

impl AudioFadeOut {
    pub fn new(start: f64, length: f64) -> Self {
        Self { start, length }
    }
}

impl Expression for AudioFadeOut {
    fn expression(&self, _index: usize) -> String {
        format!(
            "afade=t=out:st={}:d={}",
            num(self.start),
            num(self.length)
        )
    }
}

/// One input stream to `copies` identical outputs, per input.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    labels: Labeler,
    kind: StreamKind,
    copies: usize,
}

impl Split {
    pub fn new(labels: Labeler, kind: StreamKind, copies: usize) -> Self {
        Self {
            labels,
            kind,
            copies,
        }
    }
}

impl Filter for Split {
    fn compile(&self, inputs: &[StreamLabel]) -> GraphResult<Stage> {
        require_inputs("split", inputs)?;
        if self.copies == 0 {
            return Err(GraphError::NoOutputs);
        }

        let name = match self.kind {
            StreamKind::Video => "split",
            StreamKind::Audio => "asplit",
        };

        let mut stage = Stage::default();
        for (i, input) in inputs.iter().enumerate() {
            let outs: Vec<StreamLabel> = (0..self.copies)
                .map(|c| self.labels.label(i * self.copies + c))
                .collect();
            stage.ops.push(FilterOp::new(
                vec![input.clone()],
                format!("{}={}", name, self.copies),
                outs.clone(),
            ));
            stage.outputs.extend(outs);
        }
        Ok(stage)
    }
}

/// Repeat one audio stream `repetitions` times, ready for concatenation.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioLoop {
    split: Split,
}

impl AudioLoop {
    pub fn new(labels: Labeler, repetitions: usize) -> Self {
        Self {
            split: Split::new(labels, StreamKind::Audio, repetitions),
        }
    }
}

impl Filter for AudioLoop {
    fn compile(&self, inputs: &[StreamLabel]) -> GraphResult<Stage> {
        if inputs.len() != 1 {
            return Err(GraphError::Arity {
                primitive: "audio loop",
                expected: 1,
                actual: inputs.len(),
            });
        }
        self.split.compile(inputs)
    }
}

/// Join `count` streams of one kind end to end.
#[derive(Debug, Clone, PartialEq)]
pub struct Concat {
    labels: Labeler,
    kind: StreamKind,
    count: usize,
}

impl Concat {
    pub fn new(labels: Labeler, kind: StreamKind, count: usize) -> Self {
        Self {
            labels,
            kind,
            count,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl Filter for Concat {
    fn compile(&self, inputs: &[StreamLabel]) -> GraphResult<Stage> {
        require_inputs("concat", inputs)?;
        if inputs.len() != self.count {
            return Err(GraphError::Arity {
                primitive: "concat",
                expected: self.count,
                actual: inputs.len(),
            });
        }

        let (v, a) = match self.kind {
            StreamKind::Video => (1, 0),
            StreamKind::Audio => (0, 1),
        };
        let out = self.labels.label(0);

        Ok(Stage::new(
            vec![FilterOp::new(
                inputs.to_vec(),
                format!("concat=n={}:v={}:a={}", self.count, v, a),
                vec![out.clone()],
            )],
            vec![out],
        ))
    }
}

/// Direction the incoming slide travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeDirection {
    LeftToRight,
    TopToBottom,
    RightToLeft,
    BottomToTop,
}

impl WipeDirection {
    pub const ALL: [WipeDirection; 4] = [
        WipeDirection::LeftToRight,
        WipeDirection::TopToBottom,
        WipeDirection::RightToLeft,
        WipeDirection::BottomToTop,
    ];
}

/// Slide a trailing stream over a leading one within `duration` seconds.
///
/// Inputs come in `(leading, trailing)` pairs; pair `i` produces output `i`
/// and picks its direction by `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayWipe {
    labels: Labeler,
    duration: f64,
    directions: Variants<WipeDirection>,
}

impl OverlayWipe {
    pub fn new(labels: Labeler, duration: f64, directions: Variants<WipeDirection>) -> Self {
        Self {
            labels,
            duration,
            directions,
        }
    }

    fn position(&self, direction: WipeDirection) -> String {
        let d = num(self.duration);
        match direction {
            WipeDirection::LeftToRight => format!("x='min(-w+t*w/{},0)':y=0", d),
            WipeDirection::TopToBottom => format!("x=0:y='min(-h+t*h/{},0)'", d),
            WipeDirection::RightToLeft => format!("x='max(w-t*w/{},0)':y=0", d),
            WipeDirection::BottomToTop => format!("x=0:y='max(h-t*h/{},0)'", d),
        }
    }
}

impl Filter for OverlayWipe {
    fn compile(&self, inputs: &[StreamLabel]) -> GraphResult<Stage> {
        require_inputs("overlay wipe", inputs)?;
        if inputs.len() % 2 != 0 {
            return Err(GraphError::Arity {
                primitive: "overlay wipe",
                expected: inputs.len() + 1,
                actual: inputs.len(),
            });
        }

        let mut stage = Stage::default();
        for (i, pair) in inputs.chunks(2).enumerate() {
            let out = self.labels.label(i);
            stage.ops.push(FilterOp::new(
                pair.to_vec(),
                format!(
                    "overlay={}:shortest=1",
                    self.position(*self.directions.pick(i))
                ),
                vec![out.clone()],
            ));
            stage.outputs.push(out);
        }
        Ok(stage)
    }
}

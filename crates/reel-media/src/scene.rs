//! Scene assembler: turns slide count and options into one video stream.
//!
//! Every slide first becomes a scene stream of `scene_duration` seconds at
//! the output frame size. Cut and fade scenes are concatenated directly.
//! Wipe scenes cut each slide into up to three segments:
//!
//! ```text
//!   slide i:   [ lead | body ............ | tail ]
//!              0      T                 S-T     S
//! ```
//!
//! `tail(i)` and `lead(i+1)` are overlaid into one transition of `T` seconds
//! and the final order is `body0, x(0,1), body1, x(1,2), ..., body(n-1)`.
//! The first slide has no lead and the last has no tail, so a fresh run lasts
//! `n*S - (n-1)*T`. A continuation run starts from the previous batch's last
//! slide, which was already shown in full; only its tail is used, as the
//! background of the first wipe.

use rand::Rng;
use reel_models::{Effect, SceneOptions, Transition, WipeMode, ZoomMode, FPS};

use crate::error::{GraphError, GraphResult};
use crate::filters::{
    Combine, Concat, FadeInOut, Filter, Normalize, OverlayWipe, PanZoom, ScaleLetterbox, Segment,
    Split, StreamKind, Trim, Variants, WipeDirection, ZoomDirection,
};
use crate::graph::{FilterGraph, StreamLabel};

/// The closed set of scene layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Plain,
    PanZoom,
    Fade { pan_zoom: bool },
    SlideWipe,
    SlideWipePanZoom,
}

impl SceneKind {
    pub fn from_options(options: &SceneOptions) -> Self {
        let pan_zoom = options.effect == Effect::PanZoom;
        let timed = options.transition_duration > 0.0;

        match options.transition {
            Transition::Fade if timed => SceneKind::Fade { pan_zoom },
            Transition::SlideWipe if timed && pan_zoom => SceneKind::SlideWipePanZoom,
            Transition::SlideWipe if timed => SceneKind::SlideWipe,
            Transition::SlideWipeWithPanZoom if timed => SceneKind::SlideWipePanZoom,
            _ if pan_zoom => SceneKind::PanZoom,
            _ => SceneKind::Plain,
        }
    }

    /// Whether consecutive slides share a transition window.
    pub fn overlaps(&self) -> bool {
        matches!(self, SceneKind::SlideWipe | SceneKind::SlideWipePanZoom)
    }

    fn pan_zoom(&self) -> bool {
        matches!(
            self,
            SceneKind::PanZoom | SceneKind::Fade { pan_zoom: true } | SceneKind::SlideWipePanZoom
        )
    }
}

/// Fully resolved scene parameters for one compile call.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSpec {
    pub kind: SceneKind,
    pub scene_duration: f64,
    pub transition_duration: f64,
    pub width: u32,
    pub height: u32,
    /// First slide repeats the previous batch's last slide.
    pub continuation: bool,
    pub max_zoom: f64,
    pub zoom: Variants<ZoomDirection>,
    pub wipe: Variants<WipeDirection>,
}

impl SceneSpec {
    /// Resolve options for a frame of `size`.
    ///
    /// Random direction modes are drawn here, once for the whole call.
    pub fn from_options<R: Rng + ?Sized>(
        options: &SceneOptions,
        size: (u32, u32),
        rng: &mut R,
    ) -> Self {
        let kind = SceneKind::from_options(options);
        let zoom_choices = [ZoomDirection::In, ZoomDirection::Out];

        let zoom = match options.zoom_direction {
            ZoomMode::Alternate => Variants::Alternate(zoom_choices.to_vec()),
            ZoomMode::In => Variants::Fixed(ZoomDirection::In),
            ZoomMode::Out => Variants::Fixed(ZoomDirection::Out),
            ZoomMode::Random => Variants::random(&zoom_choices, rng)
                .unwrap_or(Variants::Fixed(ZoomDirection::In)),
        };

        let wipe = match options.wipe_direction {
            WipeMode::Alternate => Variants::Alternate(WipeDirection::ALL.to_vec()),
            WipeMode::LeftToRight => Variants::Fixed(WipeDirection::LeftToRight),
            WipeMode::TopToBottom => Variants::Fixed(WipeDirection::TopToBottom),
            WipeMode::RightToLeft => Variants::Fixed(WipeDirection::RightToLeft),
            WipeMode::BottomToTop => Variants::Fixed(WipeDirection::BottomToTop),
            WipeMode::Random => Variants::random(&WipeDirection::ALL, rng)
                .unwrap_or(Variants::Fixed(WipeDirection::LeftToRight)),
        };

        Self {
            kind,
            scene_duration: options.scene_duration,
            transition_duration: options.transition_duration,
            width: size.0,
            height: size.1,
            continuation: options.batch_continuation.is_continuation(),
            max_zoom: PanZoom::DEFAULT_MAX_ZOOM,
            zoom,
            wipe,
        }
    }

    /// Frames the zoom ramp is spread over.
    pub fn pan_zoom_frames(&self) -> u32 {
        let visible = if self.kind.overlaps() {
            self.scene_duration - self.transition_duration
        } else {
            self.scene_duration
        };
        (visible * FPS as f64).ceil() as u32
    }

    /// Whether a continuation run needs its first slide at all.
    ///
    /// Without overlapping transitions the repeated slide contributes
    /// nothing and should be left out of the input list.
    pub fn uses_overlap_slide(&self) -> bool {
        !self.continuation || self.kind.overlaps()
    }

    fn pan_zoom(&self) -> PanZoom {
        PanZoom::new(self.max_zoom, self.pan_zoom_frames(), self.width, self.height)
            .with_directions(self.zoom.clone())
    }
}

/// A compiled scene: the graph plus its terminal video stream.
#[derive(Debug, Clone)]
pub struct Scene {
    pub graph: FilterGraph,
    pub video: StreamLabel,
    /// Timeline length in seconds
    pub duration: f64,
}

/// Compile `slides` inputs (`0:v` .. `n-1:v`) into one video stream.
pub fn assemble(spec: &SceneSpec, slides: usize) -> GraphResult<Scene> {
    if slides == 0 {
        return Err(GraphError::NoInputs {
            primitive: "scene",
        });
    }

    if spec.kind.overlaps() {
        // Interior slides give up both a lead and a tail window.
        if 2.0 * spec.transition_duration >= spec.scene_duration {
            return Err(GraphError::WipeTooLong {
                transition_ms: (spec.transition_duration * 1000.0).round() as u64,
                scene_ms: (spec.scene_duration * 1000.0).round() as u64,
            });
        }
        assemble_wipe(spec, slides)
    } else {
        assemble_cut(spec, slides)
    }
}

fn assemble_cut(spec: &SceneSpec, slides: usize) -> GraphResult<Scene> {
    let mut graph = FilterGraph::new();
    let inputs: Vec<StreamLabel> = (0..slides).map(StreamLabel::video_input).collect();

    let fade = match spec.kind {
        SceneKind::Fade { .. } => Some(FadeInOut::new(
            spec.transition_duration,
            spec.scene_duration,
        )),
        _ => None,
    };

    let scenes = Combine::new(graph.labeler("scn"))
        .with(ScaleLetterbox::new(spec.width, spec.height))
        .with_opt(spec.kind.pan_zoom().then(|| spec.pan_zoom()))
        .with(Trim::new(spec.scene_duration))
        .with_opt(fade)
        .with(Normalize)
        .compile(&inputs)?;
    let scenes = graph.append(scenes)?;

    let concat = Concat::new(graph.labeler("cat"), StreamKind::Video, scenes.len());
    let video = single(graph.append(concat.compile(&scenes)?)?)?;

    Ok(Scene {
        graph,
        video,
        duration: slides as f64 * spec.scene_duration,
    })
}

/// Segment windows one slide contributes to a wipe scene.
#[derive(Debug, Clone, PartialEq)]
struct SlideSegments {
    lead: Option<Segment>,
    body: Option<Segment>,
    tail: Option<Segment>,
}

impl SlideSegments {
    fn for_slide(index: usize, slides: usize, spec: &SceneSpec) -> Self {
        let s = spec.scene_duration;
        let t = spec.transition_duration;
        let has_lead = index > 0;
        let has_tail = index + 1 < slides;

        let start = if has_lead { t } else { 0.0 };
        let end = if has_tail { s - t } else { s };
        let skip_body = spec.continuation && index == 0 && slides > 1;

        Self {
            lead: has_lead.then(|| Segment::new(0.0, t)),
            body: (!skip_body && end > start).then(|| Segment::new(start, end)),
            tail: has_tail.then(|| Segment::new(s - t, s)),
        }
    }

    fn count(&self) -> usize {
        [self.lead.is_some(), self.body.is_some(), self.tail.is_some()]
            .iter()
            .filter(|present| **present)
            .count()
    }
}

fn assemble_wipe(spec: &SceneSpec, slides: usize) -> GraphResult<Scene> {
    let mut graph = FilterGraph::new();
    let inputs: Vec<StreamLabel> = (0..slides).map(StreamLabel::video_input).collect();

    let scenes = Combine::new(graph.labeler("scn"))
        .with(ScaleLetterbox::new(spec.width, spec.height))
        .with(Trim::new(spec.scene_duration))
        .with(Normalize)
        .compile(&inputs)?;
    let scenes = graph.append(scenes)?;

    let mut bodies: Vec<Option<StreamLabel>> = Vec::with_capacity(slides);
    let mut leads: Vec<Option<StreamLabel>> = Vec::with_capacity(slides);
    let mut tails: Vec<Option<StreamLabel>> = Vec::with_capacity(slides);
    let mut duration = 0.0;

    for (i, scene) in scenes.iter().enumerate() {
        let segments = SlideSegments::for_slide(i, slides, spec);

        let copies = if segments.count() > 1 {
            let split = Split::new(graph.labeler("spl"), StreamKind::Video, segments.count());
            graph.append(split.compile(std::slice::from_ref(scene))?)?
        } else {
            vec![scene.clone()]
        };
        let mut copies = copies.into_iter();

        leads.push(match segments.lead {
            Some(seg) => Some(cut(&mut graph, next_copy(&mut copies)?, seg, None, i)?),
            None => None,
        });

        bodies.push(match segments.body {
            Some(seg) => {
                duration += seg.duration();
                let zoom = (spec.kind == SceneKind::SlideWipePanZoom).then(|| spec.pan_zoom());
                Some(cut(&mut graph, next_copy(&mut copies)?, seg, zoom, i)?)
            }
            None => None,
        });

        tails.push(match segments.tail {
            Some(seg) => Some(cut(&mut graph, next_copy(&mut copies)?, seg, None, i)?),
            None => None,
        });
    }

    // (tail i, lead i+1) pairs, one per boundary
    let mut pairs = Vec::with_capacity(2 * (slides - 1));
    for i in 0..slides - 1 {
        pairs.push(take(&mut tails[i])?);
        pairs.push(take(&mut leads[i + 1])?);
    }

    let transitions = if pairs.is_empty() {
        Vec::new()
    } else {
        let wipe = OverlayWipe::new(
            graph.labeler("wip"),
            spec.transition_duration,
            spec.wipe.clone(),
        );
        graph.append(wipe.compile(&pairs)?)?
    };
    duration += transitions.len() as f64 * spec.transition_duration;

    let mut order = Vec::with_capacity(bodies.len() + transitions.len());
    let mut transitions = transitions.into_iter();
    for body in bodies {
        order.extend(body);
        order.extend(transitions.next());
    }

    let concat = Concat::new(graph.labeler("cat"), StreamKind::Video, order.len());
    let video = single(graph.append(concat.compile(&order)?)?)?;

    Ok(Scene {
        graph,
        video,
        duration,
    })
}

/// Cut one segment out of a split copy, optionally zooming it.
fn cut(
    graph: &mut FilterGraph,
    input: StreamLabel,
    segment: Segment,
    zoom: Option<PanZoom>,
    slide: usize,
) -> GraphResult<StreamLabel> {
    let length = segment.duration();
    let mut combine = Combine::new(graph.labeler("seg"))
        .with(segment)
        .with(Normalize)
        .starting_at(slide);

    if let Some(zoom) = zoom {
        combine = combine.with(zoom).with(Trim::new(length)).with(Normalize);
    }

    single(graph.append(combine.compile(&[input])?)?)
}

fn next_copy(copies: &mut impl Iterator<Item = StreamLabel>) -> GraphResult<StreamLabel> {
    copies.next().ok_or(GraphError::Arity {
        primitive: "segment split",
        expected: 1,
        actual: 0,
    })
}

fn take(slot: &mut Option<StreamLabel>) -> GraphResult<StreamLabel> {
    slot.take().ok_or(GraphError::NoInputs {
        primitive: "overlay wipe",
    })
}

fn single(mut outputs: Vec<StreamLabel>) -> GraphResult<StreamLabel> {
    match outputs.len() {
        1 => Ok(outputs.remove(0)),
        n => Err(GraphError::Arity {
            primitive: "terminal stage",
            expected: 1,
            actual: n,
        }),
    }
}

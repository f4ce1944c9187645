//! Background audio selection and fitting.
//!
//! A track is looped until it covers the video, trimmed to the exact video
//! length and faded out over the final seconds.

use rand::seq::IndexedRandom;
use rand::Rng;
use reel_models::audio::AUDIO_FADE_OUT_SECS;
use reel_models::{AudioCatalog, AudioTrack};

use crate::error::{GraphError, GraphResult};
use crate::filters::{AudioFadeOut, AudioLoop, AudioTrim, Chain, Combine, Concat, Filter, StreamKind};
use crate::graph::{FilterGraph, StreamLabel};

/// Pick a track for a video of `target` seconds.
///
/// Loops are always eligible; plain tracks only when they fit inside the
/// video. Returns `None` when nothing qualifies.
pub fn select_track<'a, R: Rng + ?Sized>(
    catalog: &'a AudioCatalog,
    target: f64,
    rng: &mut R,
) -> Option<&'a AudioTrack> {
    catalog.eligible(target).choose(rng).copied()
}

/// Timing of a fitted track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFit {
    pub repetitions: usize,
    pub duration: f64,
    pub fade_start: f64,
    pub fade_length: f64,
}

impl AudioFit {
    pub fn new(native: f64, target: f64) -> Self {
        let repetitions = if native > 0.0 {
            ((target / native).ceil() as usize).max(1)
        } else {
            1
        };
        let fade_length = AUDIO_FADE_OUT_SECS.min(target);

        Self {
            repetitions,
            duration: target,
            fade_start: target - fade_length,
            fade_length,
        }
    }
}

/// Append the loop/trim/fade chain for `input` and return its output label.
pub fn fit_audio(
    graph: &mut FilterGraph,
    input: StreamLabel,
    native: f64,
    target: f64,
) -> GraphResult<(StreamLabel, AudioFit)> {
    let fit = AudioFit::new(native, target);

    let chain = Chain::new()
        .then(AudioLoop::new(graph.labeler("alp"), fit.repetitions))
        .then(Concat::new(
            graph.labeler("acat"),
            StreamKind::Audio,
            fit.repetitions,
        ))
        .then(
            Combine::new(graph.labeler("aud"))
                .with(AudioTrim::new(fit.duration))
                .with(AudioFadeOut::new(fit.fade_start, fit.fade_length)),
        );

    let mut outputs = graph.append(chain.compile(&[input])?)?;
    let label = outputs.pop().ok_or(GraphError::NoOutputs)?;
    Ok((label, fit))
}

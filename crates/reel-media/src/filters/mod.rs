//! Filter primitives and the combinators that compose them.
//!
//! Two small interfaces keep composition flat:
//! - [`Expression`] produces the textual filter for the stream at a position.
//! - [`Filter`] consumes labelled streams and emits graph operations.
//!
//! Per-stream primitives (trim, scale, fade, ...) are expressions and get
//! applied through [`Combine`]. Primitives that change stream arity (split,
//! concat, overlay) are filters in their own right.

pub mod combinators;
pub mod primitives;

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::error::GraphResult;
use crate::graph::{Stage, StreamLabel};

pub use combinators::{Chain, Combine};
pub use primitives::{
    AudioFadeOut, AudioLoop, AudioTrim, Concat, FadeInOut, Normalize, OverlayWipe, PanZoom,
    ScaleLetterbox, Segment, Split, StreamKind, Trim, WipeDirection, ZoomDirection,
};

/// Produces the filter expression applied to the stream at `index`.
pub trait Expression: Send + Sync {
    fn expression(&self, index: usize) -> String;
}

/// Consumes labelled streams and emits the operations that transform them.
pub trait Filter: Send + Sync {
    /// Compile against `inputs` without touching any shared state.
    fn compile(&self, inputs: &[StreamLabel]) -> GraphResult<Stage>;
}

/// How a primitive picks between its variants per stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variants<T> {
    /// Same variant for every stream.
    Fixed(T),
    /// Stream `i` uses `choices[i % choices.len()]`.
    Alternate(Vec<T>),
}

impl<T: Clone> Variants<T> {
    /// Draw one variant for the whole call.
    ///
    /// Every stream of the call shares the drawn variant. Returns `None` when
    /// there is nothing to choose from.
    pub fn random<R: Rng + ?Sized>(choices: &[T], rng: &mut R) -> Option<Self> {
        choices.choose(rng).cloned().map(Variants::Fixed)
    }

    pub fn pick(&self, index: usize) -> &T {
        match self {
            Variants::Fixed(v) => v,
            Variants::Alternate(choices) => &choices[index % choices.len()],
        }
    }
}

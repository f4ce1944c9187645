//! Slideshow filter-graph compiler and FFmpeg CLI wrapper.
//!
//! This crate provides:
//! - A stream algebra over labelled FFmpeg streams ([`graph`])
//! - Filter primitives and combinators ([`filters`])
//! - The scene assembler and the background audio fitter
//! - Type-safe FFmpeg command building with progress parsing and cancellation
//! - Input acquisition: image validation and retrying downloads

pub mod audio;
pub mod command;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod graph;
pub mod probe;
pub mod progress;
pub mod render;
pub mod scene;

pub use audio::{fit_audio, select_track, AudioFit};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use error::{GraphError, GraphResult, MediaError, MediaResult};
pub use fetch::{FetchPolicy, HttpFetcher};
pub use graph::{FilterGraph, FilterOp, Labeler, Stage, StreamLabel};
pub use probe::{probe_duration, probe_frame_size, probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use render::{FfmpegRenderer, RenderPlan, Slide, SlideKind};
pub use scene::{assemble, Scene, SceneKind, SceneSpec};

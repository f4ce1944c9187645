//! Object key layout for rendered artifacts.

use reel_models::JobId;

/// Prefix shared by every rendered artifact.
pub const VIDEO_PREFIX: &str = "video";

/// Extension of every rendered artifact.
pub const VIDEO_EXTENSION: &str = ".mp4";

/// Segment name of a job's final render.
pub fn final_segment_name() -> &'static str {
    "video"
}

/// Key of one artifact: `video/<job-id>/<segment>.mp4`.
pub fn video_key(job_id: &JobId, segment: &str) -> String {
    format!("{}/{}/{}{}", VIDEO_PREFIX, job_id, segment, VIDEO_EXTENSION)
}

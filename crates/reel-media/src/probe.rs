//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information. Still images report no duration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: Option<f64>,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe a media file for information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidMedia("No video stream found".to_string()))?;

    // Image decoders report "N/A" or nothing at all
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(MediaInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        codec: video_stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Duration of a rendered file in seconds.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    probe_media(path)
        .await?
        .duration
        .ok_or_else(|| MediaError::InvalidMedia(format!("{} has no duration", path.display())))
}

/// Pixel size of the first video stream.
pub async fn probe_frame_size(path: impl AsRef<Path>) -> MediaResult<(u32, u32)> {
    let info = probe_media(path).await?;
    if info.width == 0 || info.height == 0 {
        return Err(MediaError::InvalidMedia(
            "video stream has no frame size".to_string(),
        ));
    }
    Ok((info.width, info.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 1000, "height": 1000}
            ],
            "format": {"duration": "23.040000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1000);
        assert_eq!(info.codec, "h264");
        assert!((info.duration.unwrap() - 23.04).abs() < 1e-9);
    }

    #[test]
    fn test_parse_still_image() {
        let json = br#"{
            "streams": [{"codec_type": "video", "codec_name": "mjpeg", "width": 1024, "height": 768}],
            "format": {"duration": "N/A"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration, None);
        assert_eq!((info.width, info.height), (1024, 768));
    }

    #[test]
    fn test_parse_without_video() {
        let json = br#"{"streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidMedia(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = probe_media("/nonexistent/slide.jpg").await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}

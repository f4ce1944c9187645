//! Rendering a local directory of images, without queue, record store or
//! blob storage.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{info, warn};

use reel_media::select_track;
use reel_models::{ModelError, SceneOptions};

use crate::backend::{Fetcher, Renderer};
use crate::error::WorkerResult;
use crate::orchestrator::slideshow_plan;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif", "tif", "tiff"];

/// Build scene options from `key=value` arguments.
///
/// Values are read as JSON when they parse (`width=800`, `audio=true`) and
/// as plain strings otherwise (`transition=slidein`).
pub fn parse_overrides<S: AsRef<str>>(args: &[S]) -> WorkerResult<SceneOptions> {
    let mut map = Map::new();
    for arg in args {
        let arg = arg.as_ref();
        let (key, raw) = arg.split_once('=').ok_or_else(|| {
            ModelError::invalid_options(format!("expected key=value, got '{}'", arg))
        })?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(key.trim().to_string(), value);
    }

    let options: SceneOptions = serde_json::from_value(Value::Object(map))
        .map_err(|e| ModelError::invalid_options(e.to_string()))?;
    options.validate()?;
    Ok(options)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> WorkerResult<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// Render every image in `dir` to `output` and return the video length.
///
/// `fetcher` only supplies the audio catalog and the selected track.
pub async fn render_directory(
    dir: &Path,
    output: &Path,
    options: &SceneOptions,
    renderer: &dyn Renderer,
    fetcher: &dyn Fetcher,
) -> WorkerResult<f64> {
    let images = list_images(dir)?;
    if images.is_empty() {
        return Err(ModelError::EmptyRequest.into());
    }
    info!(slides = images.len(), dir = %dir.display(), "Rendering local slideshow");

    let mut options = options.clone();
    if options.needs_source_size() {
        let frame = renderer.frame_size(&images[0]).await?;
        let (width, height) = options.resolve_size(Some(frame));
        options = options.with_size(Some(width), Some(height));
    }

    let mut plan = slideshow_plan(images, &options)?;
    let duration = plan.duration().unwrap_or_default();

    let scratch = tempfile::tempdir()?;
    if options.audio {
        let track = match fetcher.audio_catalog().await? {
            Some(catalog) => {
                let mut rng = rand::rng();
                select_track(&catalog, duration, &mut rng).cloned()
            }
            None => None,
        };
        match track {
            Some(track) => {
                let path = fetcher.fetch(&track.url, scratch.path()).await?;
                plan = plan.with_audio(&path, track.length)?.0;
            }
            None => warn!("No eligible audio track, rendering silent"),
        }
    }

    renderer.render(&plan, output).await?;
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use crate::memory::{MemoryFetcher, MemoryRenderer};
    use reel_models::{AudioCatalog, AudioKind, AudioTrack, Transition};

    #[test]
    fn test_parse_overrides() {
        let options = parse_overrides(&[
            "transition=slidein",
            "scene_duration=3",
            "width=800",
            "audio=true",
        ])
        .unwrap();

        assert_eq!(options.transition, Transition::SlideWipe);
        assert_eq!(options.scene_duration, 3.0);
        assert_eq!(options.width, Some(800));
        assert!(options.audio);
        assert_eq!(options.transition_duration, 0.5);
    }

    #[test]
    fn test_parse_overrides_rejects_bad_input() {
        assert!(matches!(
            parse_overrides(&["width"]),
            Err(WorkerError::InvalidRequest(_))
        ));
        assert!(parse_overrides(&["transition=spin"]).is_err());
        assert!(parse_overrides(&["scene_duration=1", "transition_duration=2"]).is_err());
        assert_eq!(parse_overrides::<&str>(&[]).unwrap(), SceneOptions::default());
    }

    #[test]
    fn test_list_images_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("d.jpg")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);
    }

    #[tokio::test]
    async fn test_render_directory_with_audio() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("{}.jpg", i)), b"x").unwrap();
        }
        let output = dir.path().join("out.mp4");

        let renderer = MemoryRenderer::default();
        let fetcher = MemoryFetcher::with_catalog(AudioCatalog::new(vec![AudioTrack::new(
            "https://audio/loop.mp3",
            12.0,
            AudioKind::Loop,
        )]));
        let options = SceneOptions::default().with_audio(true);

        let duration = render_directory(dir.path(), &output, &options, &renderer, &fetcher)
            .await
            .unwrap();

        assert_eq!(duration, 25.0);
        assert!(output.exists());
        let calls = renderer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].inputs, 6);
        assert!(calls[0].audio);
    }

    #[tokio::test]
    async fn test_render_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_directory(
            dir.path(),
            &dir.path().join("out.mp4"),
            &SceneOptions::default(),
            &MemoryRenderer::default(),
            &MemoryFetcher::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WorkerError::InvalidRequest(ModelError::EmptyRequest)));
    }
}

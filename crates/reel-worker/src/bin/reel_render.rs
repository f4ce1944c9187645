//! Render a local directory of images into one video.
//!
//! Usage: `reel-render <image-dir> <output.mp4> [key=value ...]`

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use reel_media::{check_ffmpeg, FetchPolicy, FfmpegRenderer, HttpFetcher};
use reel_models::EncodingConfig;
use reel_worker::local::{parse_overrides, render_directory};
use reel_worker::{telemetry, HttpSource, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        anyhow::bail!("usage: reel-render <image-dir> <output.mp4> [key=value ...]");
    }
    let dir = PathBuf::from(&args[0]);
    let output = PathBuf::from(&args[1]);
    let options = parse_overrides(&args[2..])?;

    check_ffmpeg().context("ffmpeg is required")?;

    let config = WorkerConfig::from_env();
    let policy = FetchPolicy::default().with_retry_unit(config.fetch_retry_unit);
    let fetcher = HttpSource::new(
        HttpFetcher::new(policy)?,
        config.fetch_concurrency,
        config.audio_index_url.clone(),
    );
    let renderer =
        FfmpegRenderer::new(EncodingConfig::default()).with_timeout(config.ffmpeg_timeout.as_secs());

    let duration = render_directory(&dir, &output, &options, &renderer, &fetcher)
        .await
        .with_context(|| format!("rendering {}", dir.display()))?;

    info!(output = %output.display(), duration, "Render complete");
    Ok(())
}

//! Remote input acquisition: slide validation and retrying downloads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::{stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use reel_models::AudioCatalog;

use crate::error::{MediaError, MediaResult};

/// Default number of attempts per resource.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Retry bounds for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub attempts: u32,
    /// Attempt `k` (0-based) waits `k * retry_unit` before starting.
    pub retry_unit: Duration,
    pub request_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_FETCH_ATTEMPTS,
            retry_unit: Duration::from_secs(1),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl FetchPolicy {
    pub fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = unit;
        self
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.retry_unit * attempt
    }
}

/// HTTP downloader for slides, audio tracks and the audio catalog.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: FetchPolicy,
}

impl HttpFetcher {
    pub fn new(policy: FetchPolicy) -> MediaResult<Self> {
        let client = Client::builder()
            .timeout(policy.request_timeout)
            .user_agent(concat!("reel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Whether `url` answers 2xx with an `image/*` content type.
    ///
    /// Tries `HEAD` first and falls back to `GET` for servers that reject it.
    /// Network failures count as invalid.
    pub async fn validate_image(&self, url: &str) -> bool {
        let head = match self.client.head(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url, error = %e, "Slide validation request failed");
                return false;
            }
        };

        let resp = if matches!(
            head.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            match self.client.get(url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    debug!(url, error = %e, "Slide validation request failed");
                    return false;
                }
            }
        } else {
            head
        };

        let is_image = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false);

        resp.status().is_success() && is_image
    }

    /// Keep the URLs that validate, in their original order.
    pub async fn filter_valid(&self, urls: &[String], concurrency: usize) -> Vec<String> {
        let checks: Vec<(String, bool)> = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let ok = self.validate_image(&url).await;
                (url, ok)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let total = checks.len();
        let valid: Vec<String> = checks
            .into_iter()
            .filter_map(|(url, ok)| {
                if !ok {
                    info!(url = %url, "Dropping slide that is not a reachable image");
                }
                ok.then_some(url)
            })
            .collect();

        debug!(total, valid = valid.len(), "Validated slide URLs");
        valid
    }

    /// Download `url` into `dir` under a unique name.
    ///
    /// Retries per the fetch policy. A failed attempt never leaves a file
    /// behind.
    pub async fn fetch(&self, url: &str, dir: &Path) -> MediaResult<PathBuf> {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let path = dir.join(format!("{}{}", uuid::Uuid::new_v4(), extension_for(url)));
            metrics::counter!("reel_fetch_attempts_total").increment(1);

            match self.fetch_once(url, &path).await {
                Ok(bytes) => {
                    debug!(url, bytes, path = %path.display(), "Fetched resource");
                    return Ok(path);
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&path).await;
                    warn!(
                        url,
                        attempt = attempt + 1,
                        attempts,
                        error = %e,
                        "Fetch attempt failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        metrics::counter!("reel_fetch_failures_total").increment(1);
        Err(MediaError::fetch_failed(url, attempts, last_error))
    }

    async fn fetch_once(&self, url: &str, path: &Path) -> MediaResult<u64> {
        let resp = self.client.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(path).await?;
        let mut body = resp.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }

    /// Fetch every URL into `dir`, preserving input order.
    ///
    /// Fails on the first resource that exhausts its retries.
    pub async fn fetch_all(
        &self,
        urls: &[String],
        dir: &Path,
        concurrency: usize,
    ) -> MediaResult<Vec<PathBuf>> {
        stream::iter(urls.iter().cloned())
            .map(|url| async move { self.fetch(&url, dir).await })
            .buffered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    /// GET and decode a JSON document, retried like any other fetch.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> MediaResult<T> {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result = async {
                let resp = self.client.get(url).send().await?.error_for_status()?;
                let bytes = resp.bytes().await?;
                Ok::<_, MediaError>(serde_json::from_slice::<T>(&bytes)?)
            }
            .await;

            match result {
                Ok(doc) => return Ok(doc),
                // Malformed documents will not improve on retry
                Err(e @ MediaError::JsonParse(_)) => return Err(e),
                Err(e) => {
                    warn!(url, attempt = attempt + 1, error = %e, "JSON fetch failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(MediaError::fetch_failed(url, attempts, last_error))
    }

    /// Load the background audio catalog.
    pub async fn fetch_catalog(&self, url: &str) -> MediaResult<AudioCatalog> {
        let catalog: AudioCatalog = self.fetch_json(url).await?;
        info!(tracks = catalog.tracks.len(), "Loaded audio catalog");
        Ok(catalog)
    }
}

/// File extension (with dot) taken from the URL path, if it has a sane one.
fn extension_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            let path = u.path().to_string();
            Path::new(&path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
        })
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use std::sync::Arc;

    fn fast_fetcher() -> HttpFetcher {
        HttpFetcher::new(FetchPolicy::default().with_retry_unit(Duration::from_millis(5))).unwrap()
    }

    fn image_response() -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "image/jpeg")
            .set_body_bytes(vec![0xFFu8, 0xD8, 0xFF, 0xE0])
    }

    #[test]
    fn test_retry_delays() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("https://a.com/x/slide.JPG?sig=1"), ".jpg");
        assert_eq!(extension_for("https://a.com/x/slide"), "");
        assert_eq!(extension_for("not a url"), "");
    }

    #[tokio::test]
    async fn test_validate_image() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ok.jpg"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/jpeg"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/page.html"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone.jpg"))
            .respond_with(ResponseTemplate::new(404).insert_header("content-type", "image/jpeg"))
            .mount(&server)
            .await;

        let fetcher = fast_fetcher();
        assert!(fetcher.validate_image(&format!("{}/ok.jpg", server.uri())).await);
        assert!(!fetcher.validate_image(&format!("{}/page.html", server.uri())).await);
        assert!(!fetcher.validate_image(&format!("{}/gone.jpg", server.uri())).await);
        assert!(!fetcher.validate_image("http://127.0.0.1:1/none.jpg").await);
    }

    #[tokio::test]
    async fn test_validate_falls_back_to_get() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(image_response())
            .mount(&server)
            .await;

        let fetcher = fast_fetcher();
        assert!(fetcher.validate_image(&format!("{}/a.png", server.uri())).await);
    }

    #[tokio::test]
    async fn test_filter_valid_keeps_order() {
        let server = MockServer::start().await;
        for name in ["/1.jpg", "/3.jpg", "/4.jpg"] {
            Mock::given(method("HEAD"))
                .and(path(name))
                .respond_with(
                    ResponseTemplate::new(200).insert_header("content-type", "image/png"),
                )
                .mount(&server)
                .await;
        }
        Mock::given(method("HEAD"))
            .and(path("/2.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let urls: Vec<String> = (1..=4)
            .map(|i| format!("{}/{}.jpg", server.uri(), i))
            .collect();
        let valid = fast_fetcher().filter_valid(&urls, 3).await;
        assert_eq!(valid, vec![urls[0].clone(), urls[2].clone(), urls[3].clone()]);
    }

    #[tokio::test]
    async fn test_fetch_succeeds_on_third_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slide.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slide.jpg"))
            .respond_with(image_response())
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetched = fast_fetcher()
            .fetch(&format!("{}/slide.jpg", server.uri()), dir.path())
            .await
            .unwrap();

        assert_eq!(fetched.extension().unwrap(), "jpg");
        assert_eq!(std::fs::read(&fetched).unwrap().len(), 4);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_exhausts_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = fast_fetcher()
            .fetch(&format!("{}/slide.jpg", server.uri()), dir.path())
            .await;

        assert!(matches!(
            result,
            Err(MediaError::FetchFailed { attempts: 3, .. })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_all_preserves_order() {
        let server = MockServer::start().await;
        for i in 0..4u8 {
            Mock::given(method("GET"))
                .and(path(format!("/{}.png", i)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_delay(Duration::from_millis(40 - 10 * i as u64))
                        .set_body_bytes(vec![i; (i + 1) as usize]),
                )
                .mount(&server)
                .await;
        }

        let urls: Vec<String> = (0..4).map(|i| format!("{}/{}.png", server.uri(), i)).collect();
        let dir = tempfile::tempdir().unwrap();

        // Worker tasks run the fetch on a spawned, boxed `Send` future
        let fetcher = Arc::new(fast_fetcher());
        let target = dir.path().to_path_buf();
        let paths = tokio::spawn(async move { fetcher.fetch_all(&urls, &target, 4).await })
            .await
            .unwrap()
            .unwrap();

        let sizes: Vec<usize> = paths
            .iter()
            .map(|p| std::fs::read(p).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_fetch_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/audio/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"tracks":[{"url":"https://cdn/a.mp3","length":42.5,"type":"loop"}]}"#,
            ))
            .mount(&server)
            .await;

        let catalog = fast_fetcher()
            .fetch_catalog(&format!("{}/audio/index.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(catalog.tracks.len(), 1);
        assert_eq!(catalog.tracks[0].length, 42.5);
    }

    #[tokio::test]
    async fn test_fetch_json_malformed_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .expect(1)
            .mount(&server)
            .await;

        let result: MediaResult<AudioCatalog> = fast_fetcher()
            .fetch_json(&format!("{}/index.json", server.uri()))
            .await;
        assert!(matches!(result, Err(MediaError::JsonParse(_))));
    }
}

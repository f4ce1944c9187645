//! Firestore REST API client.
//!
//! - Token caching with refresh margin and one re-auth on an expired token
//! - HTTP client tuning (pooling, timeouts)
//! - Emulator support through `FIRESTORE_EMULATOR_HOST`
//! - Observability (tracing spans, metrics)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::RetryConfig;
use crate::token_cache::{AccessTokens, StaticToken, TokenCache};
use crate::types::{CommitRequest, CommitResponse, Document, Precondition, Value, Write};

const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Collection holding job records
    pub jobs_collection: String,
    /// Emulator `host:port`; requests go there unauthenticated when set
    pub emulator_host: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::ConfigError(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore".into(),
                )
            })?;

        if project_id.trim().is_empty() {
            return Err(FirestoreError::ConfigError(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty".into(),
            ));
        }

        let secs = |name: &str, fallback: u64| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(fallback))
        };

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            jobs_collection: std::env::var("FIRESTORE_JOBS_COLLECTION")
                .ok()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "jobs".to_string()),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST")
                .ok()
                .filter(|h| !h.trim().is_empty()),
            timeout: secs("FIRESTORE_TIMEOUT_SECS", 30),
            connect_timeout: secs("FIRESTORE_CONNECT_TIMEOUT_SECS", 5),
            retry: RetryConfig::from_env(),
        })
    }
}

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    tokens: Arc<dyn AccessTokens>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        match config.emulator_host.clone() {
            Some(host) => {
                debug!("Using Firestore emulator at {}", host);
                let endpoint = format!("http://{}", host);
                Self::with_endpoint(config, &endpoint, Arc::new(StaticToken("owner".into())))
            }
            None => {
                let auth = Self::create_auth_provider()?;
                Self::with_endpoint(
                    config,
                    FIRESTORE_ENDPOINT,
                    Arc::new(TokenCache::new(auth)),
                )
            }
        }
    }

    /// Create a client against an explicit endpoint and token source.
    pub fn with_endpoint(
        config: FirestoreConfig,
        endpoint: &str,
        tokens: Arc<dyn AccessTokens>,
    ) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("reel-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            endpoint.trim_end_matches('/'),
            config.project_id,
            config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            tokens,
        })
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        Self::new(config).await
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    /// Full resource name used inside commit writes.
    pub fn document_name(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}/{}",
            self.config.project_id, self.config.database_id, collection, doc_id
        )
    }

    /// Send a request, re-authenticating once if the token has expired.
    async fn send<F>(&self, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.tokens.token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(401, body));
        }

        self.tokens.invalidate().await;
        let token = self.tokens.token().await?;
        Ok(build(&token).send().await?)
    }

    /// Get a document, `None` when it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            let response = self
                .send(|token| self.http.get(&url).bearer_auth(token))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(Some(response.json().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document with a caller-chosen ID.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send(|token| self.http.post(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Patch the masked fields of a document.
    ///
    /// Fields named in `mask` but absent from `fields` are deleted. A failed
    /// precondition surfaces as [`FirestoreError::PreconditionFailed`].
    pub async fn patch_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        mask: &[&str],
        precondition: Option<&Precondition>,
    ) -> FirestoreResult<Document> {
        let mut params: Vec<String> = mask
            .iter()
            .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f)))
            .collect();
        if let Some(pre) = precondition {
            if let Some(exists) = pre.exists {
                params.push(format!("currentDocument.exists={}", exists));
            }
            if let Some(ts) = &pre.update_time {
                params.push(format!(
                    "currentDocument.updateTime={}",
                    urlencoding::encode(ts)
                ));
            }
        }

        let mut url = self.document_path(collection, doc_id);
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }
        let body = Document::new(fields);

        self.execute_request("patch_document", collection, Some(doc_id), async {
            let response = self
                .send(|token| self.http.patch(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                StatusCode::NOT_FOUND => Err(FirestoreError::not_found(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Apply writes atomically.
    pub async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse> {
        if writes.is_empty() {
            return Err(FirestoreError::request_failed("Commit without writes"));
        }

        let url = format!("{}:commit", self.base_url);
        let request = CommitRequest { writes };

        self.execute_request("commit", "commit", None, async {
            let response = self
                .send(|token| self.http.post(&url).bearer_auth(token).json(&request))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Execute with retry.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, operation, op).await
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = if let Some(id) = doc_id {
            info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id)
        } else {
            info_span!("firestore_request", operation = %operation, collection = %collection)
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(
        status: StatusCode,
        url: &str,
        response: Response,
    ) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::ToFirestoreValue;
    use serde_json::json;
    use serial_test::serial;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const DOCS: &str = "/v1/projects/test-project/databases/test-db/documents";

    pub(crate) fn test_config() -> FirestoreConfig {
        FirestoreConfig {
            project_id: "test-project".to_string(),
            database_id: "test-db".to_string(),
            jobs_collection: "jobs".to_string(),
            emulator_host: None,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
        }
    }

    pub(crate) fn test_client(server: &MockServer) -> FirestoreClient {
        FirestoreClient::with_endpoint(
            test_config(),
            &server.uri(),
            Arc::new(StaticToken("test-token".into())),
        )
        .unwrap()
    }

    #[test]
    #[serial]
    fn test_config_from_env_validates_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        assert!(matches!(
            FirestoreConfig::from_env(),
            Err(FirestoreError::ConfigError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_default_values() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("FIRESTORE_JOBS_COLLECTION");
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");

        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.database_id, "(default)");
        assert_eq!(config.jobs_collection, "jobs");
        assert_eq!(config.emulator_host, None);

        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    fn test_document_name() {
        let client = FirestoreClient::with_endpoint(
            test_config(),
            "http://localhost:8080",
            Arc::new(StaticToken("t".into())),
        )
        .unwrap();
        assert_eq!(
            client.document_name("jobs", "j1"),
            "projects/test-project/databases/test-db/documents/jobs/j1"
        );
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/jobs/missing", DOCS)))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server);
        assert!(client.get_document("jobs", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/jobs/j1", DOCS)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/databases/test-db/documents/jobs/j1",
                "fields": {"status": {"stringValue": "processing"}},
                "updateTime": "2026-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let doc = test_client(&server)
            .get_document("jobs", "j1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.get::<String>("status").as_deref(), Some("processing"));
        assert_eq!(doc.update_time.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/jobs", DOCS)))
            .and(query_param("documentId", "j1"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .create_document("jobs", "j1", HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FirestoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_patch_sends_mask_and_precondition() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/jobs/j1", DOCS)))
            .and(query_param("updateMask.fieldPaths", "status"))
            .and(query_param("currentDocument.updateTime", "2026-01-01T00:00:00Z"))
            .and(body_partial_json(json!({
                "fields": {"status": {"stringValue": "joining"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fields": {"status": {"stringValue": "joining"}},
                "updateTime": "2026-01-01T00:00:01Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fields = HashMap::from([("status".to_string(), "joining".to_firestore_value())]);
        let doc = test_client(&server)
            .patch_document(
                "jobs",
                "j1",
                fields,
                &["status"],
                Some(&Precondition::updated_at("2026-01-01T00:00:00Z")),
            )
            .await
            .unwrap();
        assert_eq!(doc.update_time.as_deref(), Some("2026-01-01T00:00:01Z"));
    }

    #[tokio::test]
    async fn test_patch_stale_precondition() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/jobs/j1", DOCS)))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "stale", "status": "FAILED_PRECONDITION"}
            })))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .patch_document(
                "jobs",
                "j1",
                HashMap::new(),
                &["status"],
                Some(&Precondition::updated_at("old")),
            )
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
    }

    #[tokio::test]
    async fn test_expired_token_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/jobs/j1", DOCS)))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": 401, "status": "UNAUTHENTICATED"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/jobs/j1", DOCS)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fields": {}})))
            .mount(&server)
            .await;

        let doc = test_client(&server).get_document("jobs", "j1").await.unwrap();
        assert!(doc.is_some());
    }

    #[tokio::test]
    async fn test_commit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:commit", DOCS)))
            .and(body_partial_json(json!({
                "writes": [{"currentDocument": {"exists": true}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "writeResults": [{"updateTime": "2026-01-01T00:00:02Z"}],
                "commitTime": "2026-01-01T00:00:02Z"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let write = Write {
            update: Some(Document::named(client.document_name("jobs", "j1"), HashMap::new())),
            current_document: Some(Precondition::exists()),
            ..Default::default()
        };
        let response = client.commit(vec![write]).await.unwrap();
        assert_eq!(response.write_results.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_requires_writes() {
        let server = MockServer::start().await;
        assert!(test_client(&server).commit(vec![]).await.is_err());
    }
}

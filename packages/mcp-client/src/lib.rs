//! Pure REST client for the Cortex MCP chunk service.
//!
//! The service exposes its tools as JSON endpoints under a common base URL:
//!
//! - `POST {base}/query_collection` retrieves a draft answer plus candidate chunks
//! - `POST {base}/verify_chunk` resolves a chunk id against the chunk store
//!
//! The client owns transport concerns only: bearer auth, per-call timeouts and
//! retries of transient failures. It has no grounding logic.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_client::{McpClient, QueryCollectionRequest};
//!
//! let client = McpClient::new("http://localhost:9000/mcp").with_api_key(api_key);
//!
//! let response = client.query_collection(&QueryCollectionRequest {
//!     collection_id: 1,
//!     question: "What is attention?".into(),
//!     max_sources: 5,
//! }).await?;
//!
//! let chunk = client.verify_chunk(response.citations[0].chunk_id.unwrap()).await?;
//! ```

pub mod error;
pub mod retry;
pub mod types;

pub use error::{McpError, Result};
pub use retry::RetryPolicy;
pub use types::*;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default MCP base URL when `CORTEX_MCP_URL` is not set.
pub const DEFAULT_MCP_URL: &str = "http://localhost:9000/mcp";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tool name for collection queries.
pub const QUERY_COLLECTION: &str = "query_collection";

/// Tool name for chunk verification.
pub const VERIFY_CHUNK: &str = "verify_chunk";

/// MCP REST client.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct McpClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl McpClient {
    /// Create a new client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Send `Authorization: Bearer <key>` with every call.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set a custom HTTP client.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Call an MCP tool via HTTP POST.
    ///
    /// Transient failures (configured statuses and connection errors) are
    /// retried with exponential backoff. Timeouts are not retried.
    pub async fn call_tool<P, R>(&self, tool: &str, payload: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, tool);
        let mut retries = 0;

        loop {
            match self.send_once(tool, &url, payload).await {
                Ok(value) => return Ok(value),
                Err(e) if retries < self.retry.max_retries && self.is_transient(&e) => {
                    retries += 1;
                    let delay = self.retry.delay_for(retries);
                    warn!(
                        tool = %tool,
                        error = %e,
                        retry = retries,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "MCP call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(tool = %tool, error = %e, attempts = retries + 1, "MCP call failed");
                    return Err(e);
                }
            }
        }
    }

    /// Query a collection for a draft answer and candidate chunks.
    pub async fn query_collection(
        &self,
        request: &QueryCollectionRequest,
    ) -> Result<QueryCollectionResponse> {
        self.call_tool(QUERY_COLLECTION, request).await
    }

    /// Resolve a chunk id against the chunk store.
    pub async fn verify_chunk(&self, chunk_id: i64) -> Result<ChunkRecord> {
        self.call_tool(VERIFY_CHUNK, &VerifyChunkRequest { chunk_id })
            .await
    }

    async fn send_once<P, R>(&self, tool: &str, url: &str, payload: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let start = std::time::Instant::now();

        let mut request = self
            .http_client
            .post(url)
            .timeout(self.timeout)
            .json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.transport_error(tool, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status {
                tool: tool.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(tool, e))?;

        let value = serde_json::from_slice(&bytes)
            .map_err(|e| McpError::Parse(format!("MCP tool '{}' returned invalid JSON: {}", tool, e)))?;

        debug!(
            tool = %tool,
            status = status.as_u16(),
            bytes = bytes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "MCP call completed"
        );

        Ok(value)
    }

    fn transport_error(&self, tool: &str, e: reqwest::Error) -> McpError {
        if e.is_timeout() {
            McpError::Timeout {
                tool: tool.to_string(),
            }
        } else {
            McpError::Network(format!("MCP tool '{}' unreachable: {}", tool, e))
        }
    }

    fn is_transient(&self, error: &McpError) -> bool {
        match error {
            McpError::Status { status, .. } => self.retry.should_retry_status(*status),
            McpError::Network(_) => true,
            _ => false,
        }
    }
}

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use habitica_core::auth::credential_fingerprint;
use reqwest::Method;
use serde_json::Value;

/// Failure raised while talking to the Habitica API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// The API answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("{0}")]
    Transport(String),
    /// The response arrived but its body could not be read.
    #[error("{0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Authenticated access to the upstream REST API.
///
/// `path` is relative to the configured API base and may carry a query
/// string. On success the unwrapped `data` payload is returned.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, UpstreamError>;
}

/// Builds an [`UpstreamClient`] bound to one caller's credentials.
pub trait UpstreamConnector: Send + Sync {
    fn connect(&self, credentials: Credentials) -> Arc<dyn UpstreamClient>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub api_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub client_id: String,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://habitica.com/api/v3".to_string(),
            client_id: "habitica-mcp-gateway".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Creates [`HabiticaClient`]s that share one connection pool.
#[derive(Clone)]
pub struct HabiticaConnector {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl HabiticaConnector {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }
}

impl UpstreamConnector for HabiticaConnector {
    fn connect(&self, credentials: Credentials) -> Arc<dyn UpstreamClient> {
        Arc::new(HabiticaClient {
            http: self.http.clone(),
            base_url: self.config.base_url.trim_end_matches('/').to_string(),
            client_id: self.config.client_id.clone(),
            credentials,
        })
    }
}

pub struct HabiticaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    credentials: Credentials,
}

#[async_trait]
impl UpstreamClient for HabiticaClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("x-api-user", &self.credentials.user_id)
            .header("x-api-key", &self.credentials.api_token)
            .header("x-client", &self.client_id);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(
                method = %method,
                path,
                credential = %credential_fingerprint(&self.credentials.api_token),
                error = %e,
                "habitica request failed"
            );
            UpstreamError::Transport(format!("Failed to reach Habitica API: {e}"))
        })?;

        let succeeded = response.status().is_success();
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| {
            UpstreamError::Decode(format!("Failed to read Habitica API response body: {e}"))
        })?;
        let body = parse_response_body(&bytes);

        if !succeeded || body.get("success") == Some(&Value::Bool(false)) {
            let message = upstream_message(&body)
                .unwrap_or_else(|| format!("Request failed with status code {status}"));
            tracing::warn!(
                method = %method,
                path,
                status,
                credential = %credential_fingerprint(&self.credentials.api_token),
                message = %message,
                "habitica request rejected"
            );
            return Err(UpstreamError::Status { status, message });
        }

        Ok(unwrap_data(body))
    }
}

fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

/// Habitica reports failures as `{success: false, error, message}`.
fn upstream_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToOwned::to_owned)
}

fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

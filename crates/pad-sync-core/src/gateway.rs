//! Thin client for the remote pad backend's HTTP API.
//!
//! The backend speaks the Etherpad-style API: every call returns a JSON
//! envelope `{"code": int, "message": string, "data": ...}` with HTTP 200,
//! and a non-zero `code` signals rejection (duplicate pad, unknown pad,
//! bad API key). Transport failures are surfaced separately so the caller
//! can distinguish "server said no" from "server not reachable".

use crate::config::PadConfig;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("pad server unreachable: {0}")]
    Unreachable(String),

    #[error("pad server rejected the request: {0}")]
    Rejected(String),

    #[error("malformed response from pad server: {0}")]
    BadResponse(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Remote pad operations. Each call is independently fallible and holds no
/// state between calls.
#[async_trait]
pub trait PadGateway: Send + Sync {
    /// Create a new pad seeded with `initial_text`. The backend decides
    /// whether the ID is acceptable (it may already exist).
    async fn create_pad(&self, pad_id: &str, initial_text: &str) -> Result<()>;

    /// Fetch the pad's current content rendered as HTML.
    async fn fetch_rendered(&self, pad_id: &str) -> Result<String>;
}

/// Envelope wrapping every pad API response.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: i64,
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// HTTP client for one pad server. Construct fresh from the current
/// configuration for each operation; holding one across config changes
/// would pin the old host/port/key.
pub struct EtherpadClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EtherpadClient {
    pub fn new(config: &PadConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
        }
    }

    async fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<serde_json::Value> {
        let url = format!("{}/api/1/{}", self.base_url, endpoint);
        debug!(endpoint, "calling pad server");

        let mut query: Vec<(&str, &str)> = vec![("apikey", self.api_key.as_str())];
        query.extend_from_slice(params);

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!("HTTP {}", status)));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::BadResponse(e.to_string()))?;

        if envelope.code != 0 {
            return Err(GatewayError::Rejected(envelope.message));
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl PadGateway for EtherpadClient {
    async fn create_pad(&self, pad_id: &str, initial_text: &str) -> Result<()> {
        self.call("createPad", &[("padID", pad_id), ("text", initial_text)])
            .await?;
        Ok(())
    }

    async fn fetch_rendered(&self, pad_id: &str) -> Result<String> {
        let data = self.call("getHTML", &[("padID", pad_id)]).await?;
        data.get("html")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| GatewayError::BadResponse("missing html field".to_string()))
    }
}

/// Public address of a pad for viewing in a browser. Spaces in the pad ID
/// are replaced with underscores, matching the server's URL scheme.
pub fn pad_url(config: &PadConfig, pad_id: &str) -> String {
    format!("{}/p/{}", config.base_url(), pad_id.replace(' ', "_"))
}

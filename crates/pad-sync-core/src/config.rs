//! Connection configuration for the remote pad backend.

use serde::{Deserialize, Serialize};

/// Connection parameters for the pad server. Supplied per-call; nothing in
/// this crate holds connection state across operations, so edits to the
/// persisted settings take effect on the next operation without restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadConfig {
    /// Pad server host name or address.
    pub host: String,
    /// Pad server port.
    pub port: u16,
    /// API key for the pad server's HTTP API. Empty when the server does
    /// not require one.
    pub api_key: String,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9001,
            api_key: String::new(),
        }
    }
}

impl PadConfig {
    /// Base URL of the pad server, e.g. `http://localhost:9001`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_server() {
        let config = PadConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9001);
        assert_eq!(config.api_key, "");
        assert_eq!(config.base_url(), "http://localhost:9001");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: PadConfig = serde_json::from_str(r#"{"host": "pads.local"}"#).unwrap();
        assert_eq!(config.host, "pads.local");
        assert_eq!(config.port, 9001);
    }
}

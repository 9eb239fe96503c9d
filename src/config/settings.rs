use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub shutdown: ShutdownSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// URL path that upgrades to the chat relay; any other path is
    /// rejected without upgrading.
    #[serde(default = "default_ws_path")]
    pub path: String,
    /// Cap on the aggregated handshake-phase request body, in bytes.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSettings {
    /// How long to wait for sessions to drain after clients are told
    /// the server is going away, in seconds.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_drain_timeout_secs() -> u64 {
    10
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_request_bytes() -> usize {
    64 * 1024
}

impl Settings {
    pub fn new() -> Result<Self> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("websocket.path", "/ws")?
            .set_default("websocket.max_request_bytes", 64 * 1024)?
            .set_default("shutdown.drain_timeout_secs", 10)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables: SERVER_HOST, SERVER_PORT,
            // WEBSOCKET_PATH. The "_" separator cannot address multi-word
            // keys (WEBSOCKET_MAX_REQUEST_BYTES would split into four
            // segments); those are file/default-only.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            websocket: WebSocketConfig::default(),
            shutdown: ShutdownSettings::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: default_ws_path(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.websocket.path, "/ws");
        assert_eq!(settings.websocket.max_request_bytes, 64 * 1024);
        assert_eq!(settings.shutdown.drain_timeout_secs, 10);
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings::default();
        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
    }
}

//! Client configuration loaded from the environment at startup.

use secrecy::SecretString;
use tracing::Level;

/// How often a keepalive ping is written to an open interview socket.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

/// Holds all configuration loaded from the environment.
#[derive(Clone)]
pub struct Config {
    pub api_url: String,
    pub ws_url: String,
    pub api_token: SecretString,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `FLOWPREP_API_TOKEN`: Bearer token for the backend. Required.
    /// *   `FLOWPREP_API_URL`: (Optional) Base URL for HTTP endpoints. Defaults to "http://localhost:8000".
    /// *   `FLOWPREP_WS_URL`: (Optional) Base URL for the interview socket. Defaults to "ws://localhost:8000".
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();

        let api_token = std::env::var("FLOWPREP_API_TOKEN")
            .map_err(|_| ConfigError::MissingVar("FLOWPREP_API_TOKEN".to_string()))?;

        let api_url = std::env::var("FLOWPREP_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let ws_url = std::env::var("FLOWPREP_WS_URL")
            .unwrap_or_else(|_| "ws://localhost:8000".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_url,
            ws_url,
            api_token: api_token.into(),
            log_level,
        })
    }
}

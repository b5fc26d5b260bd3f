use secrecy::SecretString;

use crate::transport::consts::DEFAULT_WS_BASE_URL;

pub struct TransportConfig {
    ws_base_url: String,
    bearer_token: Option<SecretString>,
}

pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TransportConfig::new(),
        }
    }

    pub fn with_ws_base_url(mut self, ws_base_url: &str) -> Self {
        self.config.ws_base_url = ws_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_bearer_token(mut self, token: &str) -> Self {
        self.config.bearer_token = Some(SecretString::from(token.to_string()));
        self
    }

    pub fn build(self) -> TransportConfig {
        self.config
    }
}

impl Default for TransportConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self {
            ws_base_url: DEFAULT_WS_BASE_URL.to_string(),
            bearer_token: None,
        }
    }

    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::new()
    }

    pub fn ws_base_url(&self) -> &str {
        &self.ws_base_url
    }

    pub fn bearer_token(&self) -> Option<&SecretString> {
        self.bearer_token.as_ref()
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

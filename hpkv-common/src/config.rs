//! Configuration for HPKV clients
//!
//! Both clients are built from the same validated config. Nothing here reads
//! the environment; the binary does that and passes values in.

use std::time::Duration;

use crate::error::{HpkvError, HpkvResult};

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How the WebSocket connection authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsAuth {
    /// `?apiKey=...` using the configured API key
    ApiKey,
    /// `?token=...` using a token from the token endpoint
    Token(String),
}

/// Validated client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Service
    // -------------------------------------------------------------------------
    /// Base URL of the service, without trailing slash
    base_url: String,

    /// API key sent as `x-api-key` (HTTP) or `apiKey` (WebSocket)
    api_key: String,

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------
    /// Per-request HTTP timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,

    /// How long a WebSocket request may stay pending; `None` waits indefinitely
    pub response_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // WebSocket
    // -------------------------------------------------------------------------
    pub ws_auth: WsAuth,
}

impl ClientConfig {
    /// Create a config with default timeouts
    ///
    /// # Errors
    /// Returns `HpkvError::Config` if either value is blank.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> HpkvResult<Self> {
        Self::builder().base_url(base_url).api_key(api_key).build()
    }

    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    request_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    ws_auth: WsAuth,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            response_timeout: None,
            ws_auth: WsAuth::ApiKey,
        }
    }
}

impl ClientConfigBuilder {
    /// Set the service base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the HTTP request timeout
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the WebSocket response timeout
    pub fn response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Authenticate the WebSocket with a token instead of the API key
    pub fn ws_token(mut self, token: impl Into<String>) -> Self {
        self.ws_auth = WsAuth::Token(token.into());
        self
    }

    pub fn build(self) -> HpkvResult<ClientConfig> {
        let base_url = self.base_url.unwrap_or_default();
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(HpkvError::Config(
                "HPKV base URL not provided. Set HPKV_BASE_URL".to_string(),
            ));
        }

        let api_key = self.api_key.unwrap_or_default();
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(HpkvError::Config(
                "HPKV API key not provided. Set HPKV_API_KEY".to_string(),
            ));
        }

        if let WsAuth::Token(token) = &self.ws_auth {
            if token.trim().is_empty() {
                return Err(HpkvError::Config("WebSocket token is blank".to_string()));
            }
        }

        Ok(ClientConfig {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            request_timeout: self.request_timeout,
            response_timeout: self.response_timeout,
            ws_auth: self.ws_auth,
        })
    }
}

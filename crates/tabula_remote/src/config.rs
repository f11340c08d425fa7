//! Remote backend configuration.

use std::time::Duration;

/// Configuration for connecting to a remote document backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the server, without a trailing slash.
    pub base_url: String,

    /// Value of the `Authorization` header, if any.
    pub auth_token: Option<String>,

    /// Records requested per page when listing.
    pub page_size: u32,

    /// Timeout for a single request.
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            auth_token: None,
            page_size: 200,
            timeout: Duration::from_secs(10),
        }
    }
}

impl RemoteConfig {
    /// Creates a configuration for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().base_url(base_url)
    }

    /// Sets the base URL. A trailing slash is dropped.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Sets the `Authorization` header value.
    #[must_use]
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the page size used when listing. Zero is raised to one.
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

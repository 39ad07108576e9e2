use std::time::Duration;

use url::Url;

use crate::backoff::ReconnectPolicy;
use crate::error::ChannelError;

/// Settings for a channel client.
///
/// The endpoint is derived from the origin of the page hosting the session:
/// same host and port, root path, `wss` when the page itself is served over
/// `https` and `ws` otherwise.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    page_origin: Url,
    reconnect: ReconnectPolicy,
}

impl ChannelConfig {
    pub fn new(page_origin: Url) -> Self {
        Self {
            page_origin,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Parse the hosting page URL
    pub fn from_page_url(page_url: &str) -> Result<Self, ChannelError> {
        Ok(Self::new(Url::parse(page_url)?))
    }

    /// Override the maximum number of reconnect attempts
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect.max_attempts = attempts;
        self
    }

    /// Override the delay before the first reconnect attempt
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect.base_delay = delay;
        self
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect
    }

    pub fn page_origin(&self) -> &Url {
        &self.page_origin
    }

    /// WebSocket endpoint for this page
    pub fn endpoint(&self) -> Result<Url, ChannelError> {
        let scheme = if self.page_origin.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };

        let host = self.page_origin.host_str().ok_or_else(|| {
            ChannelError::ConfigError(format!("page URL has no host: {}", self.page_origin))
        })?;

        let url = match self.page_origin.port() {
            Some(port) => format!("{}://{}:{}/", scheme, host, port),
            None => format!("{}://{}/", scheme, host),
        };

        Ok(Url::parse(&url)?)
    }
}

//! Client configuration.

use std::time::Duration;

/// Maximum number of records the server will return per RetrieveMultiple page.
pub const MAX_CRM_RECORDS: u32 = 5000;

/// Configuration for the SOAP transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout. The server can take minutes on large metadata calls.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Maximum records requested per RetrieveMultiple page.
    pub max_records_per_page: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            user_agent: crate::USER_AGENT.to_string(),
            max_records_per_page: MAX_CRM_RECORDS,
        }
    }
}

impl ClientConfig {
    /// Create a new client config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set custom User-Agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum records requested per page.
    pub fn with_max_records(mut self, max: u32) -> Self {
        self.config.max_records_per_page = max;
        self
    }

    /// Build the client configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

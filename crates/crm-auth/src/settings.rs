//! Connection settings.

use std::fmt;
use std::time::Duration;

use crm_soap_client::{Error, Result};

/// Default lifetime for cached entity schema data: eight hours.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(28800);

/// How tokens are obtained from the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// On-premises deployment authenticating through an ADFS server.
    Federation,
    /// Online deployment authenticating through the online federation
    /// endpoint.
    OnlineFederation,
}

/// Everything needed to reach and authenticate against a CRM deployment.
#[derive(Clone)]
pub struct Settings {
    /// Discovery service URL, e.g.
    /// `https://dev.crm.example.com/XRMServices/2011/Discovery.svc`.
    pub discovery_url: String,
    /// Organization service URL, e.g.
    /// `https://org.crm.example.com/XRMServices/2011/Organization.svc`.
    pub organization_url: String,
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Authentication mode of the deployment.
    pub auth_mode: AuthMode,
    /// Lifetime for cached entity schema data.
    pub cache_ttl: Duration,
}

impl Settings {
    pub fn new(
        organization_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        auth_mode: AuthMode,
    ) -> Self {
        Self {
            discovery_url: String::new(),
            organization_url: organization_url.into(),
            username: username.into(),
            password: password.into(),
            auth_mode,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_discovery_url(mut self, discovery_url: impl Into<String>) -> Self {
        self.discovery_url = discovery_url.into();
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Check that the settings are usable before any network call.
    ///
    /// Username, password, and organization URL are always required; the
    /// discovery URL only for federated deployments, where the discovery
    /// WSDL carries the ADFS issuer metadata.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::state("Username is not set"));
        }
        if self.password.is_empty() {
            return Err(Error::state("Password is not set"));
        }
        if self.organization_url.is_empty() {
            return Err(Error::state("Organization service URL is not set"));
        }
        if self.auth_mode == AuthMode::Federation && self.discovery_url.is_empty() {
            return Err(Error::state(
                "Discovery service URL is required for Federation authentication",
            ));
        }
        Ok(())
    }
}

// Settings end up in debug logs; never print the password.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("discovery_url", &self.discovery_url)
            .field("organization_url", &self.organization_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("auth_mode", &self.auth_mode)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new(
            "https://org.crm.example.com/XRMServices/2011/Organization.svc",
            "user@example.com",
            "hunter2",
            AuthMode::OnlineFederation,
        )
    }

    #[test]
    fn test_debug_redacts_password() {
        let out = format!("{:?}", settings());
        assert!(!out.contains("hunter2"));
        assert!(out.contains("user@example.com"));
    }

    #[test]
    fn test_validate_accepts_online_without_discovery_url() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_discovery_url_for_federation() {
        let mut s = settings();
        s.auth_mode = AuthMode::Federation;
        assert!(s.validate().is_err());

        let s = s.with_discovery_url("https://dev.crm.example.com/XRMServices/2011/Discovery.svc");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let mut s = settings();
        s.password = String::new();
        assert!(s.validate().is_err());

        let mut s = settings();
        s.username = String::new();
        assert!(s.validate().is_err());
    }
}

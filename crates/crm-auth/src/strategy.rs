//! Token acquisition strategies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};
use xmltree::Element;

use crate::rst::{federation_rst, online_federation_rst, parse_rstr};
use crate::settings::{AuthMode, Settings};
use crate::token::SecurityToken;
use crm_soap_client::{ClientConfig, Error, Result, SoapTransport};
use crm_soap_wsdl::{
    federated_issuer_address, find_security_policy, flatten, online_issuer_address, trust_address,
    HttpWsdlFetcher, WsdlFetcher, TRUST_13_USERNAME_PORT,
};

const SECURITY_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// The two token-protected services of a CRM deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Discovery,
    Organization,
}

impl Service {
    /// Service name as it appears in the WSDL `service` definition.
    fn wsdl_service_name(self) -> &'static str {
        match self {
            Service::Discovery => "DiscoveryService",
            Service::Organization => "OrganizationService",
        }
    }

    fn url(self, settings: &Settings) -> &str {
        match self {
            Service::Discovery => &settings.discovery_url,
            Service::Organization => &settings.organization_url,
        }
    }
}

/// Obtains and caches security tokens for the discovery and organization
/// services.
///
/// The issuer endpoint is resolved once per service from the service WSDL's
/// security policy and cached, as is the token itself. Both caches live
/// behind plain mutexes that are never held across an await; all network
/// traffic is sequential.
#[derive(Debug)]
pub struct AuthStrategy {
    settings: Arc<Settings>,
    transport: SoapTransport,
    fetcher: HttpWsdlFetcher,
    issuers: Mutex<HashMap<Service, String>>,
    tokens: Mutex<HashMap<Service, SecurityToken>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AuthStrategy {
    /// Build a strategy for the deployment described by `settings`.
    pub fn new(settings: Arc<Settings>, config: &ClientConfig) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            transport: SoapTransport::new(config)?,
            fetcher: HttpWsdlFetcher::new(config)?,
            issuers: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
        })
    }

    /// Token for the discovery service, from cache when available.
    pub async fn discovery_token(&self) -> Result<SecurityToken> {
        self.token(Service::Discovery).await
    }

    /// Token for the organization service, from cache when available.
    pub async fn organization_token(&self) -> Result<SecurityToken> {
        self.token(Service::Organization).await
    }

    /// Pre-populate the token cache, skipping the issuer exchange.
    ///
    /// Used to resume a session with a token obtained earlier; the server
    /// rejects it with a fault if it has expired.
    pub fn seed_token(&self, service: Service, token: SecurityToken) {
        lock(&self.tokens).insert(service, token);
    }

    /// Wrap a token in the WS-Security header carried by every service call.
    pub fn security_header(&self, token: &SecurityToken) -> String {
        format!(
            "<o:Security s:mustUnderstand=\"1\" xmlns:o=\"{SECURITY_NS}\">{}</o:Security>",
            token.as_xml()
        )
    }

    async fn token(&self, service: Service) -> Result<SecurityToken> {
        if let Some(token) = lock(&self.tokens).get(&service).cloned() {
            return Ok(token);
        }

        let issuer = self.issuer(service).await?;
        let service_url = service.url(&self.settings);
        let rst = match self.settings.auth_mode {
            AuthMode::Federation => federation_rst(
                &issuer,
                service_url,
                &self.settings.username,
                &self.settings.password,
            ),
            AuthMode::OnlineFederation => online_federation_rst(
                &issuer,
                service_url,
                &self.settings.username,
                &self.settings.password,
            ),
        };

        debug!(?service, issuer, "requesting security token");
        let (status, body) = self.transport.post(&issuer, rst).await?;
        let token = parse_rstr(status, body)?;
        info!(?service, "security token issued");

        lock(&self.tokens).insert(service, token.clone());
        Ok(token)
    }

    /// Resolve (and cache) the token issuer endpoint for a service.
    async fn issuer(&self, service: Service) -> Result<String> {
        if let Some(issuer) = lock(&self.issuers).get(&service).cloned() {
            return Ok(issuer);
        }

        let service_url = service.url(&self.settings);
        if service_url.is_empty() {
            return Err(Error::state(format!(
                "No URL configured for the {} service",
                service.wsdl_service_name()
            )));
        }

        let mut wsdl = self.fetch_flattened(&format!("{service_url}?wsdl")).await?;
        let issuer = match self.settings.auth_mode {
            AuthMode::OnlineFederation => {
                let policy = find_security_policy(&wsdl, service.wsdl_service_name())?;
                online_issuer_address(policy)?
            }
            AuthMode::Federation => {
                // The policy points at the ADFS metadata document; the
                // actual RequestSecurityToken endpoint is a port inside it.
                let metadata_url = {
                    let policy = find_security_policy(&wsdl, service.wsdl_service_name())?;
                    federated_issuer_address(policy)?
                };
                wsdl = self.fetch_flattened(&metadata_url).await?;
                trust_address(&wsdl, TRUST_13_USERNAME_PORT)?
            }
        };
        debug!(?service, issuer, "resolved token issuer");

        lock(&self.issuers).insert(service, issuer.clone());
        Ok(issuer)
    }

    async fn fetch_flattened(&self, url: &str) -> Result<Element> {
        let text = self.fetcher.fetch(url).await?;
        let mut doc = Element::parse(text.as_bytes()).map_err(Error::from)?;
        flatten(&mut doc, &self.fetcher).await?;
        Ok(doc)
    }
}

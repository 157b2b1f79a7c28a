//! Fetching WSDL documents.

use std::future::Future;

use crm_soap_client::{ClientConfig, Error, ErrorKind, Result};
use tracing::debug;

/// Source of WSDL documents.
///
/// The flattener resolves import locations through this trait so that tests
/// can supply documents from memory instead of the network.
pub trait WsdlFetcher: Send + Sync {
    /// Fetch the document at `url` as an XML string.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Fetches WSDL documents over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpWsdlFetcher {
    http_client: reqwest::Client,
}

impl HttpWsdlFetcher {
    /// Build a fetcher from the given configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;
        Ok(Self { http_client })
    }
}

impl WsdlFetcher for HttpWsdlFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "fetching WSDL");
        let response = self.http_client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(Error::new(ErrorKind::Transport { status, body }));
        }
        Ok(body)
    }
}

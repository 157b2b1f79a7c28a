//! SOAP transport: HTTPS POST plus response validation and fault detection.

use tracing::{debug, trace};
use xmltree::Element;

use crate::error::{Error, ErrorKind, Result};
use crate::xml;
use crate::ClientConfig;

/// WS-Addressing actions the server uses to signal a SOAP fault.
pub const SOAP_FAULT_ACTIONS: [&str; 8] = [
    "http://www.w3.org/2005/08/addressing/soap/fault",
    "http://schemas.microsoft.com/net/2005/12/windowscommunicationfoundation/dispatcher/fault",
    "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/ExecuteOrganizationServiceFaultFault",
    "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/CreateOrganizationServiceFaultFault",
    "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/RetrieveOrganizationServiceFaultFault",
    "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/UpdateOrganizationServiceFaultFault",
    "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/DeleteOrganizationServiceFaultFault",
    "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/RetrieveMultipleOrganizationServiceFaultFault",
];

/// Blocking-style SOAP transport. Every call is one sequential request with
/// no internal parallelism and no retry.
#[derive(Debug, Clone)]
pub struct SoapTransport {
    http_client: reqwest::Client,
}

impl SoapTransport {
    /// Build a transport from the given configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;
        Ok(Self { http_client })
    }

    /// Build a transport around an existing HTTP client.
    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// POST a body to a URL with the SOAP 1.2 content type. Returns the HTTP
    /// status and raw response body without any validation.
    pub async fn post(&self, url: &str, body: String) -> Result<(u16, String)> {
        trace!(url, bytes = body.len(), "posting SOAP request");
        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/soap+xml; charset=UTF-8")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok((status, text))
    }

    /// Send a SOAP envelope and return the validated raw response XML.
    ///
    /// The response must be a SOAP envelope with a header carrying a
    /// WS-Addressing Action; a fault action is raised as [`ErrorKind::Fault`]
    /// and anything that is not a usable envelope as [`ErrorKind::Transport`].
    pub async fn send(&self, url: &str, envelope: String) -> Result<String> {
        let (status, body) = self.post(url, envelope).await?;
        validate_soap_response(status, body)
    }
}

/// Validate a raw SOAP response, extracting any server fault.
///
/// Returns the raw XML unchanged when the envelope is well formed and the
/// action is not a fault action.
pub fn validate_soap_response(status: u16, body: String) -> Result<String> {
    let envelope = match Element::parse(body.as_bytes()) {
        Ok(el) if el.name == "Envelope" => el,
        _ => {
            return Err(Error::new(ErrorKind::Transport { status, body }));
        }
    };

    let Some(header) = envelope.get_child("Header") else {
        return Err(Error::new(ErrorKind::Transport { status, body }));
    };
    let Some(action) = header.get_child("Action").map(xml::text_of) else {
        return Err(Error::new(ErrorKind::Transport { status, body }));
    };
    debug!(action, "SOAP action in response");

    if SOAP_FAULT_ACTIONS.contains(&action.as_str()) {
        return Err(extract_fault(&envelope));
    }

    Ok(body)
}

/// Extract Code/Value and Reason/Text from a fault envelope.
fn extract_fault(envelope: &Element) -> Error {
    let fault = envelope
        .get_child("Body")
        .and_then(|b| b.get_child("Fault"));

    let Some(fault) = fault else {
        return Error::structural("Could not find Fault node in fault response");
    };

    let code = fault
        .get_child("Code")
        .and_then(|c| c.get_child("Value"))
        .map(|v| xml::strip_ns(xml::text_of(v).trim()).to_string())
        .unwrap_or_default();
    let reason = fault
        .get_child("Reason")
        .and_then(|r| r.get_child("Text"))
        .map(|t| xml::text_of(t).trim().to_string())
        .unwrap_or_default();

    Error::new(ErrorKind::Fault { code, reason })
}

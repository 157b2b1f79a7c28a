//! # crm-soap-api
//!
//! A SOAP client library for Dynamics-style CRM deployments.
//!
//! The library discovers everything it needs from the deployment's WSDL:
//! the security policy, the token-issuing endpoint, and the trust binding.
//! Callers supply a service URL and credentials and get typed access to the
//! organization and discovery services.
//!
//! ## Security
//!
//! - Passwords and security tokens are redacted in Debug output
//! - Credentials are XML-escaped before they enter any envelope
//! - Tracing never logs credential parameters
//!
//! ## Crates
//!
//! - **crm-soap-client** - SOAP transport, fault detection, shared error type
//! - **crm-soap-wsdl** - WSDL fetching, import flattening, policy and endpoint discovery
//! - **crm-soap-auth** - WS-Trust authentication for Federation and OnlineFederation
//! - **crm-soap-org** - Organization and discovery service operations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crm_soap_api::{AuthMode, CrmClient, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::new(
//!         "https://org.crm.example.com/XRMServices/2011/Organization.svc",
//!         "user@example.com",
//!         "password",
//!         AuthMode::OnlineFederation,
//!     );
//!     let client = CrmClient::new(settings)?;
//!
//!     let accounts = client
//!         .retrieve_multiple_entities("account", true, None, None, None)
//!         .await?;
//!     for account in &accounts.entities {
//!         if let Some(name) = account.get("name") {
//!             println!("{}", name.display_text());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

// Re-export the member crates for convenient access
#[cfg(feature = "auth")]
pub use crm_soap_auth as auth;
#[cfg(feature = "client")]
pub use crm_soap_client as client;
#[cfg(feature = "org")]
pub use crm_soap_org as org;
#[cfg(feature = "wsdl")]
pub use crm_soap_wsdl as wsdl;

// Re-export commonly used types at the top level
#[cfg(feature = "auth")]
pub use crm_soap_auth::{AuthMode, AuthStrategy, SecurityToken, Settings};
#[cfg(feature = "client")]
pub use crm_soap_client::{ClientConfig, Error, ErrorKind, Result};
#[cfg(feature = "org")]
pub use crm_soap_org::{AttributeValue, CrmClient, Entity, EntityReference, QueryResult};

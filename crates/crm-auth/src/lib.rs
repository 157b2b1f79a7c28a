//! # crm-soap-auth
//!
//! WS-Trust authentication for Dynamics-style CRM services.
//!
//! The CRM server does not accept credentials directly. Instead the client
//! asks a trusted issuer (an ADFS server on premises, the online federation
//! endpoint otherwise) to exchange a username and password for a security
//! token, then embeds that token verbatim in the WS-Security header of every
//! service call.
//!
//! [`AuthStrategy`] drives the whole exchange: it resolves the issuer
//! endpoint from the service WSDL's security policy, posts a
//! `RequestSecurityToken`, and caches the resulting [`SecurityToken`] per
//! service for the lifetime of the client. Token expiry is enforced by the
//! server, not tracked locally; an expired token surfaces as a SOAP fault.

mod rst;
mod settings;
mod strategy;
mod token;

pub use crm_soap_client::{Error, ErrorKind, Result};
pub use rst::{federation_rst, online_federation_rst, parse_rstr};
pub use settings::{AuthMode, Settings};
pub use strategy::{AuthStrategy, Service};
pub use token::SecurityToken;

//! # crm-soap-wsdl
//!
//! WSDL discovery pipeline for Dynamics-style CRM services.
//!
//! The server describes its SOAP endpoints through WSDL documents that are
//! split across many `<import>`ed files. This crate turns them into something
//! usable:
//!
//! - [`flatten`] - recursively merge every import into one definitions tree
//! - [`find_security_policy`] - locate the WS-Policy node bound to a named
//!   service
//! - [`federated_issuer_address`] / [`online_issuer_address`] - walk a
//!   security policy to the token issuer endpoint
//! - [`trust_address`] - find the `RequestSecurityToken` port inside an
//!   authentication (ADFS) WSDL
//!
//! Every lookup fails fast with a structural error naming the missing
//! element; there is no fallback or fuzzy matching.

mod endpoints;
mod fetch;
mod flatten;
mod policy;

pub use crm_soap_client::{Error, ErrorKind, Result};
pub use endpoints::{
    federated_issuer_address, online_issuer_address, trust_address, TRUST_13_USERNAME_PORT,
};
pub use fetch::{HttpWsdlFetcher, WsdlFetcher};
pub use flatten::flatten;
pub use policy::find_security_policy;

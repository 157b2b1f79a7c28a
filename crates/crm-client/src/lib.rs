//! # crm-soap-client
//!
//! Core SOAP transport infrastructure for Dynamics-style CRM services.
//!
//! This crate owns the pieces every other crate in the workspace builds on:
//!
//! - **SoapTransport** - HTTPS POST of SOAP 1.2 envelopes with response
//!   validation and server-fault detection
//! - **ClientConfig** - timeouts, user agent, page-size limits
//! - **Error** - the shared error taxonomy (structural XML errors, transport
//!   errors, protocol faults, caller-state errors)
//! - **xml** - element-tree helpers shared by the WSDL and response parsers
//!
//! There is no automatic retry anywhere in this crate: every failure is
//! surfaced to the caller, which is the sole point of recovery.

mod config;
mod error;
mod transport;
pub mod xml;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use transport::{validate_soap_response, SoapTransport, SOAP_FAULT_ACTIONS};

/// Default User-Agent for all requests.
pub const USER_AGENT: &str = concat!("crm-soap-api/", env!("CARGO_PKG_VERSION"));

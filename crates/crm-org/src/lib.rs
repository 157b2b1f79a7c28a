//! Organization and discovery service operations for Dynamics-style CRM
//! deployments.
//!
//! The entry point is [`CrmClient`]: CRUD on [`Entity`] records, FetchXML
//! queries with transparent paging, named action execution, and entity
//! metadata retrieval with a pluggable [`SchemaCache`].
//!
//! ```no_run
//! use crm_soap_org::{AuthMode, CrmClient, Settings};
//!
//! # async fn run() -> crm_soap_org::Result<()> {
//! let settings = Settings::new(
//!     "https://org.crm.example.com/XRMServices/2011/Organization.svc",
//!     "user@example.com",
//!     "password",
//!     AuthMode::OnlineFederation,
//! );
//! let client = CrmClient::new(settings)?;
//! let accounts = client
//!     .retrieve_multiple_entities("account", true, None, None, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod client;
pub mod entity;
pub mod envelope;
pub mod paging;
pub mod parse;
pub mod requests;
pub mod schema;

pub use attributes::{add_attributes, add_formatted_values, parse_entity_element};
pub use client::CrmClient;
pub use entity::{AliasedValue, AttributeValue, Entity, EntityReference, EMPTY_GUID};
pub use envelope::{actions, build_envelope};
pub use parse::{EntityListing, OrganizationDetail, QueryResult};
pub use requests::EntityFilters;
pub use schema::{
    EntitySchema, FieldSchema, FileSchemaCache, MemorySchemaCache, RelationshipSchema,
    SchemaCache,
};

pub use crm_soap_auth::{AuthMode, AuthStrategy, SecurityToken, Service, Settings};
pub use crm_soap_client::{ClientConfig, Error, ErrorKind, Result};

//! The high-level CRM client.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use xmltree::Element;

use crate::entity::Entity;
use crate::envelope::{actions, build_envelope};
use crate::paging::next_cookie;
use crate::parse::{
    parse_create_response, parse_delete_response, parse_execute_response,
    parse_retrieve_all_entities_response, parse_retrieve_entity_response,
    parse_retrieve_multiple_response, parse_retrieve_organizations_response,
    parse_retrieve_response, parse_update_response, EntityListing, OrganizationDetail,
    QueryResult,
};
use crate::requests::{
    all_attributes_fetch, create_request, delete_request, execute_action_request,
    retrieve_all_entities_request, retrieve_entity_request, retrieve_multiple_request,
    retrieve_organizations_request, retrieve_request, update_request, EntityFilters,
};
use crate::schema::{extract_entity_schema, EntitySchema, MemorySchemaCache, SchemaCache};
use crm_soap_auth::{AuthStrategy, Settings};
use crm_soap_client::{ClientConfig, Error, Result, SoapTransport};

/// Client for one CRM deployment.
///
/// Owns the transport, the authentication strategy, and the schema cache.
/// Every operation is one or more sequential SOAP calls; there is no retry
/// and no request-level parallelism, so the caller decides how failures are
/// handled.
pub struct CrmClient {
    settings: Arc<Settings>,
    config: ClientConfig,
    transport: SoapTransport,
    auth: AuthStrategy,
    schema_cache: Box<dyn SchemaCache>,
}

impl CrmClient {
    /// Build a client with default configuration and an in-memory schema
    /// cache.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_config(settings, ClientConfig::default())
    }

    pub fn with_config(settings: Settings, config: ClientConfig) -> Result<Self> {
        let settings = Arc::new(settings);
        Ok(Self {
            transport: SoapTransport::new(&config)?,
            auth: AuthStrategy::new(Arc::clone(&settings), &config)?,
            schema_cache: Box::new(MemorySchemaCache::new()),
            settings,
            config,
        })
    }

    /// Replace the schema cache, e.g. with a [`crate::FileSchemaCache`].
    pub fn with_schema_cache(mut self, cache: impl SchemaCache + 'static) -> Self {
        self.schema_cache = Box::new(cache);
        self
    }

    /// The authentication strategy, e.g. to seed a previously issued token.
    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create a record. The entity must not have an id yet; on success its
    /// id is set to the one the server assigned.
    pub async fn create(&self, entity: &mut Entity) -> Result<Uuid> {
        if !entity.is_new() {
            return Err(Error::state("Cannot Create an Entity that already exists."));
        }
        let raw = self
            .organization_call(actions::CREATE, &create_request(entity))
            .await?;
        let id = parse_create_response(&raw)?;
        entity.id = id;
        info!(logical_name = %entity.logical_name, %id, "created entity");
        Ok(id)
    }

    /// Update a record in place. The entity must have an id.
    pub async fn update(&self, entity: &Entity) -> Result<()> {
        if entity.is_new() {
            return Err(Error::state("Cannot Update an Entity without an ID."));
        }
        let raw = self
            .organization_call(actions::UPDATE, &update_request(entity))
            .await?;
        parse_update_response(&raw)
    }

    /// Delete a record. The entity must have an id.
    pub async fn delete(&self, entity: &Entity) -> Result<()> {
        if entity.is_new() {
            return Err(Error::state("Cannot Delete an Entity without an ID."));
        }
        let raw = self
            .organization_call(
                actions::DELETE,
                &delete_request(&entity.logical_name, entity.id),
            )
            .await?;
        parse_delete_response(&raw)
    }

    /// Retrieve a record by id. `fields` of `None` fetches all columns.
    pub async fn retrieve(&self, entity: &Entity, fields: Option<&[&str]>) -> Result<Entity> {
        if entity.is_new() {
            return Err(Error::state("Cannot Retrieve an Entity without an ID."));
        }
        let raw = self
            .organization_call(
                actions::RETRIEVE,
                &retrieve_request(&entity.logical_name, entity.id, fields),
            )
            .await?;
        parse_retrieve_response(&raw, &entity.logical_name)
    }

    /// Run a FetchXML query.
    ///
    /// With `all_pages` the query is resent until `MoreRecords` clears,
    /// accumulating entities in page order; any supplied cookie is ignored.
    /// When a page reports more records without a cookie, one is
    /// synthesized from the page number so the next request can still be
    /// addressed.
    pub async fn retrieve_multiple(
        &self,
        fetch_xml: &str,
        all_pages: bool,
        paging_cookie: Option<String>,
        limit: Option<u32>,
        page: Option<u32>,
    ) -> Result<QueryResult> {
        let limit = limit.map(|l| l.min(self.config.max_records_per_page));
        let mut cookie = if all_pages { None } else { paging_cookie };
        let mut page_override = page;
        let mut accumulated: Option<QueryResult> = None;

        let result = loop {
            let body = retrieve_multiple_request(fetch_xml, cookie.as_deref(), limit, page_override)?;
            let raw = self
                .organization_call(actions::RETRIEVE_MULTIPLE, &body)
                .await?;
            let mut page_data = parse_retrieve_multiple_response(&raw)?;
            debug!(
                count = page_data.count,
                more_records = page_data.more_records,
                "retrieved result page"
            );

            if let Some(previous) = accumulated.take() {
                let mut entities = previous.entities;
                entities.extend(page_data.entities);
                page_data.entities = entities;
                page_data.count += previous.count;
            }

            if page_data.more_records && page_data.paging_cookie.is_none() {
                let synthesized = next_cookie(cookie.as_deref())?;
                page_data.paging_cookie = Some(synthesized.clone());
                cookie = Some(synthesized);
            } else {
                cookie = page_data.paging_cookie.clone();
            }
            page_override = None;

            if page_data.more_records && all_pages {
                accumulated = Some(page_data);
            } else {
                break page_data;
            }
        };
        Ok(result)
    }

    /// Retrieve every record of one entity type with all attributes.
    pub async fn retrieve_multiple_entities(
        &self,
        logical_name: &str,
        all_pages: bool,
        paging_cookie: Option<String>,
        limit: Option<u32>,
        page: Option<u32>,
    ) -> Result<QueryResult> {
        self.retrieve_multiple(
            &all_attributes_fetch(logical_name),
            all_pages,
            paging_cookie,
            limit,
            page,
        )
        .await
    }

    /// Run a FetchXML query expected to match at most one record.
    pub async fn retrieve_single(&self, fetch_xml: &str) -> Result<Option<Entity>> {
        let result = self
            .retrieve_multiple(fetch_xml, false, None, Some(1), None)
            .await?;
        Ok(result.entities.into_iter().next())
    }

    /// Execute a named organization-service action with string parameters.
    pub async fn execute_action(
        &self,
        request_name: &str,
        parameters: &[(String, String)],
    ) -> Result<BTreeMap<String, String>> {
        let raw = self
            .organization_call(
                actions::EXECUTE,
                &execute_action_request(request_name, parameters),
            )
            .await?;
        parse_execute_response(&raw)
    }

    /// Retrieve the raw metadata element for one entity type.
    pub async fn retrieve_entity(
        &self,
        logical_name: &str,
        filters: EntityFilters,
        retrieve_as_if_published: bool,
    ) -> Result<Element> {
        let raw = self
            .organization_call(
                actions::EXECUTE,
                &retrieve_entity_request(logical_name, filters, retrieve_as_if_published),
            )
            .await?;
        parse_retrieve_entity_response(&raw)
    }

    /// The schema of one entity type, from the cache when fresh.
    pub async fn entity_schema(&self, logical_name: &str) -> Result<EntitySchema> {
        if let Some(schema) = self.schema_cache.load(logical_name)? {
            debug!(logical_name, "entity schema served from cache");
            return Ok(schema);
        }

        let metadata = self
            .retrieve_entity(logical_name, EntityFilters::All, false)
            .await?;
        let schema = extract_entity_schema(&metadata)?;
        if let Err(error) = self
            .schema_cache
            .save(logical_name, &schema, self.settings.cache_ttl)
        {
            // A dead cache degrades performance, not correctness.
            warn!(logical_name, %error, "failed to cache entity schema");
        }
        Ok(schema)
    }

    /// List every entity type usable in advanced find.
    pub async fn retrieve_all_entities(&self) -> Result<Vec<EntityListing>> {
        let raw = self
            .organization_call(actions::EXECUTE, &retrieve_all_entities_request())
            .await?;
        parse_retrieve_all_entities_response(&raw)
    }

    /// List the organizations visible through the discovery service.
    pub async fn retrieve_organizations(&self) -> Result<Vec<OrganizationDetail>> {
        let raw = self
            .discovery_call(actions::DISCOVERY_EXECUTE, &retrieve_organizations_request())
            .await?;
        parse_retrieve_organizations_response(&raw)
    }

    /// Find the organization whose web application endpoint matches the
    /// host of `web_application_url`.
    pub async fn retrieve_organization(
        &self,
        web_application_url: &str,
    ) -> Result<Option<OrganizationDetail>> {
        let url = url::Url::parse(web_application_url)?;
        let Some(host) = url.host_str().map(str::to_string) else {
            return Err(Error::state(format!(
                "No host in web application URL <{web_application_url}>"
            )));
        };

        let organizations = self.retrieve_organizations().await?;
        Ok(organizations.into_iter().find(|org| {
            org.endpoints
                .get("WebApplication")
                .is_some_and(|endpoint| endpoint.contains(&host))
        }))
    }

    async fn organization_call(&self, action: &str, body: &str) -> Result<String> {
        let token = self.auth.organization_token().await?;
        let envelope = build_envelope(
            &self.settings.organization_url,
            action,
            &self.auth.security_header(&token),
            body,
        );
        debug!(action, "sending organization service request");
        self.transport
            .send(&self.settings.organization_url, envelope)
            .await
    }

    async fn discovery_call(&self, action: &str, body: &str) -> Result<String> {
        if self.settings.discovery_url.is_empty() {
            return Err(Error::state("Discovery service URL is not set"));
        }
        let token = self.auth.discovery_token().await?;
        let envelope = build_envelope(
            &self.settings.discovery_url,
            action,
            &self.auth.security_header(&token),
            body,
        );
        debug!(action, "sending discovery service request");
        self.transport
            .send(&self.settings.discovery_url, envelope)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EMPTY_GUID;
    use crm_soap_auth::{AuthMode, SecurityToken, Service};
    use crm_soap_client::ErrorKind;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server_uri: &str) -> CrmClient {
        let settings = Settings::new(
            format!("{server_uri}/XRMServices/2011/Organization.svc"),
            "user@example.com",
            "pw",
            AuthMode::OnlineFederation,
        );
        let client = CrmClient::new(settings).unwrap();
        client
            .auth()
            .seed_token(Service::Organization, SecurityToken::new("<tok/>"));
        client
    }

    fn response_envelope(action: &str, body: &str) -> String {
        format!(
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"
                           xmlns:a="http://www.w3.org/2005/08/addressing">
                 <s:Header><a:Action s:mustUnderstand="1">{action}</a:Action></s:Header>
                 <s:Body>{body}</s:Body>
               </s:Envelope>"#
        )
    }

    fn result_page(more: bool, names: &[&str]) -> String {
        let entities: String = names
            .iter()
            .map(|n| {
                format!(
                    r#"<b:Entity>
                         <b:Attributes>
                           <b:KeyValuePairOfstringanyType>
                             <c:key>name</c:key>
                             <c:value i:type="d:string" xmlns:d="http://www.w3.org/2001/XMLSchema">{n}</c:value>
                           </b:KeyValuePairOfstringanyType>
                         </b:Attributes>
                         <b:FormattedValues/>
                         <b:Id>12345678-1234-1234-1234-123456789012</b:Id>
                         <b:LogicalName>account</b:LogicalName>
                       </b:Entity>"#
                )
            })
            .collect();
        response_envelope(
            "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/RetrieveMultipleResponse",
            &format!(
                r#"<RetrieveMultipleResponse xmlns="http://schemas.microsoft.com/xrm/2011/Contracts/Services"
                                             xmlns:b="http://schemas.microsoft.com/xrm/2011/Contracts"
                                             xmlns:c="http://schemas.datacontract.org/2004/07/System.Collections.Generic"
                                             xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
                     <RetrieveMultipleResult>
                       <b:EntityName>account</b:EntityName>
                       <b:Entities>{entities}</b:Entities>
                       <b:MoreRecords>{more}</b:MoreRecords>
                       <b:PagingCookie/>
                     </RetrieveMultipleResult>
                   </RetrieveMultipleResponse>"#
            ),
        )
    }

    #[tokio::test]
    async fn test_all_pages_synthesizes_cookies_across_pages() {
        let server = MockServer::start().await;
        const SVC: &str = "/XRMServices/2011/Organization.svc";

        // First request carries no page attribute.
        Mock::given(method("POST"))
            .and(path(SVC))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(result_page(true, &["a1", "a2"])),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        // The driver synthesized <cookie page="1"/> and asks for page 2.
        Mock::given(method("POST"))
            .and(path(SVC))
            .and(body_string_contains("page=&quot;2&quot;"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(result_page(true, &["b1", "b2"])),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        // Then page 3, which is the last.
        Mock::given(method("POST"))
            .and(path(SVC))
            .and(body_string_contains("page=&quot;3&quot;"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(result_page(false, &["c1"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let result = client
            .retrieve_multiple_entities("account", true, None, None, None)
            .await
            .unwrap();

        assert_eq!(result.count, 5);
        assert!(!result.more_records);
        let names: Vec<_> = result
            .entities
            .iter()
            .map(|e| e.get("name").unwrap().display_text())
            .collect();
        assert_eq!(names, vec!["a1", "a2", "b1", "b2", "c1"]);
    }

    #[tokio::test]
    async fn test_single_page_respects_supplied_cookie() {
        let server = MockServer::start().await;

        // Cookie says page 4 was retrieved, so the request asks for page 5.
        Mock::given(method("POST"))
            .and(body_string_contains("page=&quot;5&quot;"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(result_page(true, &["d1"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let result = client
            .retrieve_multiple(
                &all_attributes_fetch("account"),
                false,
                Some("<cookie page=\"4\"></cookie>".to_string()),
                None,
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.count, 1);
        assert!(result.more_records);
        // One page only; the driver synthesized the next cookie for the
        // caller to resume with.
        assert_eq!(
            result.paging_cookie.as_deref(),
            Some("<cookie page=\"5\"></cookie>")
        );
    }

    #[tokio::test]
    async fn test_create_guard_rejects_existing_entity_before_any_network() {
        // Unroutable server: a guard failure must not touch the network.
        let client = client("https://crm.invalid");
        let mut entity = Entity::with_id("account", Uuid::new_v4());

        let err = client.create(&mut entity).await.unwrap_err();
        match err.kind {
            ErrorKind::State(message) => assert!(message.contains("already exists")),
            other => panic!("expected State, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_delete_retrieve_guards_require_an_id() {
        let client = client("https://crm.invalid");
        let entity = Entity::new("account");
        assert_eq!(entity.id, EMPTY_GUID);

        for err in [
            client.update(&entity).await.unwrap_err(),
            client.delete(&entity).await.unwrap_err(),
            client.retrieve(&entity, None).await.unwrap_err(),
        ] {
            assert!(matches!(err.kind, ErrorKind::State(_)));
        }
    }

    #[tokio::test]
    async fn test_create_sets_the_assigned_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("<Create"))
            .respond_with(ResponseTemplate::new(200).set_body_string(response_envelope(
                "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/CreateResponse",
                r#"<CreateResponse xmlns="http://schemas.microsoft.com/xrm/2011/Contracts/Services">
                     <CreateResult>12345678-1234-1234-1234-123456789012</CreateResult>
                   </CreateResponse>"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let mut entity = Entity::new("account");
        entity.set_text("name", "Contoso");

        let id = client.create(&mut entity).await.unwrap();
        assert_eq!(id.to_string(), "12345678-1234-1234-1234-123456789012");
        assert_eq!(entity.id, id);
    }

    #[tokio::test]
    async fn test_server_fault_surfaces_as_fault_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string(response_envelope(
                "http://www.w3.org/2005/08/addressing/soap/fault",
                r#"<s:Fault xmlns:s="http://www.w3.org/2003/05/soap-envelope">
                     <s:Code><s:Value>s:Receiver</s:Value></s:Code>
                     <s:Reason><s:Text xml:lang="en-US">The entity with a name = 'bogus' was not found</s:Text></s:Reason>
                   </s:Fault>"#,
            )))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let err = client
            .retrieve_multiple_entities("bogus", false, None, None, None)
            .await
            .unwrap_err();
        assert!(err.is_fault());
        assert_eq!(err.fault_code(), Some("Receiver"));
    }

    #[tokio::test]
    async fn test_entity_schema_uses_the_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("RetrieveEntity"))
            .respond_with(ResponseTemplate::new(200).set_body_string(response_envelope(
                "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/ExecuteResponse",
                r#"<ExecuteResponse xmlns="http://schemas.microsoft.com/xrm/2011/Contracts/Services"
                                    xmlns:b="http://schemas.microsoft.com/xrm/2011/Contracts"
                                    xmlns:c="http://schemas.datacontract.org/2004/07/System.Collections.Generic"
                                    xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
                     <ExecuteResult i:type="b:RetrieveEntityResponse">
                       <b:Results>
                         <b:KeyValuePairOfstringanyType>
                           <c:key>EntityMetadata</c:key>
                           <c:value i:type="d:EntityMetadata" xmlns:d="http://schemas.microsoft.com/xrm/2011/Metadata">
                             <d:LogicalName>account</d:LogicalName>
                           </c:value>
                         </b:KeyValuePairOfstringanyType>
                       </b:Results>
                     </ExecuteResult>
                   </ExecuteResponse>"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let first = client.entity_schema("account").await.unwrap();
        assert_eq!(first.logical_name, "account");

        // Second lookup is served from the cache; the mock allows one hit.
        let second = client.entity_schema("account").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_discovery_requires_a_discovery_url() {
        let client = client("https://crm.invalid");
        let err = client.retrieve_organizations().await.unwrap_err();
        match err.kind {
            ErrorKind::State(message) => assert!(message.contains("Discovery service URL")),
            other => panic!("expected State, got {other:?}"),
        }
    }
}

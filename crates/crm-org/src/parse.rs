//! Response parsers, one per response shape.
//!
//! Every parser validates the element it exists to find and fails with a
//! structural error naming it; there are no partial results.

use std::collections::BTreeMap;

use uuid::Uuid;
use xmltree::Element;

use crate::attributes::parse_entity_element;
use crate::entity::Entity;
use crm_soap_client::{xml, Error, Result};

/// One page of a RetrieveMultiple result, or several accumulated by the
/// paging driver.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Logical name of the entity queried, when the server reported one.
    pub entity_name: Option<String>,
    pub entities: Vec<Entity>,
    /// True when the server has more pages beyond this result.
    pub more_records: bool,
    /// Cookie resuming the query after this result.
    pub paging_cookie: Option<String>,
    /// Number of records retrieved.
    pub count: usize,
}

/// Basic listing entry from RetrieveAllEntities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityListing {
    pub logical_name: String,
    pub display_name: String,
}

/// One organization from the discovery service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrganizationDetail {
    pub friendly_name: Option<String>,
    pub organization_id: Option<String>,
    pub organization_version: Option<String>,
    pub state: Option<String>,
    pub unique_name: Option<String>,
    pub url_name: Option<String>,
    /// Endpoint type to URL, e.g. `WebApplication`, `OrganizationService`.
    pub endpoints: BTreeMap<String, String>,
}

fn parse_doc(raw: &str) -> Result<Element> {
    Element::parse(raw.as_bytes()).map_err(Error::from)
}

fn find_required<'a>(doc: &'a Element, name: &str) -> Result<&'a Element> {
    xml::find_descendant(doc, name)
        .ok_or_else(|| Error::structural(format!("Could not find {name} node in XML provided")))
}

/// Parse a RetrieveMultiple response into one result page.
pub fn parse_retrieve_multiple_response(raw: &str) -> Result<QueryResult> {
    let doc = parse_doc(raw)?;
    let response = find_required(&doc, "RetrieveMultipleResponse")?;
    let result = xml::find_descendant(response, "RetrieveMultipleResult").ok_or_else(|| {
        Error::structural("Could not find RetrieveMultipleResult node in XML provided")
    })?;

    let entity_name = xml::descendant_text(result, "EntityName").filter(|n| !n.is_empty());
    let more_records = xml::descendant_text(result, "MoreRecords")
        .ok_or_else(|| Error::structural("Could not find MoreRecords node in XML provided"))?
        .trim()
        == "true";
    let paging_cookie = result
        .get_child("PagingCookie")
        .map(xml::text_of)
        .filter(|c| !c.is_empty());

    let mut entities = Vec::new();
    if let Some(container) = result.get_child("Entities") {
        let name = entity_name.as_deref().unwrap_or("");
        for entity_el in xml::child_elements(container).filter(|e| e.name == "Entity") {
            entities.push(parse_entity_element(entity_el, name)?);
        }
    }

    let count = entities.len();
    Ok(QueryResult {
        entity_name,
        entities,
        more_records,
        paging_cookie,
        count,
    })
}

/// Parse a Create response into the new record's id.
pub fn parse_create_response(raw: &str) -> Result<Uuid> {
    let doc = parse_doc(raw)?;
    let response = xml::find_descendant(&doc, "CreateResponse").ok_or_else(|| {
        Error::structural("Could not find CreateResponse node in XML returned from Server")
    })?;
    let id_text = xml::descendant_text(response, "CreateResult")
        .ok_or_else(|| Error::structural("Could not find CreateResult node in XML returned from Server"))?;
    Uuid::parse_str(id_text.trim())
        .map_err(|_| Error::structural(format!("Invalid id <{id_text}> in CreateResult node")))
}

/// Confirm an Update response.
pub fn parse_update_response(raw: &str) -> Result<()> {
    let doc = parse_doc(raw)?;
    xml::find_descendant(&doc, "UpdateResponse")
        .map(|_| ())
        .ok_or_else(|| Error::structural("Could not find UpdateResponse node in XML returned from Server"))
}

/// Confirm a Delete response.
pub fn parse_delete_response(raw: &str) -> Result<()> {
    let doc = parse_doc(raw)?;
    xml::find_descendant(&doc, "DeleteResponse")
        .map(|_| ())
        .ok_or_else(|| Error::structural("Could not find DeleteResponse node in XML returned from Server"))
}

/// Parse an Execute response into the key/value pairs of its results.
pub fn parse_execute_response(raw: &str) -> Result<BTreeMap<String, String>> {
    let doc = parse_doc(raw)?;
    let result = xml::find_descendant(&doc, "ExecuteResult").ok_or_else(|| {
        Error::structural("Could not find ExecuteResult node in XML returned from Server")
    })?;

    let mut values = BTreeMap::new();
    for pair in xml::descendants(result).filter(|e| e.name == "KeyValuePairOfstringanyType") {
        let Some(key) = xml::descendant_text(pair, "key") else {
            continue;
        };
        let value = pair.get_child("value").map(xml::text_of).unwrap_or_default();
        values.insert(key, value);
    }
    Ok(values)
}

/// Parse a Retrieve response into one entity.
pub fn parse_retrieve_response(raw: &str, logical_name: &str) -> Result<Entity> {
    let doc = parse_doc(raw)?;
    let response = find_required(&doc, "RetrieveResponse")?;
    let result = xml::find_descendant(response, "RetrieveResult")
        .ok_or_else(|| Error::structural("Could not find RetrieveResult node in XML provided"))?;
    parse_entity_element(result, logical_name)
}

fn stripped_type(el: &Element) -> Option<&str> {
    el.attributes.get("type").map(|t| xml::strip_ns(t))
}

/// Parse a RetrieveEntity (metadata) response into the `EntityMetadata`
/// element for schema extraction.
pub fn parse_retrieve_entity_response(raw: &str) -> Result<Element> {
    let doc = parse_doc(raw)?;
    let result = xml::descendants(&doc)
        .find(|e| e.name == "ExecuteResult" && stripped_type(e) == Some("RetrieveEntityResponse"))
        .ok_or_else(|| {
            Error::structural("Could not find ExecuteResult for RetrieveEntityResponse in XML provided")
        })?;

    xml::descendants(result)
        .find(|e| e.name == "value" && stripped_type(e) == Some("EntityMetadata"))
        .cloned()
        .ok_or_else(|| Error::structural("Could not find returned EntityMetadata in XML provided"))
}

/// Parse a RetrieveAllEntities response into the entities usable in
/// advanced find, with their user-localized display names.
pub fn parse_retrieve_all_entities_response(raw: &str) -> Result<Vec<EntityListing>> {
    let doc = parse_doc(raw)?;
    let response = find_required(&doc, "ExecuteResponse")?;
    let results = xml::find_descendant(response, "Results")
        .ok_or_else(|| Error::structural("Could not find ExecuteResult node in XML provided"))?;

    let mut listings = Vec::new();
    for metadata in xml::descendants(results).filter(|e| e.name == "EntityMetadata") {
        let advanced_find = xml::descendant_text(metadata, "IsValidForAdvancedFind");
        if advanced_find.as_deref() != Some("true") {
            continue;
        }
        let Some(logical_name) = xml::descendant_text(metadata, "LogicalName") else {
            continue;
        };
        let display_name = metadata
            .get_child("DisplayName")
            .and_then(|d| xml::find_descendant(d, "UserLocalizedLabel"))
            .and_then(|l| xml::descendant_text(l, "Label"))
            .unwrap_or_default();
        listings.push(EntityListing {
            logical_name,
            display_name,
        });
    }
    Ok(listings)
}

/// Parse a discovery Execute response into organization details.
pub fn parse_retrieve_organizations_response(raw: &str) -> Result<Vec<OrganizationDetail>> {
    let doc = parse_doc(raw)?;

    let mut organizations = Vec::new();
    for node in xml::descendants(&doc).filter(|e| e.name == "OrganizationDetail") {
        let mut organization = OrganizationDetail {
            friendly_name: xml::descendant_text(node, "FriendlyName"),
            organization_id: xml::descendant_text(node, "OrganizationId"),
            organization_version: xml::descendant_text(node, "OrganizationVersion"),
            state: xml::descendant_text(node, "State"),
            unique_name: xml::descendant_text(node, "UniqueName"),
            url_name: xml::descendant_text(node, "UrlName"),
            endpoints: BTreeMap::new(),
        };
        if let Some(endpoints) = xml::find_descendant(node, "Endpoints") {
            // The pair element name carries a generated type suffix; match
            // on the stable prefix.
            for pair in xml::descendants(endpoints)
                .filter(|e| e.name.starts_with("KeyValuePairOfEndpointTypestring"))
            {
                let Some(key) = xml::descendant_text(pair, "key") else {
                    continue;
                };
                let value = pair.get_child("value").map(xml::text_of).unwrap_or_default();
                organization.endpoints.insert(key, value);
            }
        }
        organizations.push(organization);
    }
    Ok(organizations)
}

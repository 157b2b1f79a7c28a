//! SOAP request body generation.
//!
//! Everything here produces the content of `s:Body` as a string; the
//! envelope builder wraps it. Values are XML-escaped at the point they are
//! spliced in.

use crate::entity::{AttributeValue, Entity};
use crate::paging::page_number;
use crm_soap_client::{xml, Result};
use uuid::Uuid;

const SERVICES_NS: &str = "http://schemas.microsoft.com/xrm/2011/Contracts/Services";
const DISCOVERY_NS: &str = "http://schemas.microsoft.com/xrm/2011/Contracts/Discovery";
const CONTRACTS_NS: &str = "http://schemas.microsoft.com/xrm/2011/Contracts";
const GENERIC_NS: &str = "http://schemas.datacontract.org/2004/07/System.Collections.Generic";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const METADATA_NS: &str = "http://schemas.microsoft.com/xrm/2011/Metadata";
const ARRAYS_NS: &str = "http://schemas.microsoft.com/2003/10/Serialization/Arrays";

/// Which parts of an entity's metadata a RetrieveEntity request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFilters {
    Entity,
    Attributes,
    Relationships,
    All,
}

impl EntityFilters {
    fn wire_value(self) -> &'static str {
        match self {
            EntityFilters::Entity => "Entity",
            EntityFilters::Attributes => "Attributes",
            EntityFilters::Relationships => "Relationships",
            EntityFilters::All => "All",
        }
    }
}

/// Body of a Create request.
pub fn create_request(entity: &Entity) -> String {
    format!(
        "<Create xmlns=\"{SERVICES_NS}\" xmlns:i=\"{XSI_NS}\">{}</Create>",
        entity_fragment(entity)
    )
}

/// Body of an Update request.
pub fn update_request(entity: &Entity) -> String {
    format!(
        "<Update xmlns=\"{SERVICES_NS}\" xmlns:i=\"{XSI_NS}\">{}</Update>",
        entity_fragment(entity)
    )
}

/// Body of a Delete request.
pub fn delete_request(logical_name: &str, id: Uuid) -> String {
    format!(
        "<Delete xmlns=\"{SERVICES_NS}\" xmlns:i=\"{XSI_NS}\">\
           <entityName>{}</entityName>\
           <id>{id}</id>\
         </Delete>",
        xml::escape(logical_name),
    )
}

/// Body of a Retrieve request. `fields` of `None` asks for all columns.
pub fn retrieve_request(logical_name: &str, id: Uuid, fields: Option<&[&str]>) -> String {
    let column_set = match fields {
        None => "<b:AllColumns>true</b:AllColumns>".to_string(),
        Some(fields) => {
            let columns: String = fields
                .iter()
                .map(|f| format!("<d:string>{}</d:string>", xml::escape(f)))
                .collect();
            format!(
                "<b:AllColumns>false</b:AllColumns>\
                 <b:Columns xmlns:d=\"{ARRAYS_NS}\">{columns}</b:Columns>"
            )
        }
    };
    format!(
        "<Retrieve xmlns=\"{SERVICES_NS}\" xmlns:i=\"{XSI_NS}\">\
           <entityName>{}</entityName>\
           <id>{id}</id>\
           <columnSet xmlns:b=\"{CONTRACTS_NS}\">{column_set}</columnSet>\
         </Retrieve>",
        xml::escape(logical_name),
    )
}

/// Body of a RetrieveMultiple request carrying a FetchXML query.
///
/// Paging is expressed inside the FetchXML itself; the query is then
/// escaped into the `Query` element.
pub fn retrieve_multiple_request(
    fetch_xml: &str,
    paging_cookie: Option<&str>,
    limit: Option<u32>,
    page: Option<u32>,
) -> Result<String> {
    let paged = with_paging(fetch_xml, paging_cookie, limit, page)?;
    Ok(format!(
        "<RetrieveMultiple xmlns=\"{SERVICES_NS}\" xmlns:i=\"{XSI_NS}\">\
           <query i:type=\"b:FetchExpression\" xmlns:b=\"{CONTRACTS_NS}\">\
             <b:Query>{}</b:Query>\
           </query>\
         </RetrieveMultiple>",
        xml::escape(&paged),
    ))
}

/// Inject `page`, `count`, and `paging-cookie` attributes into the opening
/// `<fetch>` tag. The cookie names the last page retrieved, so without an
/// explicit page the request asks for the cookie's page number plus one.
pub fn with_paging(
    fetch_xml: &str,
    paging_cookie: Option<&str>,
    limit: Option<u32>,
    page: Option<u32>,
) -> Result<String> {
    let page = match (page, paging_cookie) {
        (Some(page), _) => Some(page),
        (None, Some(cookie)) => Some(page_number(cookie)? + 1),
        (None, None) => None,
    };

    let mut attributes = String::new();
    if let Some(page) = page {
        attributes.push_str(&format!(" page=\"{page}\""));
    }
    if let Some(limit) = limit {
        attributes.push_str(&format!(" count=\"{limit}\""));
    }
    if let Some(cookie) = paging_cookie {
        attributes.push_str(&format!(" paging-cookie=\"{}\"", xml::escape(cookie)));
    }
    if attributes.is_empty() {
        return Ok(fetch_xml.to_string());
    }

    // Splice into the opening tag rather than reserializing; the query is
    // the caller's text and must otherwise pass through untouched.
    match fetch_xml.find("<fetch") {
        Some(start) => {
            let insert_at = start + "<fetch".len();
            let mut out = String::with_capacity(fetch_xml.len() + attributes.len());
            out.push_str(&fetch_xml[..insert_at]);
            out.push_str(&attributes);
            out.push_str(&fetch_xml[insert_at..]);
            Ok(out)
        }
        None => Ok(fetch_xml.to_string()),
    }
}

/// FetchXML that selects all attributes of every record of one entity type.
pub fn all_attributes_fetch(logical_name: &str) -> String {
    format!(
        "<fetch version=\"1.0\" output-format=\"xml-platform\" mapping=\"logical\" distinct=\"false\">\
           <entity name=\"{}\"><all-attributes/></entity>\
         </fetch>",
        xml::escape(logical_name),
    )
}

/// Body of an Execute request for a named action with string parameters.
pub fn execute_action_request(request_name: &str, parameters: &[(String, String)]) -> String {
    let pairs: String = parameters
        .iter()
        .map(|(key, value)| {
            format!(
                "<b:KeyValuePairOfstringanyType>\
                   <c:key>{}</c:key>\
                   <c:value i:type=\"d:string\" xmlns:d=\"{XSD_NS}\">{}</c:value>\
                 </b:KeyValuePairOfstringanyType>",
                xml::escape(key),
                xml::escape(value),
            )
        })
        .collect();
    format!(
        "<Execute xmlns=\"{SERVICES_NS}\" xmlns:i=\"{XSI_NS}\">\
           <request xmlns:b=\"{CONTRACTS_NS}\">\
             <b:Parameters xmlns:c=\"{GENERIC_NS}\">{pairs}</b:Parameters>\
             <b:RequestId i:nil=\"true\"/>\
             <b:RequestName>{}</b:RequestName>\
           </request>\
         </Execute>",
        xml::escape(request_name),
    )
}

/// Body of an Execute request for RetrieveEntity metadata.
pub fn retrieve_entity_request(
    logical_name: &str,
    filters: EntityFilters,
    retrieve_as_if_published: bool,
) -> String {
    format!(
        "<Execute xmlns=\"{SERVICES_NS}\" xmlns:i=\"{XSI_NS}\">\
           <request i:type=\"b:RetrieveEntityRequest\" xmlns:b=\"{CONTRACTS_NS}\">\
             <b:Parameters xmlns:c=\"{GENERIC_NS}\">\
               <b:KeyValuePairOfstringanyType>\
                 <c:key>EntityFilters</c:key>\
                 <c:value i:type=\"d:EntityFilters\" xmlns:d=\"{METADATA_NS}\">{filters}</c:value>\
               </b:KeyValuePairOfstringanyType>\
               <b:KeyValuePairOfstringanyType>\
                 <c:key>MetadataId</c:key>\
                 <c:value i:type=\"d:guid\" xmlns:d=\"http://schemas.microsoft.com/2003/10/Serialization/\">{EMPTY}</c:value>\
               </b:KeyValuePairOfstringanyType>\
               <b:KeyValuePairOfstringanyType>\
                 <c:key>RetrieveAsIfPublished</c:key>\
                 <c:value i:type=\"d:boolean\" xmlns:d=\"{XSD_NS}\">{retrieve_as_if_published}</c:value>\
               </b:KeyValuePairOfstringanyType>\
               <b:KeyValuePairOfstringanyType>\
                 <c:key>LogicalName</c:key>\
                 <c:value i:type=\"d:string\" xmlns:d=\"{XSD_NS}\">{}</c:value>\
               </b:KeyValuePairOfstringanyType>\
             </b:Parameters>\
             <b:RequestId i:nil=\"true\"/>\
             <b:RequestName>RetrieveEntity</b:RequestName>\
           </request>\
         </Execute>",
        xml::escape(logical_name),
        filters = filters.wire_value(),
        EMPTY = Uuid::nil(),
    )
}

/// Body of an Execute request listing every entity's basic metadata.
pub fn retrieve_all_entities_request() -> String {
    format!(
        "<Execute xmlns=\"{SERVICES_NS}\">\
           <request i:type=\"b:RetrieveAllEntitiesRequest\" xmlns:b=\"{CONTRACTS_NS}\" xmlns:i=\"{XSI_NS}\">\
             <b:Parameters xmlns:c=\"{GENERIC_NS}\">\
               <b:KeyValuePairOfstringanyType>\
                 <c:key>EntityFilters</c:key>\
                 <c:value i:type=\"d:EntityFilters\" xmlns:d=\"{METADATA_NS}\">Entity</c:value>\
               </b:KeyValuePairOfstringanyType>\
               <b:KeyValuePairOfstringanyType>\
                 <c:key>RetrieveAsIfPublished</c:key>\
                 <c:value i:type=\"d:boolean\" xmlns:d=\"{XSD_NS}\">false</c:value>\
               </b:KeyValuePairOfstringanyType>\
             </b:Parameters>\
             <b:RequestId i:nil=\"true\"/>\
             <b:RequestName>RetrieveAllEntities</b:RequestName>\
           </request>\
         </Execute>"
    )
}

/// Body of a discovery-service Execute request listing organizations.
pub fn retrieve_organizations_request() -> String {
    format!(
        "<Execute xmlns=\"{DISCOVERY_NS}\" xmlns:i=\"{XSI_NS}\">\
           <request i:type=\"RetrieveOrganizationsRequest\">\
             <AccessType>Default</AccessType>\
             <Release>Current</Release>\
           </request>\
         </Execute>"
    )
}

/// The `<entity>` fragment shared by Create and Update.
fn entity_fragment(entity: &Entity) -> String {
    let pairs: String = entity
        .attributes
        .iter()
        .filter_map(|(key, value)| {
            let value_xml = attribute_value_xml(value)?;
            Some(format!(
                "<b:KeyValuePairOfstringanyType>\
                   <c:key>{}</c:key>\
                   {value_xml}\
                 </b:KeyValuePairOfstringanyType>",
                xml::escape(key),
            ))
        })
        .collect();
    format!(
        "<entity xmlns:b=\"{CONTRACTS_NS}\" xmlns:c=\"{GENERIC_NS}\">\
           <b:Attributes>{pairs}</b:Attributes>\
           <b:EntityState i:nil=\"true\"/>\
           <b:FormattedValues/>\
           <b:Id>{}</b:Id>\
           <b:LogicalName>{}</b:LogicalName>\
           <b:RelatedEntities/>\
         </entity>",
        entity.id,
        xml::escape(&entity.logical_name),
    )
}

/// Wire form of one attribute value, or `None` for read-only shapes that
/// never go back to the server.
fn attribute_value_xml(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Raw(s) => Some(format!(
            "<c:value i:type=\"d:string\" xmlns:d=\"{XSD_NS}\">{}</c:value>",
            xml::escape(s),
        )),
        AttributeValue::OptionSet(n) => Some(format!(
            "<c:value i:type=\"b:OptionSetValue\"><b:Value>{n}</b:Value></c:value>"
        )),
        AttributeValue::Reference(r) => Some(format!(
            "<c:value i:type=\"b:EntityReference\">\
               <b:Id>{}</b:Id>\
               <b:LogicalName>{}</b:LogicalName>\
               <b:Name i:nil=\"true\"/>\
             </c:value>",
            r.id,
            xml::escape(&r.logical_name),
        )),
        AttributeValue::DateTime(t) => Some(format!(
            "<c:value i:type=\"d:dateTime\" xmlns:d=\"{XSD_NS}\">{}</c:value>",
            t.format("%Y-%m-%dT%H:%M:%SZ"),
        )),
        AttributeValue::Formatted { value, .. } => attribute_value_xml(value.raw()),
        AttributeValue::Aliased(_) => None,
    }
}

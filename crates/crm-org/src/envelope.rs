//! SOAP 1.2 envelope assembly.

use uuid::Uuid;

use crm_soap_client::xml;

/// WS-Addressing action URIs for the organization and discovery services.
pub mod actions {
    pub const CREATE: &str =
        "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/Create";
    pub const RETRIEVE: &str =
        "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/Retrieve";
    pub const RETRIEVE_MULTIPLE: &str =
        "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/RetrieveMultiple";
    pub const UPDATE: &str =
        "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/Update";
    pub const DELETE: &str =
        "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/Delete";
    pub const EXECUTE: &str =
        "http://schemas.microsoft.com/xrm/2011/Contracts/Services/IOrganizationService/Execute";
    pub const DISCOVERY_EXECUTE: &str =
        "http://schemas.microsoft.com/xrm/2011/Contracts/Discovery/IDiscoveryService/Execute";

}

/// Assemble a complete SOAP envelope around a request body.
///
/// The header carries the WS-Addressing Action and To (both
/// `mustUnderstand`), an anonymous ReplyTo, a fresh `urn:uuid` MessageId,
/// and the WS-Security header verbatim. The body content is the caller's,
/// also verbatim.
pub fn build_envelope(
    service_uri: &str,
    soap_action: &str,
    security_header: &str,
    body: &str,
) -> String {
    let message_id = Uuid::new_v4();
    format!(
        "<s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\" \
                     xmlns:a=\"http://www.w3.org/2005/08/addressing\" \
                     xmlns:u=\"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd\">\
           <s:Header>\
             <a:Action s:mustUnderstand=\"1\">{soap_action}</a:Action>\
             <a:ReplyTo><a:Address>http://www.w3.org/2005/08/addressing/anonymous</a:Address></a:ReplyTo>\
             <a:MessageId>urn:uuid:{message_id}</a:MessageId>\
             <a:To s:mustUnderstand=\"1\">{service_uri}</a:To>\
             {security_header}\
           </s:Header>\
           <s:Body>{body}</s:Body>\
         </s:Envelope>",
        service_uri = xml::escape(service_uri),
    )
}

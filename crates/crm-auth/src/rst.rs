//! WS-Trust `RequestSecurityToken` envelopes and response parsing.

use chrono::{Duration, Utc};
use uuid::Uuid;
use xmltree::Element;

use crm_soap_client::{xml, Error, ErrorKind, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const PASSWORD_TEXT_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText";

/// Build a WS-Trust 1.3 token request for an on-premises ADFS issuer.
///
/// `issuer_uri` is the username-mixed trust endpoint from the ADFS WSDL;
/// `applies_to` is the service URL the token will be presented to.
pub fn federation_rst(
    issuer_uri: &str,
    applies_to: &str,
    username: &str,
    password: &str,
) -> String {
    rst_envelope(
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue",
        issuer_uri,
        username,
        password,
        &format!(
            "<trust:RequestSecurityToken xmlns:trust=\"http://docs.oasis-open.org/ws-sx/ws-trust/200512\">\
               <wsp:AppliesTo xmlns:wsp=\"http://schemas.xmlsoap.org/ws/2004/09/policy\">\
                 <a:EndpointReference><a:Address>{applies_to}</a:Address></a:EndpointReference>\
               </wsp:AppliesTo>\
               <trust:RequestType>http://docs.oasis-open.org/ws-sx/ws-trust/200512/Issue</trust:RequestType>\
             </trust:RequestSecurityToken>",
            applies_to = xml::escape(applies_to),
        ),
    )
}

/// Build a WS-Trust February 2005 token request for the online federation
/// issuer.
pub fn online_federation_rst(
    issuer_uri: &str,
    applies_to: &str,
    username: &str,
    password: &str,
) -> String {
    rst_envelope(
        "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue",
        issuer_uri,
        username,
        password,
        &format!(
            "<t:RequestSecurityToken xmlns:t=\"http://schemas.xmlsoap.org/ws/2005/02/trust\">\
               <wsp:AppliesTo xmlns:wsp=\"http://schemas.xmlsoap.org/ws/2004/09/policy\">\
                 <a:EndpointReference><a:Address>{applies_to}</a:Address></a:EndpointReference>\
               </wsp:AppliesTo>\
               <t:RequestType>http://schemas.xmlsoap.org/ws/2005/02/trust/Issue</t:RequestType>\
             </t:RequestSecurityToken>",
            applies_to = xml::escape(applies_to),
        ),
    )
}

fn rst_envelope(
    action: &str,
    issuer_uri: &str,
    username: &str,
    password: &str,
    body: &str,
) -> String {
    let now = Utc::now();
    let created = now.format(TIMESTAMP_FORMAT);
    let expires = (now + Duration::minutes(5)).format(TIMESTAMP_FORMAT);
    let message_id = Uuid::new_v4();
    let token_id = Uuid::new_v4();

    format!(
        "<s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\" \
                     xmlns:a=\"http://www.w3.org/2005/08/addressing\" \
                     xmlns:u=\"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd\">\
           <s:Header>\
             <a:Action s:mustUnderstand=\"1\">{action}</a:Action>\
             <a:MessageID>urn:uuid:{message_id}</a:MessageID>\
             <a:ReplyTo><a:Address>http://www.w3.org/2005/08/addressing/anonymous</a:Address></a:ReplyTo>\
             <a:To s:mustUnderstand=\"1\">{issuer_uri}</a:To>\
             <o:Security s:mustUnderstand=\"1\" \
                         xmlns:o=\"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd\">\
               <u:Timestamp u:Id=\"_0\">\
                 <u:Created>{created}</u:Created>\
                 <u:Expires>{expires}</u:Expires>\
               </u:Timestamp>\
               <o:UsernameToken u:Id=\"uuid-{token_id}-1\">\
                 <o:Username>{username}</o:Username>\
                 <o:Password Type=\"{PASSWORD_TEXT_TYPE}\">{password}</o:Password>\
               </o:UsernameToken>\
             </o:Security>\
           </s:Header>\
           <s:Body>{body}</s:Body>\
         </s:Envelope>",
        issuer_uri = xml::escape(issuer_uri),
        username = xml::escape(username),
        password = xml::escape(password),
    )
}

/// Extract the security token from an issuer response.
///
/// The token is the first element inside `RequestedSecurityToken`, kept as
/// issued. A response without one is either a WS-Trust fault
/// ([`ErrorKind::Fault`]) or not a token response at all
/// ([`ErrorKind::Transport`]).
pub fn parse_rstr(status: u16, body: String) -> Result<crate::SecurityToken> {
    let Ok(envelope) = Element::parse(body.as_bytes()) else {
        return Err(Error::new(ErrorKind::Transport { status, body }));
    };

    if let Some(requested) = xml::find_descendant(&envelope, "RequestedSecurityToken") {
        let Some(token) = xml::child_elements(requested).next() else {
            return Err(Error::structural(
                "Could not find token inside RequestedSecurityToken node in XML provided",
            ));
        };
        return Ok(crate::SecurityToken::new(xml::to_string(token)?));
    }

    if let Some(fault) = xml::find_descendant(&envelope, "Fault") {
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
        return Err(Error::new(ErrorKind::Fault { code, reason }));
    }

    Err(Error::new(ErrorKind::Transport { status, body }))
}

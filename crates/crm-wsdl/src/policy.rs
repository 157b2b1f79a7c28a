//! WS-Policy lookup inside a flattened WSDL.

use xmltree::Element;

use crm_soap_client::{xml, Error, Result};

/// Find the security policy bound to a named service.
///
/// The chain is: service by name, first named port of that service, binding
/// with the port's name, that binding's `PolicyReference` URI, and finally
/// the `Policy` whose `wsu:Id` matches the URI with its leading `#` removed.
/// Any broken link fails with a structural error naming the missing element.
pub fn find_security_policy<'a>(wsdl: &'a Element, service_name: &str) -> Result<&'a Element> {
    let service = xml::descendants(wsdl)
        .find(|e| e.name == "service" && e.attributes.get("name").map(String::as_str) == Some(service_name))
        .ok_or_else(|| {
            Error::structural(format!(
                "Could not find definition of Service <{service_name}> in provided WSDL"
            ))
        })?;

    let binding_name = xml::descendants(service)
        .filter(|e| e.name == "port")
        .find_map(|port| port.attributes.get("name"))
        .ok_or_else(|| {
            Error::structural(format!(
                "Could not find binding for Service <{service_name}> in provided WSDL"
            ))
        })?;

    let binding = xml::descendants(wsdl)
        .find(|e| e.name == "binding" && e.attributes.get("name") == Some(binding_name))
        .ok_or_else(|| {
            Error::structural(format!(
                "Could not find definition of Binding <{binding_name}> in provided WSDL"
            ))
        })?;

    // PolicyReference URIs are fragment references; the Policy carries the
    // bare ID.
    let policy_id = xml::descendants(binding)
        .filter(|e| e.name == "PolicyReference")
        .find_map(|r| r.attributes.get("URI"))
        .map(|uri| uri.trim_start_matches('#'))
        .ok_or_else(|| {
            Error::structural(format!(
                "Could not find Policy Reference for Binding <{binding_name}> in provided WSDL"
            ))
        })?;

    xml::descendants(wsdl)
        .find(|e| e.name == "Policy" && e.attributes.get("Id").map(String::as_str) == Some(policy_id))
        .ok_or_else(|| {
            Error::structural(format!(
                "Could not find Policy with ID <{policy_id}> in provided WSDL"
            ))
        })
}

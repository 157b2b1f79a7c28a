//! Token issuer and WS-Trust endpoint resolution.

use xmltree::Element;

use crm_soap_client::{xml, Error, Result};

/// Port name of the username/password WS-Trust 1.3 binding inside an ADFS
/// authentication WSDL.
pub const TRUST_13_USERNAME_PORT: &str = "UserNameWSTrustBinding_IWSTrust13Async";

/// Walk a security policy to the token issuer address for federated
/// (on-premises ADFS) authentication.
///
/// Path: `EndorsingSupportingTokens / Policy / IssuedToken / Issuer /
/// Metadata / ... / Address`, taking the first match at every level.
pub fn federated_issuer_address(policy: &Element) -> Result<String> {
    issuer_address(policy, "EndorsingSupportingTokens")
}

/// Walk a security policy to the token issuer address for online federation
/// authentication. Identical to [`federated_issuer_address`] except that the
/// issued token lives under `SignedSupportingTokens`.
pub fn online_issuer_address(policy: &Element) -> Result<String> {
    issuer_address(policy, "SignedSupportingTokens")
}

fn issuer_address(policy: &Element, tokens_tag: &str) -> Result<String> {
    let mut node = xml::find_descendant(policy, tokens_tag).ok_or_else(|| {
        Error::structural(format!(
            "Could not find {tokens_tag} tag in provided security policy XML"
        ))
    })?;

    let mut path = tokens_tag.to_string();
    for step in ["Policy", "IssuedToken", "Issuer", "Metadata"] {
        node = xml::find_descendant(node, step).ok_or_else(|| {
            Error::structural(format!(
                "Could not find {path}/{step} tag in provided security policy XML"
            ))
        })?;
        path = format!("{path}/{step}");
    }

    let address = xml::find_descendant(node, "Address").ok_or_else(|| {
        Error::structural(format!(
            "Could not find {path}/.../Address tag in provided security policy XML"
        ))
    })?;

    let uri = xml::text_of(address).trim().to_string();
    if uri.is_empty() {
        return Err(Error::structural(
            "Could not find Security URL in provided security policy WSDL",
        ));
    }
    Ok(uri)
}

/// Find the `RequestSecurityToken` endpoint for a named trust port inside a
/// flattened authentication WSDL. The address is the `location` attribute of
/// the port's `address` element.
pub fn trust_address(authentication_wsdl: &Element, trust_port: &str) -> Result<String> {
    let port = xml::descendants(authentication_wsdl)
        .find(|e| e.name == "port" && e.attributes.get("name").map(String::as_str) == Some(trust_port))
        .ok_or_else(|| {
            Error::structural(format!(
                "Could not find Port for trust type <{trust_port}> in provided WSDL"
            ))
        })?;

    xml::descendants(port)
        .filter(|e| e.name == "address")
        .find_map(|a| a.attributes.get("location"))
        .filter(|location| !location.is_empty())
        .cloned()
        .ok_or_else(|| {
            Error::structural(format!(
                "Could not find Address for trust type <{trust_port}> in provided WSDL"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_soap_client::ErrorKind;

    fn parse(s: &str) -> Element {
        Element::parse(s.as_bytes()).unwrap()
    }

    fn policy(tokens_tag: &str) -> String {
        format!(
            r#"<wsp:Policy xmlns:wsp="urn:wsp" wsu:Id="P" xmlns:wsu="urn:wsu">
                 <wsp:ExactlyOne>
                   <sp:{tokens_tag} xmlns:sp="urn:sp">
                     <wsp:Policy>
                       <sp:IssuedToken>
                         <sp:Issuer>
                           <a:Metadata xmlns:a="urn:a">
                             <mex:Metadata xmlns:mex="urn:mex">
                               <mex:MetadataSection>
                                 <a:Address>https://sts.example.com/adfs/services/trust/mex</a:Address>
                               </mex:MetadataSection>
                             </mex:Metadata>
                           </a:Metadata>
                         </sp:Issuer>
                       </sp:IssuedToken>
                     </wsp:Policy>
                   </sp:{tokens_tag}>
                 </wsp:ExactlyOne>
               </wsp:Policy>"#
        )
    }

    #[test]
    fn test_federated_issuer_address() {
        let doc = parse(&policy("EndorsingSupportingTokens"));
        assert_eq!(
            federated_issuer_address(&doc).unwrap(),
            "https://sts.example.com/adfs/services/trust/mex"
        );
    }

    #[test]
    fn test_online_issuer_address() {
        let doc = parse(&policy("SignedSupportingTokens"));
        assert_eq!(
            online_issuer_address(&doc).unwrap(),
            "https://sts.example.com/adfs/services/trust/mex"
        );
    }

    #[test]
    fn test_wrong_tokens_tag_is_structural() {
        let doc = parse(&policy("SignedSupportingTokens"));
        let err = federated_issuer_address(&doc).unwrap_err();
        match err.kind {
            ErrorKind::Structural(message) => {
                assert!(message.contains("EndorsingSupportingTokens tag"));
            }
            other => panic!("expected Structural, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_issuer_names_the_path() {
        let doc = parse(
            r#"<Policy>
                 <EndorsingSupportingTokens>
                   <Policy><IssuedToken/></Policy>
                 </EndorsingSupportingTokens>
               </Policy>"#,
        );
        let err = federated_issuer_address(&doc).unwrap_err();
        match err.kind {
            ErrorKind::Structural(message) => {
                assert!(message.contains("EndorsingSupportingTokens/Policy/IssuedToken/Issuer tag"));
            }
            other => panic!("expected Structural, got {other:?}"),
        }
    }

    #[test]
    fn test_trust_address_matches_named_port() {
        let doc = parse(&format!(
            r#"<definitions>
                 <service name="SecurityTokenService">
                   <port name="CertificateWSTrustBinding_IWSTrust13Async">
                     <address location="https://sts.example.com/adfs/services/trust/13/certificatemixed"/>
                   </port>
                   <port name="{TRUST_13_USERNAME_PORT}">
                     <address location="https://sts.example.com/adfs/services/trust/13/usernamemixed"/>
                   </port>
                 </service>
               </definitions>"#
        ));
        assert_eq!(
            trust_address(&doc, TRUST_13_USERNAME_PORT).unwrap(),
            "https://sts.example.com/adfs/services/trust/13/usernamemixed"
        );
    }

    #[test]
    fn test_trust_address_missing_port_is_structural() {
        let doc = parse("<definitions><service/></definitions>");
        let err = trust_address(&doc, TRUST_13_USERNAME_PORT).unwrap_err();
        match err.kind {
            ErrorKind::Structural(message) => {
                assert!(message.contains("Port for trust type <UserNameWSTrustBinding_IWSTrust13Async>"));
            }
            other => panic!("expected Structural, got {other:?}"),
        }
    }
}

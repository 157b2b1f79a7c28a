//! Opaque security tokens.

use std::fmt;

/// A security token issued by the identity provider.
///
/// This is the inner XML of the `RequestedSecurityToken` element from the
/// issuer's response, carried verbatim into WS-Security headers. The token
/// is opaque to the client; its expiry is enforced by the server and an
/// expired token comes back as a SOAP fault on the next call.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurityToken {
    xml: String,
}

impl SecurityToken {
    pub fn new(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    /// The token XML, exactly as issued.
    pub fn as_xml(&self) -> &str {
        &self.xml
    }
}

// Tokens are credentials; keep them out of debug logs.
impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityToken")
            .field("xml", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token_xml() {
        let token = SecurityToken::new("<xenc:EncryptedData>secret</xenc:EncryptedData>");
        let out = format!("{token:?}");
        assert!(!out.contains("secret"));
        assert!(!out.contains("EncryptedData"));
    }
}

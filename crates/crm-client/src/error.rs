//! Error types for crm-soap-client.

/// Result type alias for crm-soap-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for crm-soap-client operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a structural error naming a missing element or attribute.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structural(message.into()))
    }

    /// Shorthand for a caller-state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::State(message.into()))
    }

    /// Returns true if this is a SOAP fault returned by the server.
    pub fn is_fault(&self) -> bool {
        matches!(self.kind, ErrorKind::Fault { .. })
    }

    /// Returns the server fault code if this is a SOAP fault.
    pub fn fault_code(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Fault { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// The kind of error that occurred.
///
/// The taxonomy is deliberate: `Structural` is an expected element or
/// attribute missing from a WSDL, policy, or response; `Transport` is a
/// response that is not a well-formed SOAP envelope; `Fault` is a well-formed
/// SOAP fault returned by the server; `State` is caller misuse detected
/// before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Expected element/attribute absent in a WSDL, policy, or response.
    #[error("{0}")]
    Structural(String),

    /// Connection succeeded but the response is not a usable SOAP envelope.
    #[error("Invalid SOAP response: HTTP {status}")]
    Transport { status: u16, body: String },

    /// Well-formed SOAP fault returned by the server.
    #[error("SOAP fault {code}: {reason}")]
    Fault { code: String, reason: String },

    /// Caller misuse, e.g. Update on an entity with no identifier.
    #[error("{0}")]
    State(String),

    /// Connection-level failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// XML parse error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection(err.to_string())
        } else {
            ErrorKind::Other(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<xmltree::ParseError> for Error {
    fn from(err: xmltree::ParseError) -> Self {
        Error::with_source(ErrorKind::Xml(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Other(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Config(format!("Invalid URL: {}", err)), err)
    }
}

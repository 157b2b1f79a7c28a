//! Typed entities and attribute values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Sentinel identifier for an entity that has not been created yet.
pub const EMPTY_GUID: Uuid = Uuid::nil();

/// A pointer to another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReference {
    pub logical_name: String,
    pub id: Uuid,
    /// Display name of the referenced record, when the server sent one.
    pub name: Option<String>,
}

/// Attributes of a linked entity returned through a FetchXML link alias.
///
/// The server flattens linked attributes into keys of the form
/// `alias.field`; all fields sharing one alias collect into a single value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasedValue {
    /// Logical name of the linked entity.
    pub logical_name: String,
    /// Field name to value, in the order the server sent them.
    pub values: BTreeMap<String, String>,
}

/// One decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Anything without a more specific wire type, as text.
    Raw(String),
    /// An option-set (picklist) selection.
    OptionSet(i32),
    /// A lookup to another entity.
    Reference(EntityReference),
    /// Linked-entity attributes grouped under their alias.
    Aliased(AliasedValue),
    /// A UTC timestamp.
    DateTime(DateTime<Utc>),
    /// A value paired with the server's display string for it.
    Formatted {
        value: Box<AttributeValue>,
        formatted: String,
    },
}

impl AttributeValue {
    /// Display text for this value, preferring what the server formatted.
    pub fn display_text(&self) -> String {
        match self {
            AttributeValue::Raw(s) => s.clone(),
            AttributeValue::OptionSet(n) => n.to_string(),
            AttributeValue::Reference(r) => r.name.clone().unwrap_or_else(|| r.id.to_string()),
            AttributeValue::Aliased(_) => String::new(),
            AttributeValue::DateTime(t) => t.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            AttributeValue::Formatted { formatted, .. } => formatted.clone(),
        }
    }

    /// The underlying value with any formatted wrapper removed.
    pub fn raw(&self) -> &AttributeValue {
        match self {
            AttributeValue::Formatted { value, .. } => value.raw(),
            other => other,
        }
    }
}

/// A CRM record: a logical name, an identifier, and a bag of attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub logical_name: String,
    pub id: Uuid,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Entity {
    /// A new, not-yet-created entity of the given type.
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            id: EMPTY_GUID,
            attributes: BTreeMap::new(),
        }
    }

    /// An entity referring to an existing record.
    pub fn with_id(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
            attributes: BTreeMap::new(),
        }
    }

    /// True until the entity has been created on the server.
    pub fn is_new(&self) -> bool {
        self.id == EMPTY_GUID
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: AttributeValue) -> &mut Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Set a plain text attribute.
    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.set(key, AttributeValue::Raw(value.into()))
    }
}

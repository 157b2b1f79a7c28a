//! Entity schema extraction and caching.
//!
//! RetrieveEntity responses are large and change rarely, so the extracted
//! schema is cached with a time-to-live taken from the connection settings.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use xmltree::Element;

use crm_soap_client::{xml, Error, Result};

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    pub logical_name: String,
    /// Wire type, e.g. `String`, `Picklist`, `Lookup`.
    pub attribute_type: Option<String>,
    pub display_label: Option<String>,
    pub required: bool,
}

/// One relationship an entity takes part in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub schema_name: String,
    pub related_entity: Option<String>,
}

/// Everything the client needs to know about an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntitySchema {
    pub logical_name: String,
    pub display_name: Option<String>,
    pub display_collection_name: Option<String>,
    pub description: Option<String>,
    pub object_type_code: Option<i32>,
    /// Attributes keyed by logical name.
    pub fields: BTreeMap<String, FieldSchema>,
    /// Logical names of attributes the server requires on create.
    pub mandatory: Vec<String>,
    /// Option-set values per picklist attribute.
    pub option_sets: BTreeMap<String, BTreeMap<i32, String>>,
    pub one_to_many: Vec<RelationshipSchema>,
    pub many_to_one: Vec<RelationshipSchema>,
    pub many_to_many: Vec<RelationshipSchema>,
}

/// Extract an [`EntitySchema`] from the `EntityMetadata` element of a
/// RetrieveEntity response.
pub fn extract_entity_schema(metadata: &Element) -> Result<EntitySchema> {
    let logical_name = metadata
        .get_child("LogicalName")
        .map(xml::text_of)
        .ok_or_else(|| Error::structural("Could not find LogicalName node in XML provided"))?;

    let mut schema = EntitySchema {
        logical_name,
        display_name: metadata.get_child("DisplayName").and_then(localized_label),
        display_collection_name: metadata
            .get_child("DisplayCollectionName")
            .and_then(localized_label),
        description: metadata.get_child("Description").and_then(localized_label),
        object_type_code: metadata
            .get_child("ObjectTypeCode")
            .and_then(|c| xml::text_of(c).trim().parse().ok()),
        ..EntitySchema::default()
    };

    if let Some(attributes) = metadata.get_child("Attributes") {
        for attribute in
            xml::child_elements(attributes).filter(|e| e.name == "AttributeMetadata")
        {
            let Some(name) = attribute.get_child("LogicalName").map(xml::text_of) else {
                continue;
            };

            let required = attribute
                .get_child("RequiredLevel")
                .and_then(|level| xml::descendant_text(level, "Value"))
                .is_some_and(|v| v == "ApplicationRequired" || v == "SystemRequired");
            if required {
                schema.mandatory.push(name.clone());
            }

            if let Some(option_set) = attribute.get_child("OptionSet") {
                let options = extract_options(option_set);
                if !options.is_empty() {
                    schema.option_sets.insert(name.clone(), options);
                }
            }

            schema.fields.insert(
                name.clone(),
                FieldSchema {
                    logical_name: name,
                    attribute_type: attribute.get_child("AttributeType").map(xml::text_of),
                    display_label: attribute.get_child("DisplayName").and_then(localized_label),
                    required,
                },
            );
        }
    }

    schema.one_to_many = extract_relationships(
        metadata,
        "OneToManyRelationships",
        "OneToManyRelationshipMetadata",
        "ReferencingEntity",
    );
    schema.many_to_one = extract_relationships(
        metadata,
        "ManyToOneRelationships",
        "OneToManyRelationshipMetadata",
        "ReferencedEntity",
    );
    schema.many_to_many = extract_relationships(
        metadata,
        "ManyToManyRelationships",
        "ManyToManyRelationshipMetadata",
        "IntersectEntityName",
    );

    Ok(schema)
}

fn extract_options(option_set: &Element) -> BTreeMap<i32, String> {
    let mut options = BTreeMap::new();
    for option in xml::descendants(option_set).filter(|e| e.name == "OptionMetadata") {
        let Some(value) = option
            .get_child("Value")
            .and_then(|v| xml::text_of(v).trim().parse::<i32>().ok())
        else {
            continue;
        };
        let label = option
            .get_child("Label")
            .and_then(localized_label)
            .unwrap_or_default();
        options.insert(value, label);
    }
    options
}

fn extract_relationships(
    metadata: &Element,
    container: &str,
    element: &str,
    related_field: &str,
) -> Vec<RelationshipSchema> {
    let Some(container) = metadata.get_child(container) else {
        return Vec::new();
    };
    xml::child_elements(container)
        .filter(|e| e.name == element)
        .filter_map(|rel| {
            let schema_name = rel.get_child("SchemaName").map(xml::text_of)?;
            Some(RelationshipSchema {
                schema_name,
                related_entity: rel.get_child(related_field).map(xml::text_of),
            })
        })
        .collect()
}

fn localized_label(el: &Element) -> Option<String> {
    let label = xml::find_descendant(el, "UserLocalizedLabel")?;
    xml::descendant_text(label, "Label")
}

/// Cache for extracted entity schemas.
pub trait SchemaCache: Send + Sync {
    /// Store a schema for `ttl`.
    fn save(&self, key: &str, schema: &EntitySchema, ttl: Duration) -> Result<()>;

    /// Load a schema, or `None` when absent or expired.
    fn load(&self, key: &str) -> Result<Option<EntitySchema>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSchema {
    schema: EntitySchema,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl StoredSchema {
    fn new(schema: &EntitySchema, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| Error::state("Schema cache TTL out of range"))?;
        Ok(Self {
            schema: schema.clone(),
            expires_at: chrono::Utc::now() + ttl,
        })
    }

    fn fresh(self) -> Option<EntitySchema> {
        (chrono::Utc::now() < self.expires_at).then_some(self.schema)
    }
}

/// In-process schema cache; the default.
#[derive(Debug, Default)]
pub struct MemorySchemaCache {
    entries: Mutex<HashMap<String, StoredSchema>>,
}

impl MemorySchemaCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchemaCache for MemorySchemaCache {
    fn save(&self, key: &str, schema: &EntitySchema, ttl: Duration) -> Result<()> {
        let stored = StoredSchema::new(schema, ttl)?;
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), stored);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<EntitySchema>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match entries.get(key).cloned() {
            None => Ok(None),
            Some(stored) => {
                let fresh = stored.fresh();
                if fresh.is_none() {
                    entries.remove(key);
                }
                Ok(fresh)
            }
        }
    }
}

/// Schema cache persisted as one JSON file per entity.
#[derive(Debug, Clone)]
pub struct FileSchemaCache {
    base_path: PathBuf,
}

impl FileSchemaCache {
    /// Cache under the platform cache directory.
    pub fn new() -> Result<Self> {
        let base_path = dirs::cache_dir()
            .ok_or_else(|| Error::state("Could not determine a cache directory"))?
            .join("crm-soap-api")
            .join("schemas");
        Ok(Self { base_path })
    }

    /// Cache under a custom directory.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            base_path: path.as_ref().to_path_buf(),
        }
    }

    fn schema_path(&self, key: &str) -> PathBuf {
        let safe_key = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect::<String>();
        self.base_path.join(format!("{safe_key}.json"))
    }
}

impl SchemaCache for FileSchemaCache {
    fn save(&self, key: &str, schema: &EntitySchema, ttl: Duration) -> Result<()> {
        if !self.base_path.exists() {
            std::fs::create_dir_all(&self.base_path)?;
        }
        let stored = StoredSchema::new(schema, ttl)?;
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| Error::with_source(crm_soap_client::ErrorKind::Other(e.to_string()), e))?;
        std::fs::write(self.schema_path(key), json)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<EntitySchema>> {
        let path = self.schema_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        let Ok(stored) = serde_json::from_str::<StoredSchema>(&json) else {
            // Unreadable cache entries are treated as absent.
            debug!(key, "discarding unreadable schema cache entry");
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        };
        Ok(stored.fresh())
    }
}

//! Decoding attribute key/value pairs from SOAP responses.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use uuid::Uuid;
use xmltree::Element;

use crate::entity::{AliasedValue, AttributeValue, Entity, EntityReference};
use crm_soap_client::{xml, Error, Result};

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Decode every `KeyValuePairOfstringanyType` under `container` into typed
/// attribute values.
///
/// The wire type comes from the `i:type` attribute on the value element.
/// A key that is already present is assumed to be the formatted rendering of
/// this value and the two are folded into [`AttributeValue::Formatted`];
/// aliased values instead merge field-by-field under their alias.
pub fn add_attributes(
    target: &mut BTreeMap<String, AttributeValue>,
    container: &Element,
) -> Result<()> {
    for pair in xml::descendants(container).filter(|e| e.name == "KeyValuePairOfstringanyType") {
        let key = required_text(pair, "key")?;
        let value_el = pair
            .get_child("value")
            .ok_or_else(|| Error::structural("Could not find value node in XML provided"))?;
        let value_type = value_el
            .attributes
            .get("type")
            .map(|t| xml::strip_ns(t))
            .unwrap_or("");

        match value_type {
            "AliasedValue" => {
                // The key is `alias.field`; everything sharing the alias
                // collects into one value.
                let alias = key.split('.').next().unwrap_or(&key).to_string();
                let logical_name = required_text(value_el, "EntityLogicalName")?;
                let field = required_text(value_el, "AttributeLogicalName")?;
                let field_value = required_text(value_el, "Value")?;

                match target.get_mut(&alias) {
                    Some(AttributeValue::Aliased(aliased)) => {
                        aliased.values.insert(field, field_value);
                    }
                    _ => {
                        let mut aliased = AliasedValue {
                            logical_name,
                            values: BTreeMap::new(),
                        };
                        aliased.values.insert(field, field_value);
                        target.insert(alias, AttributeValue::Aliased(aliased));
                    }
                }
            }
            "EntityReference" => {
                let logical_name = required_text(value_el, "LogicalName")?;
                let id_text = required_text(value_el, "Id")?;
                let id = Uuid::parse_str(id_text.trim()).map_err(|_| {
                    Error::structural(format!("Invalid Id <{id_text}> in EntityReference value"))
                })?;
                let name = xml::descendant_text(value_el, "Name")
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty());
                insert(
                    target,
                    key,
                    AttributeValue::Reference(EntityReference {
                        logical_name,
                        id,
                        name,
                    }),
                );
            }
            "OptionSetValue" => {
                let raw = required_text(value_el, "Value")?;
                let value = raw.trim().parse::<i32>().map_err(|_| {
                    Error::structural(format!("Invalid OptionSetValue <{raw}> in XML provided"))
                })?;
                insert(target, key, AttributeValue::OptionSet(value));
            }
            "dateTime" => {
                let text = xml::text_of(value_el);
                // Anything off the expected wire format stays as text.
                let value = NaiveDateTime::parse_from_str(text.trim(), DATE_TIME_FORMAT)
                    .map(|t| AttributeValue::DateTime(t.and_utc()))
                    .unwrap_or(AttributeValue::Raw(text));
                insert(target, key, value);
            }
            _ => {
                insert(target, key, AttributeValue::Raw(xml::text_of(value_el)));
            }
        }
    }
    Ok(())
}

/// Fold `KeyValuePairOfstringstring` display strings into the attribute map.
pub fn add_formatted_values(target: &mut BTreeMap<String, AttributeValue>, container: &Element) {
    for pair in xml::descendants(container).filter(|e| e.name == "KeyValuePairOfstringstring") {
        let Some(key) = xml::descendant_text(pair, "key") else {
            continue;
        };
        let formatted = pair.get_child("value").map(xml::text_of).unwrap_or_default();

        match target.remove(&key) {
            None => {
                target.insert(key, AttributeValue::Raw(formatted));
            }
            Some(AttributeValue::Formatted { value, .. }) => {
                target.insert(key, AttributeValue::Formatted { value, formatted });
            }
            Some(existing) => {
                target.insert(
                    key,
                    AttributeValue::Formatted {
                        value: Box::new(existing),
                        formatted,
                    },
                );
            }
        }
    }
}

/// Build an [`Entity`] from an `Entity` element of a retrieve response:
/// typed attributes first, then formatted values, then the record id.
pub fn parse_entity_element(entity_el: &Element, logical_name: &str) -> Result<Entity> {
    let mut entity = Entity::new(logical_name);

    if let Some(attributes) = entity_el.get_child("Attributes") {
        add_attributes(&mut entity.attributes, attributes)?;
    }
    if let Some(formatted) = entity_el.get_child("FormattedValues") {
        add_formatted_values(&mut entity.attributes, formatted);
    }
    if let Some(id_el) = entity_el.get_child("Id") {
        let text = xml::text_of(id_el);
        if let Ok(id) = Uuid::parse_str(text.trim()) {
            entity.id = id;
        }
    }

    Ok(entity)
}

/// Insert respecting the raw/formatted pairing rule: whichever of the two
/// arrives second, the typed value always ends up in `value` and the display
/// string in `formatted`.
fn insert(target: &mut BTreeMap<String, AttributeValue>, key: String, value: AttributeValue) {
    match target.remove(&key) {
        None => {
            target.insert(key, value);
        }
        Some(existing) => {
            target.insert(
                key,
                AttributeValue::Formatted {
                    formatted: existing.display_text(),
                    value: Box::new(value),
                },
            );
        }
    }
}

fn required_text(el: &Element, name: &str) -> Result<String> {
    xml::descendant_text(el, name)
        .ok_or_else(|| Error::structural(format!("Could not find {name} node in XML provided")))
}

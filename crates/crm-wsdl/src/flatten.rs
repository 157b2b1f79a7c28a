//! WSDL import flattening.
//!
//! The discovery, organization, and ADFS authentication WSDLs all spread
//! their definitions across imported documents. Later stages (policy lookup,
//! endpoint resolution) expect one tree, so every `import` carrying a
//! `location`/`schemaLocation` is fetched and spliced in place.

use tracing::debug;
use xmltree::{Element, XMLNode};

use crate::fetch::WsdlFetcher;
use crm_soap_client::Result;

/// Merge every imported document into `root`, in place.
///
/// Runs to a fixpoint: imports inside fetched documents are resolved on the
/// next pass, so flattening applies at every depth. Imported `definitions`
/// contribute their attributes (except `targetNamespace`) to the root
/// definitions node and their children are spliced at the position of the
/// import; any other imported root replaces the import node directly. A
/// fetch or parse failure aborts the whole operation. An `import` without a
/// location attribute is not an import reference and is left untouched.
pub async fn flatten<F: WsdlFetcher>(root: &mut Element, fetcher: &F) -> Result<()> {
    loop {
        let Some(location) = first_import_location(root) else {
            return Ok(());
        };
        debug!(location, "importing WSDL data");
        let text = fetcher.fetch(&location).await?;
        let imported = Element::parse(text.as_bytes()).map_err(crm_soap_client::Error::from)?;
        splice_import(root, &location, imported);
    }
}

fn is_import(el: &Element) -> bool {
    el.name == "import"
}

fn import_location(el: &Element) -> Option<&str> {
    el.attributes
        .get("location")
        .or_else(|| el.attributes.get("schemaLocation"))
        .map(String::as_str)
}

/// First import node (document order) that carries a location.
fn first_import_location(el: &Element) -> Option<String> {
    for child in el.children.iter().filter_map(XMLNode::as_element) {
        if is_import(child) {
            if let Some(location) = import_location(child) {
                return Some(location.to_string());
            }
            // No location to resolve; leave the node alone.
            continue;
        }
        if let Some(found) = first_import_location(child) {
            return Some(found);
        }
    }
    None
}

/// Replace the first import node referencing `location` with the fetched
/// document.
fn splice_import(root: &mut Element, location: &str, imported: Element) {
    let replacement = if imported.name == "definitions" {
        merge_definition_attributes(root, &imported);
        imported.children
    } else {
        vec![XMLNode::Element(imported)]
    };
    let mut replacement = Some(replacement);
    splice_at(root, location, &mut replacement);
}

/// Copy all non-`targetNamespace` attributes of an imported definitions node
/// onto the root definitions node (namespace declarations, mostly).
fn merge_definition_attributes(root: &mut Element, imported: &Element) {
    let Some(definitions) = definitions_mut(root) else {
        return;
    };
    for (name, value) in &imported.attributes {
        if name != "targetNamespace" {
            definitions.attributes.insert(name.clone(), value.clone());
        }
    }
}

fn definitions_mut(el: &mut Element) -> Option<&mut Element> {
    if el.name == "definitions" {
        return Some(el);
    }
    for child in el.children.iter_mut().filter_map(XMLNode::as_mut_element) {
        if let Some(found) = definitions_mut(child) {
            return Some(found);
        }
    }
    None
}

fn splice_at(el: &mut Element, location: &str, replacement: &mut Option<Vec<XMLNode>>) -> bool {
    let target = el.children.iter().position(|node| {
        node.as_element()
            .is_some_and(|c| is_import(c) && import_location(c) == Some(location))
    });

    if let Some(index) = target {
        if let Some(nodes) = replacement.take() {
            el.children.splice(index..=index, nodes);
        }
        return true;
    }

    for child in el.children.iter_mut().filter_map(XMLNode::as_mut_element) {
        if splice_at(child, location, replacement) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_soap_client::{xml, Error, ErrorKind};
    use std::collections::HashMap;

    struct MapFetcher {
        documents: HashMap<&'static str, &'static str>,
    }

    impl WsdlFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> crm_soap_client::Result<String> {
            self.documents
                .get(url)
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    Error::new(ErrorKind::Connection(format!("no document at {url}")))
                })
        }
    }

    fn parse(s: &str) -> Element {
        Element::parse(s.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_flatten_is_noop_on_flat_document() {
        let mut doc = parse(
            r#"<definitions targetNamespace="urn:root">
                 <types><schema/></types>
                 <service name="OrganizationService"><port name="P"/></service>
               </definitions>"#,
        );
        let before = xml::to_string(&doc).unwrap();

        let fetcher = MapFetcher {
            documents: HashMap::new(),
        };
        flatten(&mut doc, &fetcher).await.unwrap();

        assert_eq!(xml::to_string(&doc).unwrap(), before);
    }

    #[tokio::test]
    async fn test_flatten_merges_nested_imports() {
        let mut doc = parse(
            r#"<definitions targetNamespace="urn:root">
                 <before/>
                 <import location="http://x/level1.wsdl"/>
                 <after/>
               </definitions>"#,
        );

        let mut documents = HashMap::new();
        documents.insert(
            "http://x/level1.wsdl",
            r#"<definitions targetNamespace="urn:level1" one="1">
                 <message name="m1"/>
                 <import location="http://x/level2.wsdl"/>
               </definitions>"#,
        );
        documents.insert(
            "http://x/level2.wsdl",
            r#"<definitions targetNamespace="urn:level2" two="2">
                 <message name="m2"/>
               </definitions>"#,
        );

        flatten(&mut doc, &MapFetcher { documents }).await.unwrap();

        // No import nodes remain anywhere.
        assert!(xml::descendants(&doc).all(|e| e.name != "import"));

        // Imported definitions attributes land on the root, except
        // targetNamespace which stays the root's own.
        assert_eq!(doc.attributes.get("one").map(String::as_str), Some("1"));
        assert_eq!(doc.attributes.get("two").map(String::as_str), Some("2"));
        assert_eq!(
            doc.attributes.get("targetNamespace").map(String::as_str),
            Some("urn:root")
        );

        // Children spliced in the position the import occupied.
        let names: Vec<_> = xml::child_elements(&doc).map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["before", "message", "message", "after"]);
    }

    #[tokio::test]
    async fn test_schema_import_replaces_node_in_place() {
        let mut doc = parse(
            r#"<definitions targetNamespace="urn:root">
                 <types>
                   <schema>
                     <import schemaLocation="http://x/types.xsd"/>
                   </schema>
                 </types>
               </definitions>"#,
        );

        let mut documents = HashMap::new();
        documents.insert(
            "http://x/types.xsd",
            r#"<schema targetNamespace="urn:types"><element name="Account"/></schema>"#,
        );

        flatten(&mut doc, &MapFetcher { documents }).await.unwrap();

        let inner = xml::find_descendant(doc.get_child("types").unwrap(), "schema").unwrap();
        let imported = xml::find_descendant(inner, "schema").unwrap();
        assert!(xml::find_descendant(imported, "element").is_some());
        assert!(xml::descendants(&doc).all(|e| e.name != "import"));
    }

    #[tokio::test]
    async fn test_import_without_location_is_left_untouched() {
        let mut doc = parse(
            r#"<definitions targetNamespace="urn:root">
                 <import namespace="urn:other"/>
               </definitions>"#,
        );

        let fetcher = MapFetcher {
            documents: HashMap::new(),
        };
        flatten(&mut doc, &fetcher).await.unwrap();

        assert!(xml::find_descendant(&doc, "import").is_some());
    }

    #[tokio::test]
    async fn test_failed_import_propagates() {
        let mut doc = parse(
            r#"<definitions targetNamespace="urn:root">
                 <import location="http://x/missing.wsdl"/>
               </definitions>"#,
        );

        let fetcher = MapFetcher {
            documents: HashMap::new(),
        };
        let err = flatten(&mut doc, &fetcher).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Connection(_)));
    }
}

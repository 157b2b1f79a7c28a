//! Element-tree helpers shared by the WSDL and response parsers.
//!
//! All lookups compare by local name only: the server mixes namespace
//! prefixes freely (`b:`, `c:`, `d:`) and the prefixes carry no meaning for
//! the shapes we parse.

use xmltree::{Element, XMLNode};

/// Strip a namespace prefix from a qualified name (`b:OptionSetValue` ->
/// `OptionSetValue`).
pub fn strip_ns(name: &str) -> &str {
    match name.find(':') {
        None => name,
        Some(index) => &name[index + 1..],
    }
}

/// Iterator over the element children of a node.
pub fn child_elements(el: &Element) -> impl DoubleEndedIterator<Item = &Element> {
    el.children.iter().filter_map(XMLNode::as_element)
}

/// Depth-first iterator over all descendant elements, excluding `el` itself.
pub fn descendants(el: &Element) -> Descendants<'_> {
    Descendants {
        stack: child_elements(el).rev().collect(),
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(child_elements(next).rev());
        Some(next)
    }
}

/// Find the first descendant (document order) with the given local name.
pub fn find_descendant<'a>(el: &'a Element, name: &str) -> Option<&'a Element> {
    descendants(el).find(|e| e.name == name)
}

/// Concatenated text content of an element, including nested elements.
pub fn text_of(el: &Element) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

fn collect_text(el: &Element, out: &mut String) {
    for node in &el.children {
        match node {
            XMLNode::Text(t) | XMLNode::CData(t) => out.push_str(t),
            XMLNode::Element(e) => collect_text(e, out),
            _ => {}
        }
    }
}

/// Text content of the first descendant with the given local name.
pub fn descendant_text(el: &Element, name: &str) -> Option<String> {
    find_descendant(el, name).map(text_of)
}

/// Escape a string for use in XML text or attribute content.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serialize an element back to an XML string without a document declaration.
pub fn to_string(el: &Element) -> crate::Result<String> {
    let config = xmltree::EmitterConfig::new()
        .write_document_declaration(false)
        .perform_indent(false);
    let mut buf = Vec::new();
    el.write_with_config(&mut buf, config)
        .map_err(|e| crate::Error::new(crate::ErrorKind::Xml(e.to_string())))?;
    String::from_utf8(buf).map_err(|e| crate::Error::new(crate::ErrorKind::Xml(e.to_string())))
}

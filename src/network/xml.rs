//! XML reply trees and format conversion.
//!
//! Junos speaks XML natively. Replies are parsed into an owned
//! [`XmlElement`] tree, which can be serialized back to text with
//! [`to_text`] or flattened into a nested JSON mapping with
//! [`to_structured`] when a caller asks for a non-native encoding.
//!
//! The mapping follows the usual XML-to-dict conventions:
//!
//! - an element with neither attributes nor children becomes its text
//! - attributes become `@name` keys
//! - repeated child elements collapse into an array
//! - text alongside children is kept under `#text`
//!
//! Namespace declarations are kept as `xmlns` / `xmlns:prefix` attributes on
//! the element that introduces them, so prefixed names such as
//! `junos:style` stay bound when a tree is written back out.

use serde_json::{Map, Value};
use xml::namespace::Namespace;
use xml::reader::XmlEvent;
use xml::writer::{EmitterConfig, XmlEvent as WriterEvent};
use xml::ParserConfig;

use crate::error::{NetworkError, Result};

/// An owned XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Element name, including a namespace prefix when one was present
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Direct text content
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Look up an attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct text content, if any
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First element at a `/`-separated path of child names, depth first.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let Some(first) = segments.next() else {
            return Some(self);
        };
        let rest = segments.collect::<Vec<_>>().join("/");
        self.children
            .iter()
            .filter(|c| c.name == first)
            .find_map(|child| child.find(&rest))
    }

    /// Namespace declarations (`xmlns`, `xmlns:prefix`) made on this element
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter(|(name, _)| is_declaration(name))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Copy the declarations of `parent` that this element does not make
    /// itself, so it stays well-formed once detached from the parent.
    pub fn with_inherited_namespaces(mut self, parent: &XmlElement) -> Self {
        let inherited: Vec<(String, String)> = parent
            .namespace_declarations()
            .filter(|(name, _)| self.attr(name).is_none())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.attributes.splice(0..0, inherited);
        self
    }

    /// Text at a `/`-separated path, trimmed
    pub fn find_text(&self, path: &str) -> Option<&str> {
        self.find(path).and_then(|el| el.text()).map(str::trim)
    }
}

impl std::str::FromStr for XmlElement {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Input accepted by [`to_structured`]: raw XML text or an already-parsed tree.
#[derive(Debug, Clone, Copy)]
pub enum XmlSource<'a> {
    Text(&'a str),
    Tree(&'a XmlElement),
}

impl<'a> From<&'a str> for XmlSource<'a> {
    fn from(value: &'a str) -> Self {
        XmlSource::Text(value)
    }
}

impl<'a> From<&'a String> for XmlSource<'a> {
    fn from(value: &'a String) -> Self {
        XmlSource::Text(value.as_str())
    }
}

impl<'a> From<&'a XmlElement> for XmlSource<'a> {
    fn from(value: &'a XmlElement) -> Self {
        XmlSource::Tree(value)
    }
}

/// Parse XML text into an element tree.
pub fn parse(input: &str) -> Result<XmlElement> {
    let reader = ParserConfig::new()
        .whitespace_to_characters(true)
        .cdata_to_characters(true)
        .ignore_comments(true)
        .create_reader(input.as_bytes());

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut scopes: Vec<Namespace> = Vec::new();
    let mut root: Option<XmlElement> = None;

    for event in reader {
        match event {
            Ok(XmlEvent::StartElement {
                name,
                attributes,
                namespace,
            }) => {
                let mut element = XmlElement::new(qualified(name.prefix.as_deref(), &name.local_name));
                element.attributes = declared_namespaces(scopes.last(), &namespace);
                element.attributes.extend(
                    attributes
                        .into_iter()
                        .map(|a| (qualified(a.name.prefix.as_deref(), &a.name.local_name), a.value)),
                );
                stack.push(element);
                scopes.push(namespace);
            }
            Ok(XmlEvent::Characters(text)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Ok(XmlEvent::EndElement { .. }) => {
                scopes.pop();
                let Some(mut element) = stack.pop() else {
                    return Err(NetworkError::parse("unbalanced end tag"));
                };
                // Indentation between child elements is not content.
                if !element.children.is_empty()
                    && element.text.as_deref().is_some_and(|t| t.trim().is_empty())
                {
                    element.text = None;
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(_) => {}
            Err(e) => return Err(NetworkError::parse(format!("malformed XML: {}", e))),
        }
    }

    root.ok_or_else(|| NetworkError::parse("malformed XML: no root element"))
}

/// Bindings in `scope` that are new or changed relative to the parent scope.
fn declared_namespaces(parent: Option<&Namespace>, scope: &Namespace) -> Vec<(String, String)> {
    scope
        .0
        .iter()
        .filter(|(prefix, _)| !matches!(prefix.as_str(), "xml" | "xmlns"))
        .filter(|(prefix, uri)| {
            let inherited = parent
                .and_then(|p| p.0.get(prefix.as_str()))
                .map_or("", String::as_str);
            uri.as_str() != inherited
        })
        .map(|(prefix, uri)| {
            let name = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            (name, uri.clone())
        })
        .collect()
}

fn is_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// Serialize an element tree back to XML text.
pub fn to_text(element: &XmlElement) -> Result<String> {
    let mut buffer = Vec::new();
    {
        let mut writer = EmitterConfig::new()
            .write_document_declaration(false)
            .perform_indent(false)
            .create_writer(&mut buffer);
        write_element(&mut writer, element)?;
    }
    String::from_utf8(buffer).map_err(|e| NetworkError::parse(format!("invalid UTF-8: {}", e)))
}

fn write_element<W: std::io::Write>(
    writer: &mut xml::writer::EventWriter<W>,
    element: &XmlElement,
) -> Result<()> {
    validate_name(&element.name)?;

    let mut start = WriterEvent::start_element(element.name.as_str());
    for (name, value) in &element.attributes {
        if name == "xmlns" {
            start = start.default_ns(value.as_str());
            continue;
        }
        if let Some(prefix) = name.strip_prefix("xmlns:") {
            start = start.ns(prefix, value.as_str());
            continue;
        }
        validate_name(name)?;
        start = start.attr(name.as_str(), value.as_str());
    }
    writer.write(start).map_err(emit_error)?;

    if let Some(text) = element.text.as_deref() {
        if !text.is_empty() {
            writer.write(WriterEvent::characters(text)).map_err(emit_error)?;
        }
    }
    for child in &element.children {
        write_element(writer, child)?;
    }

    writer.write(WriterEvent::end_element()).map_err(emit_error)
}

/// Convert XML text or a parsed tree into a nested JSON mapping.
pub fn to_structured<'a>(value: impl Into<XmlSource<'a>>) -> Result<Value> {
    let parsed;
    let element = match value.into() {
        XmlSource::Text(text) => {
            parsed = parse(text)?;
            &parsed
        }
        XmlSource::Tree(tree) => {
            validate_name(&tree.name)?;
            tree
        }
    };

    let mut map = Map::new();
    map.insert(element.name.clone(), element_value(element));
    Ok(Value::Object(map))
}

fn element_value(element: &XmlElement) -> Value {
    if element.attributes.is_empty() && element.children.is_empty() {
        return Value::String(element.text.clone().unwrap_or_default());
    }

    let mut map = Map::new();
    for (name, value) in &element.attributes {
        map.insert(format!("@{}", name), Value::String(value.clone()));
    }
    for child in &element.children {
        let value = element_value(child);
        match map.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(child.name.clone(), value);
            }
        }
    }
    if let Some(text) = element.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        map.insert("#text".to_string(), Value::String(text.to_string()));
    }
    Value::Object(map)
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(NetworkError::parse(format!("invalid XML name '{}'", name)))
    }
}

fn emit_error(e: xml::writer::Error) -> NetworkError {
    NetworkError::parse(format!("unable to serialize XML: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const INTERFACES: &str = r#"<interface-information>
  <physical-interface>
    <name>ge-0/0/0</name>
    <oper-status>up</oper-status>
  </physical-interface>
  <physical-interface>
    <name>ge-0/0/1</name>
    <oper-status>down</oper-status>
  </physical-interface>
</interface-information>"#;

    #[test]
    fn test_parse_nested_tree() {
        let tree = parse(INTERFACES).unwrap();
        assert_eq!(tree.name, "interface-information");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.text, None);
        assert_eq!(tree.find_text("physical-interface/name"), Some("ge-0/0/0"));
        assert_eq!(tree.children_named("physical-interface").count(), 2);
    }

    #[test]
    fn test_parse_keeps_attributes_and_text() {
        let tree = parse(r#"<output format="text">  show version  </output>"#).unwrap();
        assert_eq!(tree.attr("format"), Some("text"));
        assert_eq!(tree.text(), Some("  show version  "));
    }

    #[test]
    fn test_parse_unescapes_entities() {
        let tree = parse("<log>a &amp; b &lt;c&gt;</log>").unwrap();
        assert_eq!(tree.text(), Some("a & b <c>"));
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse("<a><b></a>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let err = parse("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_structured_from_text() {
        let value = to_structured(INTERFACES).unwrap();
        assert_eq!(
            value,
            json!({
                "interface-information": {
                    "physical-interface": [
                        {"name": "ge-0/0/0", "oper-status": "up"},
                        {"name": "ge-0/0/1", "oper-status": "down"}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_structured_from_tree_with_attributes() {
        let tree = XmlElement::new("configuration")
            .with_attr("changed-seconds", "1700000000")
            .with_child(XmlElement::new("version").with_text("21.4R3"));
        let value = to_structured(&tree).unwrap();
        assert_eq!(
            value,
            json!({
                "configuration": {
                    "@changed-seconds": "1700000000",
                    "version": "21.4R3"
                }
            })
        );
    }

    #[test]
    fn test_structured_rejects_invalid_tree() {
        let err = to_structured(&XmlElement::new("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_to_text_escapes_and_reparses() {
        let tree = XmlElement::new("load-configuration")
            .with_attr("action", "merge")
            .with_child(XmlElement::new("configuration-text").with_text("set a \"b\" & <c>"));
        let text = to_text(&tree).unwrap();
        assert!(text.starts_with("<load-configuration action=\"merge\">"));
        assert!(text.contains("&amp;"));
        assert!(text.contains("&lt;c>") || text.contains("&lt;c&gt;"));

        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed, tree);
    }

    const JUNOS_REPLY: &str = r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" xmlns:junos="http://xml.juniper.net/junos/21.4R3/junos">
  <interface-information xmlns="http://xml.juniper.net/junos/21.4R3/junos-interface" junos:style="terse">
    <physical-interface>
      <name>ge-0/0/0</name>
      <oper-status>up</oper-status>
    </physical-interface>
  </interface-information>
</rpc-reply>"#;

    #[test]
    fn test_parse_keeps_namespace_declarations() {
        let tree = parse(JUNOS_REPLY).unwrap();
        assert_eq!(
            tree.namespace_declarations().collect::<Vec<_>>(),
            vec![
                ("xmlns", "urn:ietf:params:xml:ns:netconf:base:1.0"),
                ("xmlns:junos", "http://xml.juniper.net/junos/21.4R3/junos"),
            ]
        );

        let info = &tree.children[0];
        assert_eq!(info.attr("junos:style"), Some("terse"));
        assert_eq!(
            info.attr("xmlns"),
            Some("http://xml.juniper.net/junos/21.4R3/junos-interface")
        );
        assert_eq!(info.attr("xmlns:junos"), None);
        assert_eq!(info.children[0].namespace_declarations().count(), 0);
    }

    #[test]
    fn test_prefixed_reply_survives_text_round_trip() {
        let tree = parse(JUNOS_REPLY).unwrap();
        let text = to_text(&tree).unwrap();
        assert!(text.contains("xmlns:junos=\"http://xml.juniper.net/junos/21.4R3/junos\""));

        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed, tree);

        let value = to_structured(text.as_str()).unwrap();
        assert_eq!(
            value["rpc-reply"]["interface-information"]["@junos:style"],
            json!("terse")
        );
    }

    #[test]
    fn test_detached_child_inherits_declarations() {
        let mut tree = parse(JUNOS_REPLY).unwrap();
        let parent = tree.clone();
        let info = tree.children.swap_remove(0).with_inherited_namespaces(&parent);

        assert_eq!(
            info.attr("xmlns:junos"),
            Some("http://xml.juniper.net/junos/21.4R3/junos")
        );
        assert_eq!(
            info.attr("xmlns"),
            Some("http://xml.juniper.net/junos/21.4R3/junos-interface")
        );

        let text = to_text(&info).unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.attr("junos:style"), Some("terse"));
        assert_eq!(reparsed.find_text("physical-interface/name"), Some("ge-0/0/0"));
    }

    #[test]
    fn test_to_text_rejects_invalid_name() {
        let tree = XmlElement::new("rpc").with_child(XmlElement::new("bad name"));
        let err = to_text(&tree).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}

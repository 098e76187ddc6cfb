//! Textual DOM form of an [`AslDocument`]: every node becomes a `<node>`
//! element whose attributes carry the variant name, key and value, so a
//! decoded stream can be stored, inspected and diffed as XML.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{DomError, DomResult};
use crate::ir::{AslDocument, Descriptor, Node, PatternPayload, Unit, Value, PATTERN_CLASS_ID};

pub const ROOT_TAG: &str = "asl";
pub const NODE_TAG: &str = "node";
const PATTERN_DATA_TYPE: &str = "KisPatternData";
const PATTERN_DATA_KEY: &str = "Data";

/// A generic element. Attributes live in a sorted map, so two elements
/// compare equal regardless of the order their attributes were written in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomElement {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<DomElement>,
    pub text: String,
}

impl DomElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    fn require(&self, attribute: &'static str) -> DomResult<&str> {
        self.attr(attribute).ok_or_else(|| DomError::MissingAttribute {
            node_type: self.attr("type").unwrap_or(&self.tag).to_string(),
            attribute,
        })
    }

    pub fn from_xml(xml: &str) -> DomResult<DomElement> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<DomElement> = Vec::new();
        let mut root = None;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => stack.push(element_from_start(&e)?),
                Event::Empty(e) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DomError::UnexpectedElement("closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        root.ok_or_else(|| DomError::UnexpectedElement("empty document".to_string()))
    }

    pub fn to_xml(&self) -> DomResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(|e| DomError::InvalidValue {
            what: "XML output",
            value: e.to_string(),
        })
    }
}

fn element_from_start(e: &BytesStart<'_>) -> DomResult<DomElement> {
    let mut element = DomElement::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

fn attach(
    stack: &mut [DomElement],
    root: &mut Option<DomElement>,
    element: DomElement,
) -> DomResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(DomError::UnexpectedElement(element.tag)),
    }
    Ok(())
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &DomElement) -> DomResult<()> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() && element.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    if !element.text.is_empty() {
        writer.write_event(Event::CData(BytesCData::new(element.text.as_str())))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.tag.as_str())))?;
    Ok(())
}

/// Maps a document onto an `<asl>` element.
pub fn document_to_dom(doc: &AslDocument) -> DomElement {
    let mut root = DomElement::new(ROOT_TAG);
    root.children = doc.children.iter().map(node_to_dom).collect();
    root
}

fn typed_element(type_name: &str, key: &str) -> DomElement {
    let mut element = DomElement::new(NODE_TAG);
    element.set_attr("type", type_name);
    element.set_attr("key", key);
    element
}

pub fn node_to_dom(node: &Node) -> DomElement {
    let mut element = typed_element(node.value.type_name(), &node.key);
    match &node.value {
        Value::Descriptor(d) => {
            element.set_attr("classId", d.class_id.as_str());
            element.set_attr("name", d.name.as_str());
            element.children = d.children.iter().map(node_to_dom).collect();
        }
        Value::List(items) => {
            element.children = items.iter().map(node_to_dom).collect();
        }
        Value::Double(v) => element.set_attr("value", v.to_string()),
        Value::UnitFloat { unit, value } => {
            element.set_attr("unit", unit.code());
            element.set_attr("value", value.to_string());
        }
        Value::Text(s) => element.set_attr("value", s.as_str()),
        Value::Enum { type_id, value } => {
            element.set_attr("typeId", type_id.as_str());
            element.set_attr("value", value.as_str());
        }
        Value::Integer(v) => element.set_attr("value", v.to_string()),
        Value::Boolean(v) => element.set_attr("value", if *v { "1" } else { "0" }),
        Value::Pattern(p) => return pattern_to_dom(&node.key, p),
    }
    element
}

fn pattern_to_dom(key: &str, pattern: &PatternPayload) -> DomElement {
    let mut element = typed_element("Descriptor", key);
    element.set_attr("classId", PATTERN_CLASS_ID);
    element.set_attr("name", "");

    let mut name = typed_element("Text", "Nm  ");
    name.set_attr("value", pattern.name.as_str());
    let mut uuid = typed_element("Text", "Idnt");
    uuid.set_attr("value", pattern.uuid.as_str());
    let mut data = typed_element(PATTERN_DATA_TYPE, PATTERN_DATA_KEY);

    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(&pattern.data);
    data.text = BASE64.encode(encoder.finish().unwrap_or_default());

    element.children = vec![name, uuid, data];
    element
}

/// Inverse of [`document_to_dom`].
pub fn dom_to_document(root: &DomElement) -> DomResult<AslDocument> {
    if root.tag != ROOT_TAG {
        return Err(DomError::UnexpectedElement(root.tag.clone()));
    }
    let children = root
        .children
        .iter()
        .map(node_from_dom)
        .collect::<DomResult<Vec<_>>>()?;
    Ok(AslDocument { children })
}

fn parse_number<T: std::str::FromStr>(what: &'static str, value: &str) -> DomResult<T> {
    value.trim().parse().map_err(|_| DomError::InvalidValue {
        what,
        value: value.to_string(),
    })
}

pub fn node_from_dom(element: &DomElement) -> DomResult<Node> {
    if element.tag != NODE_TAG {
        return Err(DomError::UnexpectedElement(element.tag.clone()));
    }
    let key = element.attr("key").unwrap_or_default();
    let value = match element.require("type")? {
        "Descriptor" => {
            let class_id = element.require("classId")?;
            let has_pattern_data = element
                .children
                .iter()
                .any(|c| c.attr("type") == Some(PATTERN_DATA_TYPE));
            if class_id == PATTERN_CLASS_ID && has_pattern_data {
                Value::Pattern(pattern_from_dom(element)?)
            } else {
                Value::Descriptor(Descriptor {
                    name: element.attr("name").unwrap_or_default().to_string(),
                    class_id: class_id.to_string(),
                    children: element
                        .children
                        .iter()
                        .map(node_from_dom)
                        .collect::<DomResult<_>>()?,
                })
            }
        }
        "List" => Value::List(
            element
                .children
                .iter()
                .map(node_from_dom)
                .collect::<DomResult<_>>()?,
        ),
        "Double" => Value::Double(parse_number("Double", element.require("value")?)?),
        "UnitFloat" => Value::UnitFloat {
            unit: Unit::from_code(element.require("unit")?),
            value: parse_number("UnitFloat", element.require("value")?)?,
        },
        "Text" => Value::Text(element.require("value")?.to_string()),
        "Enum" => Value::Enum {
            type_id: element.require("typeId")?.to_string(),
            value: element.require("value")?.to_string(),
        },
        "Integer" => Value::Integer(parse_number("Integer", element.require("value")?)?),
        "Boolean" => match element.require("value")? {
            "1" | "true" => Value::Boolean(true),
            "0" | "false" => Value::Boolean(false),
            other => {
                return Err(DomError::InvalidValue {
                    what: "Boolean",
                    value: other.to_string(),
                })
            }
        },
        other => {
            return Err(DomError::InvalidValue {
                what: "node type",
                value: other.to_string(),
            })
        }
    };
    Ok(Node::new(key, value))
}

fn pattern_from_dom(element: &DomElement) -> DomResult<PatternPayload> {
    let mut name = String::new();
    let mut uuid = None;
    let mut data = None;
    for child in &element.children {
        match (child.attr("type"), child.attr("key")) {
            (Some("Text"), Some("Nm  ")) => name = child.require("value")?.to_string(),
            (Some("Text"), Some("Idnt")) => uuid = Some(child.require("value")?.to_string()),
            (Some(PATTERN_DATA_TYPE), _) => {
                let packed = BASE64
                    .decode(child.text.trim())
                    .map_err(|e| DomError::InvalidPatternData(e.to_string()))?;
                let mut blob = Vec::new();
                ZlibDecoder::new(packed.as_slice())
                    .read_to_end(&mut blob)
                    .map_err(|e| DomError::InvalidPatternData(e.to_string()))?;
                data = Some(blob);
            }
            _ => log::warn!("ignoring unexpected child of a pattern node: {:?}", child.attributes),
        }
    }
    Ok(PatternPayload {
        uuid: uuid.ok_or(DomError::MissingAttribute {
            node_type: PATTERN_CLASS_ID.to_string(),
            attribute: "Idnt",
        })?,
        name,
        data: data.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pattern::PatternTile;

    fn sample_document() -> AslDocument {
        let tile = PatternTile::filled("Dots", 3, 2, [10, 20, 30, 255]);
        let mut soft = Descriptor::new("", "SoFi");
        soft.children = vec![
            Node::new("enab", Value::Boolean(true)),
            Node::new(
                "Md  ",
                Value::Enum {
                    type_id: "BlnM".into(),
                    value: "Mltp".into(),
                },
            ),
            Node::new(
                "Opct",
                Value::UnitFloat {
                    unit: Unit::Percent,
                    value: 50.0,
                },
            ),
            Node::new("Dstn", Value::Double(0.1 + 0.2)),
            Node::new("Nm  ", Value::Text("<fancy> & \"quoted\"".into())),
            Node::new("long", Value::Integer(-7)),
        ];
        AslDocument {
            children: vec![
                Node::new(
                    "Patterns",
                    Value::List(vec![Node::new("", Value::Pattern(tile.to_payload("abc")))]),
                ),
                Node::new("", Value::Descriptor(soft)),
            ],
        }
    }

    #[test]
    fn document_survives_xml() {
        let doc = sample_document();
        let xml = document_to_dom(&doc).to_xml().unwrap();
        let dom = DomElement::from_xml(&xml).unwrap();
        assert_eq!(dom, document_to_dom(&doc));
        assert_eq!(dom_to_document(&dom).unwrap(), doc);
    }

    #[test]
    fn attribute_order_is_ignored() {
        let a = DomElement::from_xml(r#"<asl><node type="Double" key="x" value="1"/></asl>"#).unwrap();
        let b = DomElement::from_xml(r#"<asl><node value="1" key="x" type="Double"/></asl>"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pattern_node_shape() {
        let doc = sample_document();
        let dom = document_to_dom(&doc);
        let pattern = &dom.children[0].children[0];
        assert_eq!(pattern.attr("classId"), Some("KisPattern"));
        assert_eq!(pattern.children[2].attr("type"), Some("KisPatternData"));
        assert_eq!(pattern.children[2].attr("key"), Some("Data"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let dom = DomElement::from_xml(r#"<asl><node type="Integer" key="x" value="abc"/></asl>"#).unwrap();
        assert!(matches!(
            dom_to_document(&dom),
            Err(DomError::InvalidValue { what: "Integer", .. })
        ));
        let dom = DomElement::from_xml(r#"<asl><node type="Enum" key="x" value="a"/></asl>"#).unwrap();
        assert!(matches!(
            dom_to_document(&dom),
            Err(DomError::MissingAttribute { attribute: "typeId", .. })
        ));
    }
}

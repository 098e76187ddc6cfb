//! The generic descriptor tree shared by the binary reader, the binary writer,
//! the textual DOM bridge and the parser.

use std::fmt;

/// Class id of the per-style info descriptor.
pub const INFO_CLASS_ID: &str = "null";
/// Class id under which embedded pattern tiles appear in the DOM.
pub const PATTERN_CLASS_ID: &str = "KisPattern";
/// Key of the top-level list holding embedded patterns.
pub const PATTERNS_KEY: &str = "Patterns";

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Empty for list members and top-level descriptors.
    pub key: String,
    pub value: Value,
}

impl Node {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// The segment this node adds to a catcher path.
    pub fn container_name(&self) -> &str {
        if !self.key.is_empty() {
            return &self.key;
        }
        match &self.value {
            Value::Descriptor(d) => &d.class_id,
            Value::Pattern(_) => PATTERN_CLASS_ID,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Descriptor(Descriptor),
    List(Vec<Node>),
    Double(f64),
    UnitFloat { unit: Unit, value: f64 },
    Text(String),
    Enum { type_id: String, value: String },
    Integer(i32),
    Boolean(bool),
    Pattern(PatternPayload),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Descriptor(_) => "Descriptor",
            Value::List(_) => "List",
            Value::Double(_) => "Double",
            Value::UnitFloat { .. } => "UnitFloat",
            Value::Text(_) => "Text",
            Value::Enum { .. } => "Enum",
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::Pattern(_) => "KisPatternData",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Descriptor {
    pub name: String,
    pub class_id: String,
    pub children: Vec<Node>,
}

impl Descriptor {
    pub fn new(name: impl Into<String>, class_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_id: class_id.into(),
            children: Vec::new(),
        }
    }

    pub fn child(&self, key: &str) -> Option<&Value> {
        self.children.iter().find(|n| n.key == key).map(|n| &n.value)
    }
}

/// An embedded raster tile. `data` is the tile encoded as a GIMP pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternPayload {
    pub uuid: String,
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    Angle,
    Density,
    Distance,
    None,
    Percent,
    Pixels,
    Points,
    Millimeters,
    Other(String),
}

impl Unit {
    pub fn from_code(code: &str) -> Self {
        match code {
            "#Ang" => Unit::Angle,
            "#Rsl" => Unit::Density,
            "#Rlt" => Unit::Distance,
            "#Nne" => Unit::None,
            "#Prc" => Unit::Percent,
            "#Pxl" => Unit::Pixels,
            "#Pnt" => Unit::Points,
            "#Mlm" => Unit::Millimeters,
            other => Unit::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Unit::Angle => "#Ang",
            Unit::Density => "#Rsl",
            Unit::Distance => "#Rlt",
            Unit::None => "#Nne",
            Unit::Percent => "#Prc",
            Unit::Pixels => "#Pxl",
            Unit::Points => "#Pnt",
            Unit::Millimeters => "#Mlm",
            Unit::Other(code) => code,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A whole decoded stream: top-level nodes in stream order, i.e. an optional
/// `Patterns` list followed by info/effects descriptor pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AslDocument {
    pub children: Vec<Node>,
}

impl AslDocument {
    pub fn patterns(&self) -> impl Iterator<Item = &PatternPayload> {
        self.children
            .iter()
            .filter_map(|n| match &n.value {
                Value::List(items) if n.key.eq_ignore_ascii_case(PATTERNS_KEY) => Some(items),
                _ => None,
            })
            .flatten()
            .filter_map(|n| match &n.value {
                Value::Pattern(p) => Some(p),
                _ => None,
            })
    }

    /// Pairs every info descriptor with the descriptor that follows it.
    pub fn styles(&self) -> Vec<(&Descriptor, Option<&Descriptor>)> {
        let mut styles = Vec::new();
        let mut iter = self.children.iter().peekable();
        while let Some(node) = iter.next() {
            let Value::Descriptor(info) = &node.value else {
                continue;
            };
            if info.class_id != INFO_CLASS_ID {
                continue;
            }
            let effects = match iter.peek().map(|n| &n.value) {
                Some(Value::Descriptor(d)) if d.class_id != INFO_CLASS_ID => {
                    iter.next();
                    Some(d)
                }
                _ => None,
            };
            styles.push((info, effects));
        }
        styles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_falls_back_to_class_id() {
        let styl = Node::new("", Value::Descriptor(Descriptor::new("", "Styl")));
        assert_eq!(styl.container_name(), "Styl");
        let lefx = Node::new("Lefx", Value::Descriptor(Descriptor::new("", "Lefx")));
        assert_eq!(lefx.container_name(), "Lefx");
        assert_eq!(Node::new("", Value::Double(1.0)).container_name(), "");
    }

    #[test]
    fn styles_pair_info_with_effects() {
        let doc = AslDocument {
            children: vec![
                Node::new("", Value::Descriptor(Descriptor::new("", "null"))),
                Node::new("", Value::Descriptor(Descriptor::new("", "Styl"))),
                Node::new("", Value::Descriptor(Descriptor::new("", "null"))),
            ],
        };
        let styles = doc.styles();
        assert_eq!(styles.len(), 2);
        assert_eq!(styles[0].1.map(|d| d.class_id.as_str()), Some("Styl"));
        assert!(styles[1].1.is_none());
    }
}

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::codec::{align_up, check_section_size, AslReadExt, OffsetVerifier};
use crate::config::CodecConfig;
use crate::error::{ParseError, Result};
use crate::ir::{AslDocument, Descriptor, Node, PatternPayload, Unit, Value, PATTERNS_KEY};
use crate::pattern::read_pattern_record;

pub const FILE_VERSION: u16 = 2;
pub const FILE_SIGNATURE: &str = "8BSL";
pub const PATTERNS_VERSION: u16 = 3;
pub const DESCRIPTOR_VERSION: u32 = 16;
pub const OBJECT_EFFECTS_VERSION: u32 = 0;
/// Key of the pattern list produced from a PSD `Patt` block.
pub const PSD_PATTERNS_KEY: &str = "patterns";

const MAX_NESTING: u32 = 64;

/// Decodes the binary format into an [`AslDocument`].
#[derive(Debug, Clone, Default)]
pub struct AslReader {
    config: CodecConfig,
}

impl AslReader {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Reads a standalone `.asl` stream.
    pub fn read_file<R: Read + Seek + ?Sized>(&self, r: &mut R) -> Result<AslDocument> {
        r.expect_u16::<BigEndian>("file version", FILE_VERSION)?;
        r.expect_tag("file", FILE_SIGNATURE)?;
        r.expect_u16::<BigEndian>("patterns version", PATTERNS_VERSION)?;

        let mut doc = AslDocument::default();

        let patterns_size = r.read_u32::<BigEndian>()?;
        if patterns_size > 0 {
            check_section_size("patterns section", patterns_size as u64, self.config.max_section_size)?;
            let mut section = OffsetVerifier::new(r, "patterns section", patterns_size as u64, 0)?;
            let patterns = self.read_pattern_list::<_, BigEndian>(&mut section)?;
            section.finish(self.config.strict)?;
            doc.children.push(pattern_list(PATTERNS_KEY, patterns));
        }

        let style_count = r.read_u32::<BigEndian>()?;
        log::debug!("reading {} styles", style_count);
        for index in 0..style_count {
            let size = r.read_u32::<BigEndian>()?;
            check_section_size("style record", size as u64, self.config.max_section_size)?;
            match self.read_style::<_, BigEndian>(r, size) {
                Ok([info, effects]) => {
                    doc.children.push(info);
                    doc.children.push(effects);
                }
                Err(e) if !self.config.strict => {
                    log::warn!("skipping style {}: {}", index, e);
                }
                Err(e) => return Err(e),
            }
            let pos = r.stream_position()?;
            let aligned = align_up(pos, 4);
            if aligned != pos {
                r.seek(SeekFrom::Start(aligned))?;
            }
        }
        Ok(doc)
    }

    /// Reads the `lfx2` layer resource of a PSD: a version pair and one descriptor.
    pub fn read_lfx2_section<R: Read + ?Sized, B: ByteOrder>(&self, r: &mut R) -> Result<AslDocument> {
        r.expect_u32::<B>("object effects version", OBJECT_EFFECTS_VERSION)?;
        r.expect_u32::<B>("descriptor version", DESCRIPTOR_VERSION)?;
        let descriptor = read_descriptor::<_, B>(r, 0)?;
        Ok(AslDocument {
            children: vec![Node::new("", Value::Descriptor(descriptor))],
        })
    }

    /// Reads a PSD `Patt` block of `len` bytes holding bare pattern records.
    pub fn read_pattern_section<R: Read + Seek + ?Sized, B: ByteOrder>(
        &self,
        r: &mut R,
        len: u64,
    ) -> Result<AslDocument> {
        check_section_size("pattern block", len, self.config.max_section_size)?;
        let mut section = OffsetVerifier::new(r, "pattern block", len, 3)?;
        let patterns = self.read_pattern_list::<_, B>(&mut section)?;
        section.finish(self.config.strict)?;
        Ok(AslDocument {
            children: vec![pattern_list(PSD_PATTERNS_KEY, patterns)],
        })
    }

    fn read_pattern_list<R: Read + Seek + ?Sized, B: ByteOrder>(
        &self,
        section: &mut OffsetVerifier<'_, R>,
    ) -> Result<Vec<PatternPayload>> {
        let mut patterns = Vec::new();
        while section.remaining() >= 4 {
            match read_pattern_record::<_, B>(section, &self.config) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) if !self.config.strict => log::warn!("skipping pattern record: {}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(patterns)
    }

    fn read_style<R: Read + Seek + ?Sized, B: ByteOrder>(&self, r: &mut R, size: u32) -> Result<[Node; 2]> {
        let mut style = OffsetVerifier::new(r, "style record", size as u64, 3)?;

        style.expect_u32::<B>("info descriptor version", DESCRIPTOR_VERSION)?;
        let info = read_descriptor::<_, B>(&mut style, 0)?;
        style.expect_u32::<B>("effects descriptor version", DESCRIPTOR_VERSION)?;
        let effects = read_descriptor::<_, B>(&mut style, 0)?;
        style.finish(self.config.strict)?;

        log::debug!("read style {:?} / {:?}", info.class_id, effects.class_id);
        Ok([
            Node::new("", Value::Descriptor(info)),
            Node::new("", Value::Descriptor(effects)),
        ])
    }
}

fn pattern_list(key: &str, patterns: Vec<PatternPayload>) -> Node {
    Node::new(
        key,
        Value::List(
            patterns
                .into_iter()
                .map(|p| Node::new("", Value::Pattern(p)))
                .collect(),
        ),
    )
}

/// Reads a descriptor body: unicode name, class id, child count and children.
pub fn read_descriptor<R: Read + ?Sized, B: ByteOrder>(r: &mut R, depth: u32) -> Result<Descriptor> {
    if depth > MAX_NESTING {
        return Err(ParseError::SectionTooLarge {
            what: "descriptor nesting",
            size: depth as u64,
            limit: MAX_NESTING as u64,
        });
    }
    let name = r.read_unicode_string::<B>()?;
    let class_id = r.read_var_string::<B>()?;
    let count = r.read_u32::<B>()?;

    let mut children = Vec::with_capacity(count.min(64) as usize);
    for _ in 0..count {
        let key = r.read_var_string::<B>()?;
        let tag = r.read_tag()?;
        let value = read_child::<_, B>(r, &tag, depth)?;
        children.push(Node::new(key, value));
    }
    Ok(Descriptor {
        name,
        class_id,
        children,
    })
}

fn read_child<R: Read + ?Sized, B: ByteOrder>(r: &mut R, tag: &str, depth: u32) -> Result<Value> {
    let value = match tag {
        "Objc" | "GlbO" => Value::Descriptor(read_descriptor::<_, B>(r, depth + 1)?),
        "VlLs" => {
            let count = r.read_u32::<B>()?;
            let mut items = Vec::with_capacity(count.min(64) as usize);
            for _ in 0..count {
                let item_tag = r.read_tag()?;
                items.push(Node::new("", read_child::<_, B>(r, &item_tag, depth + 1)?));
            }
            Value::List(items)
        }
        "doub" => Value::Double(r.read_f64::<B>()?),
        "UntF" => {
            let unit = Unit::from_code(&r.read_tag()?);
            Value::UnitFloat {
                unit,
                value: r.read_f64::<B>()?,
            }
        }
        "TEXT" => Value::Text(r.read_unicode_string::<B>()?),
        "enum" => Value::Enum {
            type_id: r.read_var_string::<B>()?,
            value: r.read_var_string::<B>()?,
        },
        "long" => Value::Integer(r.read_i32::<B>()?),
        "bool" => Value::Boolean(r.read_u8()? != 0),
        other => {
            return Err(ParseError::UnsupportedOsType {
                tag: other.to_string(),
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use byteorder::WriteBytesExt;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codec::AslWriteExt;

    fn descriptor_bytes(children: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_unicode_string::<BigEndian>("").unwrap();
        out.write_var_string::<BigEndian>("SoFi").unwrap();
        out.write_u32::<BigEndian>(children.len() as u32).unwrap();
        for (key, tag, payload) in children {
            out.write_var_string::<BigEndian>(key).unwrap();
            out.write_tag(tag).unwrap();
            out.extend_from_slice(payload);
        }
        out
    }

    #[test]
    fn reads_leaf_children() {
        let mut enab = Vec::new();
        enab.write_u8(1).unwrap();
        let mut opct = b"#Prc".to_vec();
        opct.write_f64::<BigEndian>(50.0).unwrap();
        let mut md = Vec::new();
        md.write_var_string::<BigEndian>("BlnM").unwrap();
        md.write_var_string::<BigEndian>("Mltp").unwrap();

        let bytes = descriptor_bytes(&[
            ("enab", "bool", &enab[..]),
            ("Opct", "UntF", &opct[..]),
            ("Md  ", "enum", &md[..]),
        ]);
        let d = read_descriptor::<_, BigEndian>(&mut Cursor::new(bytes), 0).unwrap();
        assert_eq!(d.class_id, "SoFi");
        assert_eq!(
            d.children,
            vec![
                Node::new("enab", Value::Boolean(true)),
                Node::new(
                    "Opct",
                    Value::UnitFloat {
                        unit: Unit::Percent,
                        value: 50.0
                    }
                ),
                Node::new(
                    "Md  ",
                    Value::Enum {
                        type_id: "BlnM".into(),
                        value: "Mltp".into()
                    }
                ),
            ]
        );
    }

    #[test]
    fn unsupported_tags_fail() {
        for tag in ["obj ", "type", "GlbC", "alis", "tdta"] {
            let bytes = descriptor_bytes(&[("xxxx", tag, &[0u8; 4][..])]);
            let err = read_descriptor::<_, BigEndian>(&mut Cursor::new(bytes), 0).unwrap_err();
            assert!(matches!(err, ParseError::UnsupportedOsType { tag: t } if t == tag));
        }
    }

    #[test]
    fn bad_signature_is_reported() {
        let bytes = b"\0\x028BIM\0\x03".to_vec();
        let err = AslReader::default().read_file(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ParseError::BadSignature { what: "file", .. }));
    }

    #[test]
    fn little_endian_lfx2() {
        let mut bytes = Vec::new();
        bytes.write_u32::<byteorder::LittleEndian>(0).unwrap();
        bytes.write_u32::<byteorder::LittleEndian>(16).unwrap();
        bytes.write_unicode_string::<byteorder::LittleEndian>("").unwrap();
        bytes.write_var_string::<byteorder::LittleEndian>("null").unwrap();
        bytes.write_u32::<byteorder::LittleEndian>(1).unwrap();
        bytes.write_var_string::<byteorder::LittleEndian>("masterFXSwitch").unwrap();
        bytes.write_tag("bool").unwrap();
        bytes.write_u8(1).unwrap();

        let doc = AslReader::default()
            .read_lfx2_section::<_, byteorder::LittleEndian>(&mut Cursor::new(bytes))
            .unwrap();
        let Value::Descriptor(d) = &doc.children[0].value else {
            panic!("expected a descriptor");
        };
        assert_eq!(d.class_id, "null");
        assert_eq!(d.child("masterFXSwitch"), Some(&Value::Boolean(true)));
    }
}

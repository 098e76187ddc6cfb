use std::io::{Seek, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::codec::{AslWriteExt, OffsetStreamPusher};
use crate::error::{WriteError, WriteResult};
use crate::ir::{AslDocument, Descriptor, Value};
use crate::pattern::write_pattern_record;
use crate::reader::{
    DESCRIPTOR_VERSION, FILE_SIGNATURE, FILE_VERSION, OBJECT_EFFECTS_VERSION, PATTERNS_VERSION,
};

/// Encodes an [`AslDocument`] into the binary format.
#[derive(Debug, Clone, Copy, Default)]
pub struct AslWriter;

impl AslWriter {
    pub fn new() -> Self {
        Self
    }

    /// Writes a standalone `.asl` stream. Patterns go first; every style is
    /// an info descriptor plus the descriptor that follows it in the document.
    pub fn write_file<W: Write + Seek + ?Sized>(&self, w: &mut W, doc: &AslDocument) -> WriteResult<()> {
        w.write_u16::<BigEndian>(FILE_VERSION)?;
        w.write_tag(FILE_SIGNATURE)?;
        w.write_u16::<BigEndian>(PATTERNS_VERSION)?;

        let mut patterns = OffsetStreamPusher::<_, BigEndian>::new(w, 0)?;
        for pattern in doc.patterns() {
            write_pattern_record::<_, BigEndian>(&mut patterns, pattern)?;
        }
        patterns.finish()?;

        let styles = doc.styles();
        w.write_u32::<BigEndian>(styles.len() as u32)?;
        for (info, effects) in styles {
            let effects = effects.ok_or_else(|| {
                WriteError::InvalidDocument("style has no effects descriptor".to_string())
            })?;
            let mut style = OffsetStreamPusher::<_, BigEndian>::new(w, 4)?;
            style.write_u32::<BigEndian>(DESCRIPTOR_VERSION)?;
            write_descriptor::<_, BigEndian>(&mut style, info)?;
            style.write_u32::<BigEndian>(DESCRIPTOR_VERSION)?;
            write_descriptor::<_, BigEndian>(&mut style, effects)?;
            style.finish()?;
        }
        Ok(())
    }

    /// Writes the first info descriptor of `doc` as a PSD `lfx2` resource.
    pub fn write_lfx2_section<W: Write + ?Sized, B: ByteOrder>(
        &self,
        w: &mut W,
        doc: &AslDocument,
    ) -> WriteResult<()> {
        let (info, _) = doc
            .styles()
            .into_iter()
            .next()
            .ok_or_else(|| WriteError::InvalidDocument("document holds no style".to_string()))?;
        w.write_u32::<B>(OBJECT_EFFECTS_VERSION)?;
        w.write_u32::<B>(DESCRIPTOR_VERSION)?;
        write_descriptor::<_, B>(w, info)
    }

    /// Writes the patterns of `doc` as bare records, the layout of a PSD `Patt` block.
    pub fn write_pattern_section<W: Write + Seek + ?Sized, B: ByteOrder>(
        &self,
        w: &mut W,
        doc: &AslDocument,
    ) -> WriteResult<()> {
        for pattern in doc.patterns() {
            write_pattern_record::<_, B>(w, pattern)?;
        }
        Ok(())
    }
}

/// Writes a descriptor body: unicode name, class id, child count and children.
pub fn write_descriptor<W: Write + ?Sized, B: ByteOrder>(w: &mut W, d: &Descriptor) -> WriteResult<()> {
    w.write_unicode_string::<B>(&d.name)?;
    w.write_var_string::<B>(&d.class_id)?;
    w.write_u32::<B>(d.children.len() as u32)?;
    for child in &d.children {
        if child.key.is_empty() {
            return Err(WriteError::InvalidDocument(format!(
                "{} child of {:?} has no key",
                child.value.type_name(),
                d.class_id
            )));
        }
        w.write_var_string::<B>(&child.key)?;
        write_child::<_, B>(w, &child.value)?;
    }
    Ok(())
}

fn write_child<W: Write + ?Sized, B: ByteOrder>(w: &mut W, value: &Value) -> WriteResult<()> {
    match value {
        Value::Descriptor(d) => {
            w.write_tag("Objc")?;
            write_descriptor::<_, B>(w, d)?;
        }
        Value::List(items) => {
            w.write_tag("VlLs")?;
            w.write_u32::<B>(items.len() as u32)?;
            for item in items {
                write_child::<_, B>(w, &item.value)?;
            }
        }
        Value::Double(v) => {
            w.write_tag("doub")?;
            w.write_f64::<B>(*v)?;
        }
        Value::UnitFloat { unit, value } => {
            w.write_tag("UntF")?;
            w.write_tag(unit.code())?;
            w.write_f64::<B>(*value)?;
        }
        Value::Text(s) => {
            w.write_tag("TEXT")?;
            w.write_unicode_string::<B>(s)?;
        }
        Value::Enum { type_id, value } => {
            w.write_tag("enum")?;
            w.write_var_string::<B>(type_id)?;
            w.write_var_string::<B>(value)?;
        }
        Value::Integer(v) => {
            w.write_tag("long")?;
            w.write_i32::<B>(*v)?;
        }
        Value::Boolean(v) => {
            w.write_tag("bool")?;
            w.write_u8(*v as u8)?;
        }
        Value::Pattern(p) => {
            return Err(WriteError::InvalidDocument(format!(
                "pattern {:?} outside the pattern list",
                p.uuid
            )))
        }
    }
    Ok(())
}

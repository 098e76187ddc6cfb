//! Codec for Photoshop layer-style (`.asl`) files and the layer-effect
//! sections embedded in PSD files.
//!
//! Bytes are decoded by [`AslReader`] into an [`AslDocument`], which can be
//! mapped to and from a textual DOM ([`dom`]), walked into an
//! [`ObjectCatcher`] ([`walk_document`]), assembled with [`AslBuilder`] and
//! encoded again by [`AslWriter`].

pub mod builder;
pub mod catcher;
pub mod codec;
pub mod compression;
pub mod config;
pub mod dom;
pub mod error;
pub mod ir;
pub mod parser;
pub mod pattern;
pub mod reader;
pub mod types;
pub mod writer;

use std::io::Cursor;

pub use builder::AslBuilder;
pub use catcher::{CallbackCatcher, DumpCatcher, DumpRecord, ObjectCatcher};
pub use config::{CodecConfig, CodecConfigBuilder};
pub use dom::DomElement;
pub use error::{DomError, DomResult, ParseError, Result, SubscribeError, WriteError, WriteResult};
pub use ir::{AslDocument, Descriptor, Node, PatternPayload, Unit, Value};
pub use parser::walk_document;
pub use pattern::PatternTile;
pub use reader::AslReader;
pub use types::{Color, Curve, Gradient, GradientStop, PatternRef, Point, StopKind};
pub use writer::AslWriter;

/// Decodes a standalone `.asl` file held in memory.
pub fn read_document(bytes: &[u8], config: &CodecConfig) -> Result<AslDocument> {
    AslReader::new(config.clone()).read_file(&mut Cursor::new(bytes))
}

/// Encodes a document as a standalone `.asl` file.
pub fn write_document(doc: &AslDocument) -> WriteResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    AslWriter::new().write_file(&mut cursor, doc)?;
    Ok(cursor.into_inner())
}

/// Renders a document in its XML form.
pub fn document_to_xml(doc: &AslDocument) -> DomResult<String> {
    dom::document_to_dom(doc).to_xml()
}

/// Parses the XML form of a document.
pub fn xml_to_document(xml: &str) -> DomResult<AslDocument> {
    dom::dom_to_document(&DomElement::from_xml(xml)?)
}

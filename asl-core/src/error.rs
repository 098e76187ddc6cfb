use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of stream")]
    Truncated,

    #[error("bad {what} signature: expected {expected}, found {found}")]
    BadSignature {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("unsupported OSType tag {tag:?}")]
    UnsupportedOsType { tag: String },

    #[error("unsupported pattern image mode {0}")]
    UnsupportedImageMode(u32),

    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u8),

    #[error("{what} claims {size} bytes, limit is {limit}")]
    SectionTooLarge {
        what: &'static str,
        size: u64,
        limit: u64,
    },

    #[error("{what} ended at {actual}, declared end is {expected}")]
    SectionOverrun {
        what: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => ParseError::Truncated,
            _ => ParseError::Io(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("value out of range: {0}")]
    ValueOutOfRange(String),
}

#[derive(Debug, Error)]
pub enum DomError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("unexpected element <{0}>")]
    UnexpectedElement(String),

    #[error("node of type {node_type:?} has no {attribute:?} attribute")]
    MissingAttribute {
        node_type: String,
        attribute: &'static str,
    },

    #[error("invalid value {value:?} for {what}")]
    InvalidValue { what: &'static str, value: String },

    #[error("invalid pattern data: {0}")]
    InvalidPatternData(String),
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("path {path:?} already has a {kind} handler")]
    Duplicate { path: String, kind: &'static str },
}

pub type Result<T> = std::result::Result<T, ParseError>;
pub type WriteResult<T> = std::result::Result<T, WriteError>;
pub type DomResult<T> = std::result::Result<T, DomError>;

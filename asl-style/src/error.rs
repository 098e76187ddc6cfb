use asl_core::{DomError, ParseError, SubscribeError, WriteError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("failed to parse layer styles: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to write layer styles: {0}")]
    Write(#[from] WriteError),

    #[error("failed to convert layer styles: {0}")]
    Dom(#[from] DomError),

    #[error("failed to bind layer style fields: {0}")]
    Subscribe(#[from] SubscribeError),

    #[error("no layer styles to save")]
    Empty,
}

pub type Result<T> = std::result::Result<T, StyleError>;

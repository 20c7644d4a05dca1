//! Error types for signature page composition

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Unsupported PDF structure: {0}")]
    Structure(String),

    #[error("Signature image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Error types for equity calculations

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EquityError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

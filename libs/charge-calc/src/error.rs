//! Error types for charge-calc

use thiserror::Error;

/// Calculation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalcError {
    /// Word count returned by the transport does not match the encoding
    #[error("Decode error: {0}")]
    Decode(String),
}

impl CalcError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CalcError>;

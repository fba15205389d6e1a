//! Core error types for the schema engine.
//!
//! This module defines storage-agnostic error types. Storage-specific
//! errors are converted to these types by the repository implementations.

use thiserror::Error;

use crate::formulas::FormulaError;
use crate::schemas::SchemaError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the schema engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fx rate unavailable: {0}")]
    Fx(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Errors produced while validating or coercing caller input.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

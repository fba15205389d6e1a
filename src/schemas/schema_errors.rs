//! Error types for schema composition, constraints and column values.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    /// A value failed type coercion or a declared constraint.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Override attempted on a non-editable or formula-sourced column.
    #[error("Column '{0}' is not editable")]
    NotEditable(String),

    /// Deletion attempted on a column with `is_deletable = false`.
    #[error("Column '{0}' cannot be deleted")]
    NotDeletable(String),

    /// Column identifier already exists within the schema.
    #[error("Column identifier '{0}' already exists in this schema")]
    DuplicateColumn(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// Column definition is structurally invalid (e.g. formula source
    /// with a source field).
    #[error("Invalid column: {0}")]
    InvalidColumn(String),
}

//! Error types for formula parsing, resolution and evaluation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormulaError {
    /// The expression uses a construct outside the allowed arithmetic
    /// grammar, or does not parse at all.
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// A formula references its own identifier.
    #[error("Formula '{0}' cannot reference itself")]
    SelfReference(String),

    /// A required identifier has no value under the strict dependency
    /// policy.
    #[error("Formula '{formula}' is missing dependencies: {identifiers:?}")]
    MissingDependency {
        formula: String,
        identifiers: Vec<String>,
    },

    /// No formula definition exists for the requested identifier and
    /// asset type.
    #[error("No formula definition found for '{identifier}' and asset type '{asset_type}'")]
    DefinitionNotFound {
        identifier: String,
        asset_type: String,
    },

    /// Attempt to mutate a system entity or bind across ownership
    /// boundaries.
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// The identifier collides with a reserved system formula identifier.
    #[error("'{0}' is a reserved system formula identifier")]
    ReservedIdentifier(String),

    /// Identifier uniqueness violated within an owner scope.
    #[error("A formula or definition with identifier '{0}' already exists in this scope")]
    DuplicateIdentifier(String),

    /// The expression parsed but could not be evaluated (division by
    /// zero, overflow, unresolvable identifier).
    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

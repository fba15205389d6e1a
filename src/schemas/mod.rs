//! Schemas module - column schemas composed from templates, value
//! constraints, and the per-holding column value store.

mod column_value_model;
mod column_value_service;
mod constraints;
mod schema_composer;
mod schema_errors;
mod schema_model;
mod schema_traits;
mod templates;


pub use column_value_model::SchemaColumnValue;
pub use column_value_service::ColumnValueService;
pub use constraints::{
    decimal_places_of, master_constraints_for, merge_constraints, parse_boolean, validate_value,
    Constraint, ConstraintValue,
};
pub use schema_composer::SchemaComposer;
pub use schema_errors::SchemaError;
pub use schema_model::{
    ColumnSource, DataType, Schema, SchemaColumn, SchemaColumnTemplate, SchemaComposeContext,
    SchemaTemplate, TemplateColumnSource,
};
pub use schema_traits::{ColumnValueRepositoryTrait, SchemaRepositoryTrait};
pub use templates::{crypto_template, equity_template, metal_template, template_for};

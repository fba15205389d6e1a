//! Trait contracts for schema and column value storage.

use crate::errors::Result;
use crate::holdings::HoldingRef;

use super::column_value_model::SchemaColumnValue;
use super::schema_model::{Schema, SchemaColumn};

/// Storage contract for composed schemas and their columns.
///
/// Implementations enforce column identifier uniqueness per schema and
/// surface violations as `SchemaError::DuplicateColumn`.
pub trait SchemaRepositoryTrait: Send + Sync {
    fn insert_schema(&self, schema: Schema) -> Result<Schema>;
    fn delete_schema(&self, schema_id: &str) -> Result<()>;
    fn get_schema(&self, schema_id: &str) -> Result<Option<Schema>>;
    fn schema_for_account(&self, account_id: &str) -> Result<Option<Schema>>;

    fn add_column(&self, schema_id: &str, column: SchemaColumn) -> Result<SchemaColumn>;
    fn remove_column(&self, schema_id: &str, column_id: &str) -> Result<()>;
    fn get_column(&self, column_id: &str) -> Result<Option<SchemaColumn>>;
    /// Columns ordered by display order.
    fn columns_for_schema(&self, schema_id: &str) -> Result<Vec<SchemaColumn>>;
}

/// Storage contract for schema column values.
///
/// `(column, holding)` pairs are unique; concurrent writers for the
/// same holding are serialized by the implementation.
pub trait ColumnValueRepositoryTrait: Send + Sync {
    fn get(&self, column_id: &str, holding: &HoldingRef) -> Result<Option<SchemaColumnValue>>;
    fn get_or_create(&self, column_id: &str, holding: &HoldingRef) -> Result<SchemaColumnValue>;
    fn save(&self, value: SchemaColumnValue) -> Result<SchemaColumnValue>;
    fn delete_for_column(&self, column_id: &str) -> Result<()>;
    fn delete_for_holding(&self, holding: &HoldingRef) -> Result<()>;
    fn list_for_holding(&self, holding: &HoldingRef) -> Result<Vec<SchemaColumnValue>>;
}

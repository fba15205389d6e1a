//! Column value overrides.
//!
//! The only allowed way to mutate schema column values from user input.
//! Overrides suspend computation for a cell; clearing one recomputes
//! the cell immediately so a stale value is never read.

use std::sync::Arc;

use crate::engine::RecomputeTrigger;
use crate::errors::Result;
use crate::holdings::HoldingRef;

use super::column_value_model::SchemaColumnValue;
use super::constraints::validate_value;
use super::schema_errors::SchemaError;
use super::schema_model::SchemaColumn;
use super::schema_traits::{ColumnValueRepositoryTrait, SchemaRepositoryTrait};

#[derive(Clone)]
pub struct ColumnValueService {
    schemas: Arc<dyn SchemaRepositoryTrait>,
    values: Arc<dyn ColumnValueRepositoryTrait>,
}

impl ColumnValueService {
    pub fn new(
        schemas: Arc<dyn SchemaRepositoryTrait>,
        values: Arc<dyn ColumnValueRepositoryTrait>,
    ) -> Self {
        Self { schemas, values }
    }

    fn column(&self, column_id: &str) -> Result<SchemaColumn> {
        self.schemas
            .get_column(column_id)?
            .ok_or_else(|| SchemaError::ColumnNotFound(column_id.to_string()).into())
    }

    pub fn get_or_create(
        &self,
        column_id: &str,
        holding: &HoldingRef,
    ) -> Result<SchemaColumnValue> {
        self.values.get_or_create(column_id, holding)
    }

    /// Applies a user override to one cell.
    ///
    /// Permitted only when the column is editable and not
    /// formula-sourced. The value is constraint-validated, stored with
    /// `is_edited = true`, and dependent formula columns are cascaded.
    /// The overridden cell itself is skipped by recomputation from then
    /// on.
    pub fn apply_override(
        &self,
        column_id: &str,
        holding: &HoldingRef,
        raw_value: &str,
        trigger: &dyn RecomputeTrigger,
    ) -> Result<SchemaColumnValue> {
        let column = self.column(column_id)?;

        if column.source.is_formula() || !column.is_editable {
            return Err(SchemaError::NotEditable(column.identifier).into());
        }

        let normalized = validate_value(raw_value, column.data_type, &column.constraints)?;

        let mut scv = self.values.get_or_create(column_id, holding)?;
        scv.value = Some(normalized);
        scv.is_edited = true;
        scv.updated_at = chrono::Utc::now();
        let scv = self.values.save(scv)?;

        trigger.identifier_changed(holding, &column.identifier)?;
        Ok(scv)
    }

    /// Clears an override and immediately recomputes the cell, then
    /// the transitive closure of its dependents.
    pub fn clear_override(
        &self,
        column_id: &str,
        holding: &HoldingRef,
        trigger: &dyn RecomputeTrigger,
    ) -> Result<SchemaColumnValue> {
        let column = self.column(column_id)?;

        let mut scv = self.values.get_or_create(column_id, holding)?;
        if !scv.is_edited {
            return Ok(scv);
        }

        scv.is_edited = false;
        scv.updated_at = chrono::Utc::now();
        let scv = self.values.save(scv)?;

        // Never leave a stale value until the next bulk recompute.
        trigger.identifier_changed(holding, &column.identifier)?;

        // Return the refreshed cell.
        Ok(self.values.get(column_id, holding)?.unwrap_or(scv))
    }
}

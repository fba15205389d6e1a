//! DashMap-backed repositories.

use chrono::Utc;
use dashmap::DashMap;

use crate::errors::Result;
use crate::formulas::{
    Formula, FormulaDefinition, FormulaDefinitionRepositoryTrait, FormulaError,
    FormulaRepositoryTrait,
};
use crate::holdings::{AssetType, HoldingRef};
use crate::schemas::{
    ColumnValueRepositoryTrait, Schema, SchemaColumn, SchemaColumnValue, SchemaError,
    SchemaRepositoryTrait,
};

/// Formula storage keyed by id, with `(identifier, owner)` uniqueness.
#[derive(Debug, Default)]
pub struct InMemoryFormulaRepository {
    formulas: DashMap<String, Formula>,
}

impl InMemoryFormulaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn assert_unique(&self, candidate: &Formula) -> Result<()> {
        let clash = self.formulas.iter().any(|entry| {
            entry.id != candidate.id
                && entry.identifier == candidate.identifier
                && entry.owner == candidate.owner
        });
        if clash {
            return Err(FormulaError::DuplicateIdentifier(candidate.identifier.clone()).into());
        }
        Ok(())
    }
}

impl FormulaRepositoryTrait for InMemoryFormulaRepository {
    fn insert(&self, formula: Formula) -> Result<Formula> {
        self.assert_unique(&formula)?;
        self.formulas.insert(formula.id.clone(), formula.clone());
        Ok(formula)
    }

    fn update(&self, formula: Formula) -> Result<Formula> {
        self.assert_unique(&formula)?;
        if !self.formulas.contains_key(&formula.id) {
            return Err(crate::errors::Error::Repository(format!(
                "unknown formula '{}'",
                formula.id
            )));
        }
        self.formulas.insert(formula.id.clone(), formula.clone());
        Ok(formula)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.formulas.remove(id);
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Formula>> {
        Ok(self.formulas.get(id).map(|f| f.clone()))
    }

    fn find_by_identifier(
        &self,
        identifier: &str,
        owner: Option<&str>,
    ) -> Result<Option<Formula>> {
        Ok(self
            .formulas
            .iter()
            .find(|f| f.identifier == identifier && f.owner.as_deref() == owner)
            .map(|f| f.clone()))
    }

    fn list_by_owner(&self, owner: Option<&str>) -> Result<Vec<Formula>> {
        let mut out: Vec<Formula> = self
            .formulas
            .iter()
            .filter(|f| f.owner.as_deref() == owner)
            .map(|f| f.clone())
            .collect();
        out.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(out)
    }
}

/// Formula definition storage with `(identifier, asset_type, owner)`
/// uniqueness.
#[derive(Debug, Default)]
pub struct InMemoryFormulaDefinitionRepository {
    definitions: DashMap<String, FormulaDefinition>,
}

impl InMemoryFormulaDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn assert_unique(&self, candidate: &FormulaDefinition) -> Result<()> {
        let clash = self.definitions.iter().any(|entry| {
            entry.id != candidate.id
                && entry.identifier == candidate.identifier
                && entry.asset_type == candidate.asset_type
                && entry.owner == candidate.owner
        });
        if clash {
            return Err(FormulaError::DuplicateIdentifier(candidate.identifier.clone()).into());
        }
        Ok(())
    }
}

impl FormulaDefinitionRepositoryTrait for InMemoryFormulaDefinitionRepository {
    fn insert(&self, definition: FormulaDefinition) -> Result<FormulaDefinition> {
        self.assert_unique(&definition)?;
        self.definitions
            .insert(definition.id.clone(), definition.clone());
        Ok(definition)
    }

    fn update(&self, definition: FormulaDefinition) -> Result<FormulaDefinition> {
        self.assert_unique(&definition)?;
        self.definitions
            .insert(definition.id.clone(), definition.clone());
        Ok(definition)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.definitions.remove(id);
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<FormulaDefinition>> {
        Ok(self.definitions.get(id).map(|d| d.clone()))
    }

    fn find(
        &self,
        identifier: &str,
        asset_type: AssetType,
        owner: Option<&str>,
    ) -> Result<Option<FormulaDefinition>> {
        Ok(self
            .definitions
            .iter()
            .find(|d| {
                d.identifier == identifier
                    && d.asset_type == asset_type
                    && d.owner.as_deref() == owner
            })
            .map(|d| d.clone()))
    }

    fn list_for_asset_type(
        &self,
        asset_type: AssetType,
        owner: Option<&str>,
    ) -> Result<Vec<FormulaDefinition>> {
        let mut out: Vec<FormulaDefinition> = self
            .definitions
            .iter()
            .filter(|d| d.asset_type == asset_type && d.owner.as_deref() == owner)
            .map(|d| d.clone())
            .collect();
        out.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(out)
    }
}

/// Schema storage keyed by schema id; columns live inside their schema
/// and are indexed for direct lookup.
#[derive(Debug, Default)]
pub struct InMemorySchemaRepository {
    schemas: DashMap<String, Schema>,
    /// column id -> schema id
    column_index: DashMap<String, String>,
}

impl InMemorySchemaRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchemaRepositoryTrait for InMemorySchemaRepository {
    fn insert_schema(&self, schema: Schema) -> Result<Schema> {
        for column in &schema.columns {
            self.column_index
                .insert(column.id.clone(), schema.id.clone());
        }
        self.schemas.insert(schema.id.clone(), schema.clone());
        Ok(schema)
    }

    fn delete_schema(&self, schema_id: &str) -> Result<()> {
        if let Some((_, schema)) = self.schemas.remove(schema_id) {
            for column in &schema.columns {
                self.column_index.remove(&column.id);
            }
        }
        Ok(())
    }

    fn get_schema(&self, schema_id: &str) -> Result<Option<Schema>> {
        Ok(self.schemas.get(schema_id).map(|s| s.clone()))
    }

    fn schema_for_account(&self, account_id: &str) -> Result<Option<Schema>> {
        Ok(self
            .schemas
            .iter()
            .find(|s| s.account_id == account_id)
            .map(|s| s.clone()))
    }

    fn add_column(&self, schema_id: &str, column: SchemaColumn) -> Result<SchemaColumn> {
        let mut schema = self
            .schemas
            .get_mut(schema_id)
            .ok_or_else(|| SchemaError::SchemaNotFound(schema_id.to_string()))?;
        if schema
            .columns
            .iter()
            .any(|c| c.identifier == column.identifier)
        {
            return Err(SchemaError::DuplicateColumn(column.identifier).into());
        }
        self.column_index
            .insert(column.id.clone(), schema_id.to_string());
        schema.columns.push(column.clone());
        Ok(column)
    }

    fn remove_column(&self, schema_id: &str, column_id: &str) -> Result<()> {
        let mut schema = self
            .schemas
            .get_mut(schema_id)
            .ok_or_else(|| SchemaError::SchemaNotFound(schema_id.to_string()))?;
        let before = schema.columns.len();
        schema.columns.retain(|c| c.id != column_id);
        if schema.columns.len() == before {
            return Err(SchemaError::ColumnNotFound(column_id.to_string()).into());
        }
        self.column_index.remove(column_id);
        Ok(())
    }

    fn get_column(&self, column_id: &str) -> Result<Option<SchemaColumn>> {
        let schema_id = match self.column_index.get(column_id) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        Ok(self.schemas.get(&schema_id).and_then(|s| {
            s.columns
                .iter()
                .find(|c| c.id == column_id)
                .cloned()
        }))
    }

    fn columns_for_schema(&self, schema_id: &str) -> Result<Vec<SchemaColumn>> {
        let mut columns = self
            .schemas
            .get(schema_id)
            .map(|s| s.columns.clone())
            .unwrap_or_default();
        columns.sort_by_key(|c| c.display_order);
        Ok(columns)
    }
}

/// Column value storage keyed by `(column, holding)`.
#[derive(Debug, Default)]
pub struct InMemoryColumnValueRepository {
    values: DashMap<(String, HoldingRef), SchemaColumnValue>,
}

impl InMemoryColumnValueRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ColumnValueRepositoryTrait for InMemoryColumnValueRepository {
    fn get(&self, column_id: &str, holding: &HoldingRef) -> Result<Option<SchemaColumnValue>> {
        let key = (column_id.to_string(), holding.clone());
        Ok(self.values.get(&key).map(|v| v.clone()))
    }

    fn get_or_create(&self, column_id: &str, holding: &HoldingRef) -> Result<SchemaColumnValue> {
        let key = (column_id.to_string(), holding.clone());
        let entry = self.values.entry(key).or_insert_with(|| SchemaColumnValue {
            id: crate::formulas::new_entity_id(),
            column_id: column_id.to_string(),
            holding: holding.clone(),
            value: None,
            is_edited: false,
            updated_at: Utc::now(),
        });
        Ok(entry.clone())
    }

    fn save(&self, value: SchemaColumnValue) -> Result<SchemaColumnValue> {
        let key = (value.column_id.clone(), value.holding.clone());
        self.values.insert(key, value.clone());
        Ok(value)
    }

    fn delete_for_column(&self, column_id: &str) -> Result<()> {
        self.values.retain(|(column, _), _| column.as_str() != column_id);
        Ok(())
    }

    fn delete_for_holding(&self, holding: &HoldingRef) -> Result<()> {
        self.values.retain(|(_, h), _| h != holding);
        Ok(())
    }

    fn list_for_holding(&self, holding: &HoldingRef) -> Result<Vec<SchemaColumnValue>> {
        let mut out: Vec<SchemaColumnValue> = self
            .values
            .iter()
            .filter(|entry| &entry.holding == holding)
            .map(|entry| entry.clone())
            .collect();
        out.sort_by(|a, b| a.column_id.cmp(&b.column_id));
        Ok(out)
    }
}

//! Schema domain models.

use serde::{Deserialize, Serialize};

use crate::holdings::AssetType;

use super::constraints::Constraint;

/// Data type of a schema column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    String,
    Decimal,
    Integer,
    Date,
    Boolean,
}

impl DataType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Decimal => "DECIMAL",
            DataType::Integer => "INTEGER",
            DataType::Date => "DATE",
            DataType::Boolean => "BOOLEAN",
        }
    }
}

/// Where a column's value comes from.
///
/// Closed tagged variants with one payload shape each; resolved by
/// exhaustive matching, never by string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "source", content = "payload")]
pub enum ColumnSource {
    /// Raw holding attribute, addressed by field path.
    Holding { field: String },
    /// Raw asset attribute, addressed by field path.
    Asset { field: String },
    /// Computed from a resolved formula definition.
    Formula { definition_id: String },
    /// User-added column with no backing source.
    Custom,
}

impl ColumnSource {
    pub fn is_formula(&self) -> bool {
        matches!(self, ColumnSource::Formula { .. })
    }
}

/// One column inside a composed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumn {
    pub id: String,
    pub schema_id: String,
    pub title: String,

    /// Stable snake_case identifier, unique within the schema; this is
    /// the name formulas reference.
    pub identifier: String,

    pub data_type: DataType,
    pub source: ColumnSource,
    pub constraints: Vec<Constraint>,

    /// Whether users may override the value. Always false for formula
    /// columns; only the override mechanism may substitute a value.
    pub is_editable: bool,
    pub is_deletable: bool,
    pub is_system: bool,
    pub display_order: u32,
}

impl SchemaColumn {
    /// Looks up a constraint by name.
    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }
}

/// A composed schema: the concrete column set for one account and asset
/// type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: String,
    pub account_id: String,
    pub asset_type: AssetType,
    /// Owner the schema was composed for; user-scoped formula
    /// definitions resolve against this.
    pub owner: Option<String>,
    pub columns: Vec<SchemaColumn>,
}

impl Schema {
    pub fn column_by_identifier(&self, identifier: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.identifier == identifier)
    }
}

/// Source specification on a template column. Formula entries bind by
/// the column identifier and are resolved through the definition
/// resolver at composition time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "source", content = "payload")]
pub enum TemplateColumnSource {
    Holding { field: String },
    Asset { field: String },
    Formula,
    Custom,
}

/// Blueprint for one column in a schema template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumnTemplate {
    pub title: String,
    pub identifier: String,
    pub data_type: DataType,
    pub source: TemplateColumnSource,
    /// Constraint overrides applied on top of the master constraints
    /// for the data type.
    pub constraints: Vec<Constraint>,
    pub is_editable: bool,
    pub is_deletable: bool,
    pub is_system: bool,
}

/// One blueprint per asset type, expanded into a concrete schema per
/// account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTemplate {
    pub asset_type: AssetType,
    pub columns: Vec<SchemaColumnTemplate>,
}

/// Context a schema is composed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaComposeContext {
    pub account_id: String,
    pub owner: Option<String>,
}

//! Formula domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::holdings::AssetType;

/// Pure named arithmetic expression.
///
/// Contains no schema or asset-type knowledge. `dependencies` is always
/// re-derived from the expression on save, never taken from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub id: String,

    /// None = system formula, shared and immutable.
    pub owner: Option<String>,

    pub title: String,

    /// Stable snake_case identifier, unique per owner scope.
    pub identifier: String,

    pub expression: String,

    /// Identifiers referenced by the expression, in first occurrence
    /// order.
    pub dependencies: Vec<String>,

    /// Optional precision override for computed results.
    pub decimal_places: Option<u32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Formula {
    pub fn is_system(&self) -> bool {
        self.owner.is_none()
    }
}

/// Payload for creating a formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFormula {
    pub owner: Option<String>,
    pub title: String,
    pub identifier: String,
    pub expression: String,
    pub decimal_places: Option<u32>,
}

/// Partial update for a formula. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaUpdate {
    pub title: Option<String>,
    pub expression: Option<String>,
    pub decimal_places: Option<Option<u32>>,
}

/// How missing formula dependencies are handled when a schema is
/// composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyPolicy {
    /// Missing dependency is a hard error.
    #[default]
    Strict,
    /// Missing dependency may be synthesized as a new schema column.
    AutoExpand,
}

impl DependencyPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DependencyPolicy::Strict => "STRICT",
            DependencyPolicy::AutoExpand => "AUTO_EXPAND",
        }
    }
}

/// Binds a semantic identifier (e.g. "current_value") to a concrete
/// formula for one asset type and owner scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaDefinition {
    pub id: String,
    pub identifier: String,
    pub name: String,
    pub description: String,
    pub asset_type: AssetType,
    pub formula_id: String,
    pub dependency_policy: DependencyPolicy,

    /// None = system definition, shared and immutable.
    pub owner: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl FormulaDefinition {
    pub fn is_system(&self) -> bool {
        self.owner.is_none()
    }
}

/// Payload for creating a formula definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFormulaDefinition {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub asset_type: AssetType,
    pub formula_id: String,
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,
}

/// Partial update for a formula definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaDefinitionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub formula_id: Option<String>,
    pub dependency_policy: Option<DependencyPolicy>,
}

pub(crate) fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

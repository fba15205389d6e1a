//! Trait contracts for formula storage and services.

use crate::errors::Result;
use crate::holdings::AssetType;

use super::formula_model::{
    Formula, FormulaDefinition, FormulaDefinitionUpdate, FormulaUpdate, NewFormula,
    NewFormulaDefinition,
};

/// Storage contract for formulas.
///
/// Implementations enforce identifier uniqueness per owner scope and
/// surface violations as `FormulaError::DuplicateIdentifier`.
pub trait FormulaRepositoryTrait: Send + Sync {
    fn insert(&self, formula: Formula) -> Result<Formula>;
    fn update(&self, formula: Formula) -> Result<Formula>;
    fn delete(&self, id: &str) -> Result<()>;
    fn get_by_id(&self, id: &str) -> Result<Option<Formula>>;
    fn find_by_identifier(&self, identifier: &str, owner: Option<&str>)
        -> Result<Option<Formula>>;
    fn list_by_owner(&self, owner: Option<&str>) -> Result<Vec<Formula>>;
}

/// Storage contract for formula definitions.
///
/// Implementations enforce `(identifier, asset_type, owner)` uniqueness.
pub trait FormulaDefinitionRepositoryTrait: Send + Sync {
    fn insert(&self, definition: FormulaDefinition) -> Result<FormulaDefinition>;
    fn update(&self, definition: FormulaDefinition) -> Result<FormulaDefinition>;
    fn delete(&self, id: &str) -> Result<()>;
    fn get_by_id(&self, id: &str) -> Result<Option<FormulaDefinition>>;
    fn find(
        &self,
        identifier: &str,
        asset_type: AssetType,
        owner: Option<&str>,
    ) -> Result<Option<FormulaDefinition>>;
    fn list_for_asset_type(
        &self,
        asset_type: AssetType,
        owner: Option<&str>,
    ) -> Result<Vec<FormulaDefinition>>;
}

/// Service contract for formula lifecycle.
pub trait FormulaServiceTrait: Send + Sync {
    fn create(&self, new_formula: NewFormula) -> Result<Formula>;
    fn update(&self, caller: Option<&str>, id: &str, update: FormulaUpdate) -> Result<Formula>;
    fn delete(&self, caller: Option<&str>, id: &str) -> Result<()>;
    fn get_by_id(&self, id: &str) -> Result<Formula>;
    /// Owner-scoped formula first, system fallback second.
    fn get_for_owner(&self, identifier: &str, owner: Option<&str>) -> Result<Formula>;
}

/// Service contract for formula definition lifecycle and resolution.
pub trait FormulaDefinitionServiceTrait: Send + Sync {
    fn create_user_definition(
        &self,
        owner: &str,
        new_definition: NewFormulaDefinition,
    ) -> Result<FormulaDefinition>;
    fn create_system_definition(
        &self,
        new_definition: NewFormulaDefinition,
    ) -> Result<FormulaDefinition>;
    fn update_definition(
        &self,
        caller: Option<&str>,
        id: &str,
        update: FormulaDefinitionUpdate,
    ) -> Result<FormulaDefinition>;
    fn delete_definition(&self, caller: Option<&str>, id: &str) -> Result<()>;

    /// Resolution order: owner-scoped definition first, system default
    /// second.
    fn resolve(
        &self,
        identifier: &str,
        asset_type: AssetType,
        owner: Option<&str>,
    ) -> Result<FormulaDefinition>;

    /// Union of system and owner-scoped definitions, owner rows taking
    /// precedence on identifier collision.
    fn list_available(
        &self,
        asset_type: AssetType,
        owner: Option<&str>,
    ) -> Result<Vec<FormulaDefinition>>;

    fn get_definition(&self, id: &str) -> Result<FormulaDefinition>;
    fn formula_for(&self, definition: &FormulaDefinition) -> Result<Formula>;
}

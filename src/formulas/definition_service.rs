//! Formula definition lifecycle and resolution.
//!
//! A definition binds a semantic identifier to a concrete formula for
//! one asset type. Resolution is owner-first with system fallback.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::holdings::AssetType;
use crate::utils::slugify_identifier;

use super::formula_errors::FormulaError;
use super::formula_model::{
    new_entity_id, Formula, FormulaDefinition, FormulaDefinitionUpdate, NewFormulaDefinition,
};
use super::formula_traits::{
    FormulaDefinitionRepositoryTrait, FormulaDefinitionServiceTrait, FormulaRepositoryTrait,
};
use super::registry::SystemIdentifierRegistry;

#[derive(Clone)]
pub struct FormulaDefinitionService {
    definitions: Arc<dyn FormulaDefinitionRepositoryTrait>,
    formulas: Arc<dyn FormulaRepositoryTrait>,
    registry: Arc<SystemIdentifierRegistry>,
}

impl FormulaDefinitionService {
    pub fn new(
        definitions: Arc<dyn FormulaDefinitionRepositoryTrait>,
        formulas: Arc<dyn FormulaRepositoryTrait>,
        registry: Arc<SystemIdentifierRegistry>,
    ) -> Self {
        Self {
            definitions,
            formulas,
            registry,
        }
    }

    fn formula_by_id(&self, formula_id: &str) -> Result<Formula> {
        self.formulas
            .get_by_id(formula_id)?
            .ok_or_else(|| Error::Repository(format!("Formula not found: {}", formula_id)))
    }

    /// A definition may only reference a formula in its own scope:
    /// system definitions bind system formulas, user definitions bind
    /// formulas of the same user.
    fn assert_scope_matches(owner: Option<&str>, formula: &Formula) -> Result<()> {
        match (owner, formula.owner.as_deref()) {
            (None, None) => Ok(()),
            (Some(owner), Some(formula_owner)) if owner == formula_owner => Ok(()),
            (None, Some(_)) => Err(FormulaError::Forbidden(
                "system definitions cannot reference a user-owned formula".to_string(),
            )
            .into()),
            (Some(_), None) => Err(FormulaError::Forbidden(
                "user definitions cannot reference a system formula".to_string(),
            )
            .into()),
            (Some(_), Some(_)) => Err(FormulaError::Forbidden(
                "you do not own the referenced formula".to_string(),
            )
            .into()),
        }
    }

    fn assert_can_edit(caller: Option<&str>, definition: &FormulaDefinition) -> Result<()> {
        match (&definition.owner, caller) {
            (None, _) => Err(FormulaError::Forbidden(
                "system formula definitions cannot be modified".to_string(),
            )
            .into()),
            (Some(owner), Some(caller)) if owner == caller => Ok(()),
            (Some(_), _) => Err(FormulaError::Forbidden(
                "you do not own this formula definition".to_string(),
            )
            .into()),
        }
    }

    fn create_definition(
        &self,
        owner: Option<String>,
        new_definition: NewFormulaDefinition,
    ) -> Result<FormulaDefinition> {
        let identifier = slugify_identifier(&new_definition.identifier);
        if identifier.is_empty() {
            return Err(Error::Validation(crate::errors::ValidationError::MissingField(
                "identifier".to_string(),
            )));
        }

        if owner.is_some() && self.registry.is_reserved(&identifier) {
            return Err(FormulaError::ReservedIdentifier(identifier).into());
        }

        let formula = self.formula_by_id(&new_definition.formula_id)?;
        Self::assert_scope_matches(owner.as_deref(), &formula)?;

        let definition = FormulaDefinition {
            id: new_entity_id(),
            identifier,
            name: new_definition.name,
            description: new_definition.description,
            asset_type: new_definition.asset_type,
            formula_id: new_definition.formula_id,
            dependency_policy: new_definition.dependency_policy,
            owner,
            created_at: Utc::now(),
        };

        self.definitions.insert(definition)
    }
}

impl FormulaDefinitionServiceTrait for FormulaDefinitionService {
    fn create_user_definition(
        &self,
        owner: &str,
        new_definition: NewFormulaDefinition,
    ) -> Result<FormulaDefinition> {
        self.create_definition(Some(owner.to_string()), new_definition)
    }

    fn create_system_definition(
        &self,
        new_definition: NewFormulaDefinition,
    ) -> Result<FormulaDefinition> {
        self.create_definition(None, new_definition)
    }

    fn update_definition(
        &self,
        caller: Option<&str>,
        id: &str,
        update: FormulaDefinitionUpdate,
    ) -> Result<FormulaDefinition> {
        let mut definition = self.get_definition(id)?;
        Self::assert_can_edit(caller, &definition)?;

        if let Some(name) = update.name {
            definition.name = name;
        }
        if let Some(description) = update.description {
            definition.description = description;
        }
        if let Some(formula_id) = update.formula_id {
            let formula = self.formula_by_id(&formula_id)?;
            Self::assert_scope_matches(definition.owner.as_deref(), &formula)?;
            definition.formula_id = formula_id;
        }
        if let Some(policy) = update.dependency_policy {
            definition.dependency_policy = policy;
        }

        self.definitions.update(definition)
    }

    fn delete_definition(&self, caller: Option<&str>, id: &str) -> Result<()> {
        let definition = self.get_definition(id)?;
        Self::assert_can_edit(caller, &definition)?;
        self.definitions.delete(id)
    }

    fn resolve(
        &self,
        identifier: &str,
        asset_type: AssetType,
        owner: Option<&str>,
    ) -> Result<FormulaDefinition> {
        if let Some(owner) = owner {
            if let Some(definition) = self.definitions.find(identifier, asset_type, Some(owner))? {
                return Ok(definition);
            }
        }
        self.definitions
            .find(identifier, asset_type, None)?
            .ok_or_else(|| {
                FormulaError::DefinitionNotFound {
                    identifier: identifier.to_string(),
                    asset_type: asset_type.as_str().to_string(),
                }
                .into()
            })
    }

    fn list_available(
        &self,
        asset_type: AssetType,
        owner: Option<&str>,
    ) -> Result<Vec<FormulaDefinition>> {
        // System rows first, shadowed by owner rows on identifier
        // collision. BTreeMap keeps the output ordered by identifier.
        let mut by_identifier: BTreeMap<String, FormulaDefinition> = BTreeMap::new();

        for definition in self.definitions.list_for_asset_type(asset_type, None)? {
            by_identifier.insert(definition.identifier.clone(), definition);
        }
        if let Some(owner) = owner {
            for definition in self
                .definitions
                .list_for_asset_type(asset_type, Some(owner))?
            {
                by_identifier.insert(definition.identifier.clone(), definition);
            }
        }

        Ok(by_identifier.into_values().collect())
    }

    fn get_definition(&self, id: &str) -> Result<FormulaDefinition> {
        self.definitions
            .get_by_id(id)?
            .ok_or_else(|| Error::Repository(format!("Formula definition not found: {}", id)))
    }

    fn formula_for(&self, definition: &FormulaDefinition) -> Result<Formula> {
        self.formula_by_id(&definition.formula_id)
    }
}

//! Formula lifecycle service.
//!
//! The only place where formulas are created, edited or deleted, and
//! where the system/user ownership boundary is enforced.

use chrono::Utc;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::utils::slugify_identifier;

use super::expression::Expr;
use super::formula_errors::FormulaError;
use super::formula_model::{new_entity_id, Formula, FormulaUpdate, NewFormula};
use super::formula_traits::{FormulaRepositoryTrait, FormulaServiceTrait};
use super::registry::SystemIdentifierRegistry;

#[derive(Clone)]
pub struct FormulaService {
    repository: Arc<dyn FormulaRepositoryTrait>,
    registry: Arc<SystemIdentifierRegistry>,
}

impl FormulaService {
    pub fn new(
        repository: Arc<dyn FormulaRepositoryTrait>,
        registry: Arc<SystemIdentifierRegistry>,
    ) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Parses the expression and re-derives the dependency list.
    ///
    /// Dependencies are never trusted from caller input; this runs on
    /// every save so the stored list cannot drift from the expression.
    fn derive_dependencies(identifier: &str, expression: &str) -> Result<Vec<String>> {
        let parsed = Expr::parse(expression)?;
        let dependencies = parsed.dependencies();
        if dependencies.iter().any(|dep| dep == identifier) {
            return Err(FormulaError::SelfReference(identifier.to_string()).into());
        }
        Ok(dependencies)
    }

    fn assert_can_edit(caller: Option<&str>, formula: &Formula) -> Result<()> {
        match (&formula.owner, caller) {
            (None, _) => {
                Err(FormulaError::Forbidden("system formulas cannot be modified".to_string())
                    .into())
            }
            (Some(owner), Some(caller)) if owner == caller => Ok(()),
            (Some(_), _) => {
                Err(FormulaError::Forbidden("you do not own this formula".to_string()).into())
            }
        }
    }
}

impl FormulaServiceTrait for FormulaService {
    fn create(&self, new_formula: NewFormula) -> Result<Formula> {
        let source = if new_formula.identifier.trim().is_empty() {
            &new_formula.title
        } else {
            &new_formula.identifier
        };
        let identifier = slugify_identifier(source);

        // Reserved identifiers are claimed by system formulas only.
        if new_formula.owner.is_some() && self.registry.is_reserved(&identifier) {
            return Err(FormulaError::ReservedIdentifier(identifier).into());
        }

        let dependencies = Self::derive_dependencies(&identifier, &new_formula.expression)?;

        let now = Utc::now();
        let formula = Formula {
            id: new_entity_id(),
            owner: new_formula.owner,
            title: new_formula.title,
            identifier,
            expression: new_formula.expression,
            dependencies,
            decimal_places: new_formula.decimal_places,
            created_at: now,
            updated_at: now,
        };

        self.repository.insert(formula)
    }

    fn update(&self, caller: Option<&str>, id: &str, update: FormulaUpdate) -> Result<Formula> {
        let mut formula = self.get_by_id(id)?;
        Self::assert_can_edit(caller, &formula)?;

        if let Some(title) = update.title {
            formula.title = title;
        }
        if let Some(expression) = update.expression {
            formula.expression = expression;
        }
        if let Some(decimal_places) = update.decimal_places {
            formula.decimal_places = decimal_places;
        }

        formula.dependencies =
            Self::derive_dependencies(&formula.identifier, &formula.expression)?;
        formula.updated_at = Utc::now();

        self.repository.update(formula)
    }

    fn delete(&self, caller: Option<&str>, id: &str) -> Result<()> {
        let formula = self.get_by_id(id)?;
        Self::assert_can_edit(caller, &formula)?;
        self.repository.delete(id)
    }

    fn get_by_id(&self, id: &str) -> Result<Formula> {
        self.repository
            .get_by_id(id)?
            .ok_or_else(|| Error::Repository(format!("Formula not found: {}", id)))
    }

    fn get_for_owner(&self, identifier: &str, owner: Option<&str>) -> Result<Formula> {
        if let Some(owner) = owner {
            if let Some(formula) = self.repository.find_by_identifier(identifier, Some(owner))? {
                return Ok(formula);
            }
        }
        self.repository
            .find_by_identifier(identifier, None)?
            .ok_or_else(|| Error::Repository(format!("Formula not found: {}", identifier)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryFormulaRepository;

    fn service() -> FormulaService {
        let registry = SystemIdentifierRegistry::builder()
            .reserve("current_value")
            .build();
        FormulaService::new(
            Arc::new(InMemoryFormulaRepository::new()),
            Arc::new(registry),
        )
    }

    fn new_formula(owner: Option<&str>, identifier: &str, expression: &str) -> NewFormula {
        NewFormula {
            owner: owner.map(str::to_string),
            title: identifier.replace('_', " "),
            identifier: identifier.to_string(),
            expression: expression.to_string(),
            decimal_places: None,
        }
    }

    #[test]
    fn dependencies_are_derived_from_expression() {
        let svc = service();
        let formula = svc
            .create(new_formula(Some("u1"), "market_value", "quantity * price"))
            .unwrap();
        assert_eq!(formula.dependencies, vec!["quantity", "price"]);
    }

    #[test]
    fn update_rederives_dependencies() {
        let svc = service();
        let formula = svc
            .create(new_formula(Some("u1"), "market_value", "quantity * price"))
            .unwrap();
        let updated = svc
            .update(
                Some("u1"),
                &formula.id,
                FormulaUpdate {
                    expression: Some("quantity * price - fee".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.dependencies, vec!["quantity", "price", "fee"]);
    }

    #[test]
    fn self_reference_is_rejected_at_save() {
        let svc = service();
        let err = svc
            .create(new_formula(Some("u1"), "gain", "gain + 1"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Formula(FormulaError::SelfReference(_))
        ));
    }

    #[test]
    fn reserved_identifier_is_rejected_for_users() {
        let svc = service();
        let err = svc
            .create(new_formula(Some("u1"), "current_value", "a + b"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Formula(FormulaError::ReservedIdentifier(_))
        ));

        // System scope may claim the reserved identifier.
        assert!(svc
            .create(new_formula(None, "current_value", "a + b"))
            .is_ok());
    }

    #[test]
    fn system_formulas_are_immutable() {
        let svc = service();
        let formula = svc
            .create(new_formula(None, "cost_basis", "quantity * purchase_price"))
            .unwrap();
        let err = svc
            .update(Some("u1"), &formula.id, FormulaUpdate::default())
            .unwrap_err();
        assert!(matches!(err, Error::Formula(FormulaError::Forbidden(_))));
        let err = svc.delete(Some("u1"), &formula.id).unwrap_err();
        assert!(matches!(err, Error::Formula(FormulaError::Forbidden(_))));
    }

    #[test]
    fn owner_scoped_lookup_falls_back_to_system() {
        let svc = service();
        svc.create(new_formula(None, "gain", "a - b")).unwrap();
        svc.create(new_formula(Some("u1"), "gain", "a - b - fee"))
            .unwrap();

        let own = svc.get_for_owner("gain", Some("u1")).unwrap();
        assert_eq!(own.owner.as_deref(), Some("u1"));

        let fallback = svc.get_for_owner("gain", Some("u2")).unwrap();
        assert!(fallback.is_system());
    }

    #[test]
    fn duplicate_identifier_per_owner_is_rejected() {
        let svc = service();
        svc.create(new_formula(Some("u1"), "gain", "a - b")).unwrap();
        let err = svc
            .create(new_formula(Some("u1"), "gain", "a * b"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Formula(FormulaError::DuplicateIdentifier(_))
        ));
    }
}

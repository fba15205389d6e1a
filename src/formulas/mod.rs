//! Formulas module - restricted arithmetic expressions, formula and
//! definition lifecycle, and the identifier registry.

mod definition_service;
mod expression;
mod formula_errors;
mod formula_model;
mod formula_service;
mod formula_traits;
mod registry;

#[cfg(test)]
mod expression_tests;

pub use definition_service::FormulaDefinitionService;
pub use expression::{round_result, BinaryOp, Expr, UnaryOp};
pub use formula_errors::FormulaError;
pub use formula_model::{
    DependencyPolicy, Formula, FormulaDefinition, FormulaDefinitionUpdate, FormulaUpdate,
    NewFormula, NewFormulaDefinition,
};
pub use formula_service::FormulaService;
pub use formula_traits::{
    FormulaDefinitionRepositoryTrait, FormulaDefinitionServiceTrait, FormulaRepositoryTrait,
    FormulaServiceTrait,
};
pub use registry::{SystemIdentifierRegistry, SystemIdentifierRegistryBuilder};

pub(crate) use formula_model::new_entity_id;

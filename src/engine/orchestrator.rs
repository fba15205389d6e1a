//! Recomputation orchestration.
//!
//! Single entry point for keeping stored column values consistent with
//! raw data, formulas and FX rates. Every mutation in the surrounding
//! domain funnels into one of the `RecomputeTrigger` methods; the
//! orchestrator walks the dependency graph and rewrites exactly the
//! affected cells.
//!
//! Failures are contained per cell: a column that cannot be computed is
//! logged with its holding and left at its previous value, and the
//! remaining columns still run.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error};
use rust_decimal::Decimal;

use crate::constants::DEFAULT_DECIMAL_PLACES;
use crate::errors::Result;
use crate::formulas::{
    round_result, DependencyPolicy, Expr, FormulaDefinitionServiceTrait, FormulaError,
    SystemIdentifierRegistry,
};
use crate::holdings::HoldingRef;
use crate::schemas::{
    decimal_places_of, validate_value, ColumnSource, ColumnValueRepositoryTrait, Schema,
    SchemaColumn, SchemaError, SchemaRepositoryTrait,
};

use super::dependency_graph::DependencyGraph;
use super::engine_traits::{
    FxRateProvider, HoldingsProvider, IdentifierValueProvider, RecomputeTrigger,
};

#[derive(Clone)]
pub struct RecomputeOrchestrator {
    schemas: Arc<dyn SchemaRepositoryTrait>,
    values: Arc<dyn ColumnValueRepositoryTrait>,
    definitions: Arc<dyn FormulaDefinitionServiceTrait>,
    holdings: Arc<dyn HoldingsProvider>,
    identifier_values: Arc<dyn IdentifierValueProvider>,
    fx: Arc<dyn FxRateProvider>,
    registry: Arc<SystemIdentifierRegistry>,
}

impl RecomputeOrchestrator {
    pub fn new(
        schemas: Arc<dyn SchemaRepositoryTrait>,
        values: Arc<dyn ColumnValueRepositoryTrait>,
        definitions: Arc<dyn FormulaDefinitionServiceTrait>,
        holdings: Arc<dyn HoldingsProvider>,
        identifier_values: Arc<dyn IdentifierValueProvider>,
        fx: Arc<dyn FxRateProvider>,
        registry: Arc<SystemIdentifierRegistry>,
    ) -> Self {
        Self {
            schemas,
            values,
            definitions,
            holdings,
            identifier_values,
            fx,
            registry,
        }
    }

    fn schema_for(&self, holding: &HoldingRef) -> Result<Option<Schema>> {
        let Some(schema_id) = self.holdings.schema_for_holding(holding)? else {
            return Ok(None);
        };
        self.schemas.get_schema(&schema_id)
    }

    /// Full refresh of one holding: raw columns from their providers
    /// first, then every formula column in dependency order.
    ///
    /// Running it twice without an input change gives byte-identical
    /// values, so callers may trigger it defensively.
    pub fn recompute_holding(&self, holding: &HoldingRef) -> Result<()> {
        let Some(schema) = self.schema_for(holding)? else {
            debug!("no schema for holding {holding}, skipping recompute");
            return Ok(());
        };

        for column in &schema.columns {
            if !column.source.is_formula() {
                self.refresh_raw_cell(column, holding);
            }
        }

        let graph = DependencyGraph::build(&schema.columns, self.definitions.as_ref())?;
        self.compute_formula_cells(&schema, holding, &graph.all_formula_columns_in_order());
        Ok(())
    }

    /// Pulls the current raw value for a non-formula cell. Overridden
    /// cells are left untouched.
    fn refresh_raw_cell(&self, column: &SchemaColumn, holding: &HoldingRef) {
        if let Err(err) = self.try_refresh_raw_cell(column, holding) {
            error!(
                "failed to refresh column '{}' for holding {}: {}",
                column.identifier, holding, err
            );
        }
    }

    fn try_refresh_raw_cell(&self, column: &SchemaColumn, holding: &HoldingRef) -> Result<()> {
        let mut cell = self.values.get_or_create(&column.id, holding)?;
        if cell.is_edited {
            return Ok(());
        }

        let Some(field) = Self::source_field(column) else {
            return Ok(());
        };
        let Some(raw) = self.identifier_values.value(holding, field)? else {
            return Ok(());
        };

        let normalized =
            validate_value(&raw.to_value_string(), column.data_type, &column.constraints)?;
        if cell.value.as_deref() == Some(normalized.as_str()) {
            return Ok(());
        }

        cell.value = Some(normalized);
        cell.updated_at = chrono::Utc::now();
        self.values.save(cell)?;
        Ok(())
    }

    /// Evaluates the given formula columns, in the order given. Each
    /// cell failure is logged and skipped; siblings still run.
    fn compute_formula_cells(&self, schema: &Schema, holding: &HoldingRef, targets: &[String]) {
        for identifier in targets {
            if let Err(err) = self.compute_one_cell(schema, holding, identifier) {
                error!(
                    "failed to compute column '{}' for holding {}: {}",
                    identifier, holding, err
                );
            }
        }
    }

    fn compute_one_cell(
        &self,
        schema: &Schema,
        holding: &HoldingRef,
        identifier: &str,
    ) -> Result<()> {
        let column = schema
            .column_by_identifier(identifier)
            .ok_or_else(|| SchemaError::ColumnNotFound(identifier.to_string()))?;
        let ColumnSource::Formula { definition_id } = &column.source else {
            return Ok(());
        };

        let mut cell = self.values.get_or_create(&column.id, holding)?;
        if cell.is_edited {
            // An override suspends computation for this cell; the
            // stored value still feeds downstream columns.
            debug!(
                "column '{}' overridden for holding {}, skipping",
                identifier, holding
            );
            return Ok(());
        }

        let definition = self.definitions.get_definition(definition_id)?;
        let formula = self.definitions.formula_for(&definition)?;
        let expression = Expr::parse(&formula.expression)?;

        let mut context: HashMap<String, Decimal> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        for dependency in &formula.dependencies {
            match self.dependency_value(schema, holding, dependency)? {
                Some(value) => {
                    context.insert(dependency.clone(), value);
                }
                None => match definition.dependency_policy {
                    DependencyPolicy::Strict => missing.push(dependency.clone()),
                    DependencyPolicy::AutoExpand => {
                        context.insert(dependency.clone(), Decimal::ZERO);
                    }
                },
            }
        }
        if !missing.is_empty() {
            return Err(FormulaError::MissingDependency {
                formula: formula.identifier.clone(),
                identifiers: missing,
            }
            .into());
        }

        let value = expression.evaluate(&context)?;
        let places = formula
            .decimal_places
            .or_else(|| decimal_places_of(&column.constraints))
            .unwrap_or(DEFAULT_DECIMAL_PLACES);
        let rounded = round_result(value, places);

        let serialized = rounded.to_string();
        // Computed writes pass through the same constraint gate as user
        // overrides; a violation blocks the write and the cell keeps
        // its previous value.
        validate_value(&serialized, column.data_type, &column.constraints)?;
        if cell.value.as_deref() == Some(serialized.as_str()) {
            return Ok(());
        }
        cell.value = Some(serialized);
        cell.updated_at = chrono::Utc::now();
        self.values.save(cell)?;
        Ok(())
    }

    /// Resolves one dependency identifier for evaluation.
    ///
    /// Precedence per cell: user override, then the stored computed or
    /// refreshed value, then the live provider value. Implicit
    /// identifiers never read columns; `fx_rate` resolves through the
    /// FX provider for the holding's valuation pair, defaulting to one
    /// when the holding is already in its account currency.
    fn dependency_value(
        &self,
        schema: &Schema,
        holding: &HoldingRef,
        identifier: &str,
    ) -> Result<Option<Decimal>> {
        if self.registry.is_implicit(identifier) {
            let Some((from, to)) = self.holdings.valuation_currency_pair(holding)? else {
                return Ok(Some(Decimal::ONE));
            };
            if from == to {
                return Ok(Some(Decimal::ONE));
            }
            return Ok(Some(self.fx.rate(&from, &to)?));
        }

        let Some(column) = schema.column_by_identifier(identifier) else {
            return Ok(None);
        };

        if let Some(cell) = self.values.get(&column.id, holding)? {
            if let Some(stored) = &cell.value {
                if cell.is_edited || column.source.is_formula() {
                    return Ok(stored.trim().parse().ok());
                }
            }
        }

        if let Some(field) = Self::source_field(column) {
            if let Some(raw) = self.identifier_values.value(holding, field)? {
                if let Some(value) = raw.as_decimal() {
                    return Ok(Some(value));
                }
            }
        }

        // Custom columns have no provider; fall back to whatever was
        // stored for the cell.
        if let Some(cell) = self.values.get(&column.id, holding)? {
            if let Some(stored) = &cell.value {
                return Ok(stored.trim().parse().ok());
            }
        }
        Ok(None)
    }

    /// Attribute path a raw cell reads from its provider. Formula and
    /// custom columns have no backing field.
    fn source_field(column: &SchemaColumn) -> Option<&str> {
        match &column.source {
            ColumnSource::Holding { field } | ColumnSource::Asset { field } => {
                Some(field.as_str())
            }
            ColumnSource::Formula { .. } | ColumnSource::Custom => None,
        }
    }

    /// Refreshes one changed cell, then the transitive closure of its
    /// dependents, leaving every other cell untouched.
    fn cascade_identifier(&self, holding: &HoldingRef, identifier: &str) -> Result<()> {
        let Some(schema) = self.schema_for(holding)? else {
            return Ok(());
        };
        let graph = DependencyGraph::build(&schema.columns, self.definitions.as_ref())?;

        if let Some(column) = schema.column_by_identifier(identifier) {
            if column.source.is_formula() {
                self.compute_formula_cells(&schema, holding, &[identifier.to_string()]);
            } else {
                self.refresh_raw_cell(column, holding);
            }
        }

        let affected = graph.affected_in_order(&[identifier.to_string()]);
        self.compute_formula_cells(&schema, holding, &affected);
        Ok(())
    }

    fn recompute_each(&self, holdings: Vec<HoldingRef>) -> Result<()> {
        for holding in holdings {
            if let Err(err) = self.recompute_holding(&holding) {
                error!("recompute failed for holding {holding}: {err}");
            }
        }
        Ok(())
    }
}

impl RecomputeTrigger for RecomputeOrchestrator {
    fn holding_changed(&self, holding: &HoldingRef) -> Result<()> {
        self.recompute_holding(holding)
    }

    fn asset_changed(&self, asset_id: &str) -> Result<()> {
        self.recompute_each(self.holdings.holdings_for_asset(asset_id)?)
    }

    fn fx_changed(&self, from_currency: &str, to_currency: &str) -> Result<()> {
        for holding in self
            .holdings
            .holdings_for_currency_pair(from_currency, to_currency)?
        {
            let Some(schema) = self.schema_for(&holding)? else {
                continue;
            };
            let graph = DependencyGraph::build(&schema.columns, self.definitions.as_ref())?;
            let affected =
                graph.affected_in_order(&[crate::constants::FX_RATE_IDENTIFIER.to_string()]);
            self.compute_formula_cells(&schema, &holding, &affected);
        }
        Ok(())
    }

    fn schema_changed(&self, schema_id: &str) -> Result<()> {
        self.recompute_each(self.holdings.holdings_for_schema(schema_id)?)
    }

    fn identifier_changed(&self, holding: &HoldingRef, identifier: &str) -> Result<()> {
        self.cascade_identifier(holding, identifier)
    }
}

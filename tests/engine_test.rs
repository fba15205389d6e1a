//! End-to-end tests: compose a schema, wire the orchestrator to mock
//! providers, and exercise recomputation, cascades and overrides.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use gridfolio_core::engine::{
    FxRateProvider, HoldingsProvider, IdentifierValueProvider, RawValue, RecomputeOrchestrator,
    RecomputeTrigger,
};
use gridfolio_core::errors::{Error, Result};
use gridfolio_core::formulas::{
    DependencyPolicy, FormulaDefinitionService, FormulaDefinitionServiceTrait, FormulaError,
    FormulaService, FormulaServiceTrait, NewFormula, NewFormulaDefinition,
    SystemIdentifierRegistry,
};
use gridfolio_core::holdings::{AssetType, EntityKind, HoldingRef};
use gridfolio_core::schemas::{
    equity_template, metal_template, ColumnValueRepositoryTrait, ColumnValueService, Constraint,
    DataType, Schema, SchemaColumnTemplate, SchemaComposeContext, SchemaComposer,
    SchemaRepositoryTrait, SchemaTemplate, TemplateColumnSource,
};
use gridfolio_core::store::{
    InMemoryColumnValueRepository, InMemoryFormulaDefinitionRepository, InMemoryFormulaRepository,
    InMemorySchemaRepository,
};

#[derive(Default)]
struct MockProviders {
    /// (holding, identifier) -> raw value
    raw_values: DashMap<(HoldingRef, String), RawValue>,
    /// holding -> schema id
    schema_by_holding: DashMap<HoldingRef, String>,
    /// holding -> asset id
    asset_by_holding: DashMap<HoldingRef, String>,
    /// holding -> (from, to) valuation currencies
    currency_pairs: DashMap<HoldingRef, (String, String)>,
    /// (from, to) -> rate
    fx_rates: DashMap<(String, String), Decimal>,
}

impl MockProviders {
    fn set_raw(&self, holding: &HoldingRef, identifier: &str, value: RawValue) {
        self.raw_values
            .insert((holding.clone(), identifier.to_string()), value);
    }

    fn register_holding(&self, holding: &HoldingRef, schema_id: &str, asset_id: &str) {
        self.schema_by_holding
            .insert(holding.clone(), schema_id.to_string());
        self.asset_by_holding
            .insert(holding.clone(), asset_id.to_string());
    }
}

impl IdentifierValueProvider for MockProviders {
    fn value(&self, holding: &HoldingRef, identifier: &str) -> Result<Option<RawValue>> {
        Ok(self
            .raw_values
            .get(&(holding.clone(), identifier.to_string()))
            .map(|v| v.clone()))
    }
}

impl FxRateProvider for MockProviders {
    fn rate(&self, from_currency: &str, to_currency: &str) -> Result<Decimal> {
        self.fx_rates
            .get(&(from_currency.to_string(), to_currency.to_string()))
            .map(|r| *r)
            .ok_or_else(|| Error::Fx(format!("no rate for {from_currency}/{to_currency}")))
    }
}

impl HoldingsProvider for MockProviders {
    fn holdings_for_asset(&self, asset_id: &str) -> Result<Vec<HoldingRef>> {
        let mut out: Vec<HoldingRef> = self
            .asset_by_holding
            .iter()
            .filter(|entry| entry.value().as_str() == asset_id)
            .map(|entry| entry.key().clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn holdings_for_schema(&self, schema_id: &str) -> Result<Vec<HoldingRef>> {
        let mut out: Vec<HoldingRef> = self
            .schema_by_holding
            .iter()
            .filter(|entry| entry.value().as_str() == schema_id)
            .map(|entry| entry.key().clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn holdings_for_currency_pair(&self, from: &str, to: &str) -> Result<Vec<HoldingRef>> {
        let mut out: Vec<HoldingRef> = self
            .currency_pairs
            .iter()
            .filter(|entry| entry.value().0 == from && entry.value().1 == to)
            .map(|entry| entry.key().clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn schema_for_holding(&self, holding: &HoldingRef) -> Result<Option<String>> {
        Ok(self.schema_by_holding.get(holding).map(|s| s.clone()))
    }

    fn account_for(&self, _holding: &HoldingRef) -> Result<String> {
        Ok("acct-1".to_string())
    }

    fn valuation_currency_pair(&self, holding: &HoldingRef) -> Result<Option<(String, String)>> {
        Ok(self.currency_pairs.get(holding).map(|p| p.clone()))
    }
}

struct World {
    providers: Arc<MockProviders>,
    values: Arc<InMemoryColumnValueRepository>,
    schemas: Arc<InMemorySchemaRepository>,
    formulas: Arc<FormulaService>,
    definitions: Arc<FormulaDefinitionService>,
    composer: SchemaComposer,
    value_service: ColumnValueService,
    orchestrator: RecomputeOrchestrator,
}

fn world() -> World {
    let registry = Arc::new(SystemIdentifierRegistry::default());
    let formula_repo = Arc::new(InMemoryFormulaRepository::new());
    let definition_repo = Arc::new(InMemoryFormulaDefinitionRepository::new());
    let schemas = Arc::new(InMemorySchemaRepository::new());
    let values = Arc::new(InMemoryColumnValueRepository::new());
    let providers = Arc::new(MockProviders::default());

    let formulas = Arc::new(FormulaService::new(formula_repo.clone(), registry.clone()));
    let definitions = Arc::new(FormulaDefinitionService::new(
        definition_repo,
        formula_repo,
        registry.clone(),
    ));
    let composer = SchemaComposer::new(
        schemas.clone(),
        values.clone(),
        definitions.clone(),
        registry.clone(),
    );
    let value_service = ColumnValueService::new(schemas.clone(), values.clone());
    let orchestrator = RecomputeOrchestrator::new(
        schemas.clone(),
        values.clone(),
        definitions.clone(),
        providers.clone(),
        providers.clone(),
        providers.clone(),
        registry,
    );

    World {
        providers,
        values,
        schemas,
        formulas,
        definitions,
        composer,
        value_service,
        orchestrator,
    }
}

impl World {
    fn seed_definition(&self, identifier: &str, expression: &str, asset_type: AssetType) {
        let formula = self
            .formulas
            .create(NewFormula {
                owner: None,
                title: identifier.to_string(),
                identifier: identifier.to_string(),
                expression: expression.to_string(),
                decimal_places: Some(2),
            })
            .unwrap();
        self.definitions
            .create_system_definition(NewFormulaDefinition {
                identifier: identifier.to_string(),
                name: identifier.to_string(),
                description: String::new(),
                asset_type,
                formula_id: formula.id,
                dependency_policy: DependencyPolicy::Strict,
            })
            .unwrap();
    }

    fn seed_current_value(&self, expression: &str) {
        self.seed_definition("current_value", expression, AssetType::Equity);
    }

    fn compose_equity(&self, account_id: &str) -> Schema {
        self.composer
            .compose(
                &equity_template(),
                &SchemaComposeContext {
                    account_id: account_id.to_string(),
                    owner: None,
                },
            )
            .unwrap()
    }

    /// Registers a holding with raw quantity and price.
    fn seed_holding(
        &self,
        schema: &Schema,
        id: &str,
        asset_id: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> HoldingRef {
        let holding = HoldingRef::new(EntityKind::EquityHolding, id);
        self.providers.register_holding(&holding, &schema.id, asset_id);
        self.providers
            .set_raw(&holding, "quantity", RawValue::Decimal(quantity));
        self.providers
            .set_raw(&holding, "price", RawValue::Decimal(price));
        self.providers
            .set_raw(&holding, "symbol", RawValue::Text("ACME".to_string()));
        self.providers
            .set_raw(&holding, "name", RawValue::Text("Acme Corp".to_string()));
        holding
    }

    fn cell_value(&self, schema: &Schema, identifier: &str, holding: &HoldingRef) -> Option<String> {
        let column = schema.column_by_identifier(identifier).unwrap();
        self.values
            .get(&column.id, holding)
            .unwrap()
            .and_then(|cell| cell.value)
    }
}

#[test]
fn computes_formula_columns_from_raw_values() {
    let w = world();
    w.seed_current_value("quantity * price");
    let schema = w.compose_equity("acct-1");
    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));

    w.orchestrator.holding_changed(&holding).unwrap();

    assert_eq!(w.cell_value(&schema, "quantity", &holding).unwrap(), "10.0000");
    assert_eq!(w.cell_value(&schema, "price", &holding).unwrap(), "2.50");
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "25.00"
    );
    assert_eq!(w.cell_value(&schema, "symbol", &holding).unwrap(), "ACME");
}

#[test]
fn recompute_is_idempotent() {
    let w = world();
    w.seed_current_value("quantity * price");
    let schema = w.compose_equity("acct-1");
    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));

    w.orchestrator.holding_changed(&holding).unwrap();
    let first: Vec<_> = w.values.list_for_holding(&holding).unwrap();
    w.orchestrator.holding_changed(&holding).unwrap();
    let second: Vec<_> = w.values.list_for_holding(&holding).unwrap();

    assert_eq!(first, second);
}

#[test]
fn asset_change_cascades_only_to_its_holdings() {
    let w = world();
    w.seed_current_value("quantity * price");
    let schema = w.compose_equity("acct-1");
    let acme = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));
    let other = w.seed_holding(&schema, "h2", "asset-other", dec!(3), dec!(7.00));

    w.orchestrator.holding_changed(&acme).unwrap();
    w.orchestrator.holding_changed(&other).unwrap();
    let other_before = w.values.list_for_holding(&other).unwrap();

    w.providers.set_raw(&acme, "price", RawValue::Decimal(dec!(3.00)));
    w.orchestrator.asset_changed("asset-acme").unwrap();

    assert_eq!(w.cell_value(&schema, "price", &acme).unwrap(), "3.00");
    assert_eq!(
        w.cell_value(&schema, "current_value", &acme).unwrap(),
        "30.00"
    );
    // The other asset's holding is untouched, timestamps included.
    assert_eq!(w.values.list_for_holding(&other).unwrap(), other_before);
}

#[test]
fn override_freezes_cell_and_feeds_dependents() {
    let w = world();
    w.seed_current_value("quantity * price");
    let schema = w.compose_equity("acct-1");
    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));
    w.orchestrator.holding_changed(&holding).unwrap();

    let price = schema.column_by_identifier("price").unwrap();
    w.value_service
        .apply_override(&price.id, &holding, "99", &w.orchestrator)
        .unwrap();

    // The override is normalized, stored, and cascaded downstream.
    assert_eq!(w.cell_value(&schema, "price", &holding).unwrap(), "99.00");
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "990.00"
    );

    // Later raw changes no longer touch the overridden cell, but the
    // cascade still reads the override.
    w.providers
        .set_raw(&holding, "price", RawValue::Decimal(dec!(5.00)));
    w.orchestrator.asset_changed("asset-acme").unwrap();
    assert_eq!(w.cell_value(&schema, "price", &holding).unwrap(), "99.00");
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "990.00"
    );
}

#[test]
fn clearing_an_override_recomputes_the_cell_and_its_closure() {
    let w = world();
    w.seed_current_value("quantity * price");
    let schema = w.compose_equity("acct-1");
    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));
    w.orchestrator.holding_changed(&holding).unwrap();

    let price = schema.column_by_identifier("price").unwrap();
    w.value_service
        .apply_override(&price.id, &holding, "99", &w.orchestrator)
        .unwrap();

    let cleared = w
        .value_service
        .clear_override(&price.id, &holding, &w.orchestrator)
        .unwrap();

    assert!(!cleared.is_edited);
    assert_eq!(cleared.value.as_deref(), Some("2.50"));
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "25.00"
    );
}

#[test]
fn formula_cells_reject_direct_overrides() {
    let w = world();
    w.seed_current_value("quantity * price");
    let schema = w.compose_equity("acct-1");
    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));
    w.orchestrator.holding_changed(&holding).unwrap();

    let cv = schema.column_by_identifier("current_value").unwrap();
    let err = w
        .value_service
        .apply_override(&cv.id, &holding, "1", &w.orchestrator)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Schema(gridfolio_core::schemas::SchemaError::NotEditable(_))
    ));
}

#[test]
fn fx_rate_resolves_through_the_provider() {
    let w = world();
    w.seed_current_value("quantity * price * fx_rate");
    let schema = w.compose_equity("acct-1");
    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));
    w.providers
        .currency_pairs
        .insert(holding.clone(), ("USD".to_string(), "EUR".to_string()));
    w.providers
        .fx_rates
        .insert(("USD".to_string(), "EUR".to_string()), dec!(0.90));

    w.orchestrator.holding_changed(&holding).unwrap();
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "22.50"
    );

    // A rate change cascades without a full holding refresh.
    w.providers
        .fx_rates
        .insert(("USD".to_string(), "EUR".to_string()), dec!(1.10));
    w.orchestrator.fx_changed("USD", "EUR").unwrap();
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "27.50"
    );
}

#[test]
fn holdings_without_currency_pair_use_unit_rate() {
    let w = world();
    w.seed_current_value("quantity * price * fx_rate");
    let schema = w.compose_equity("acct-1");
    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(4), dec!(5.00));

    w.orchestrator.holding_changed(&holding).unwrap();
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "20.00"
    );
}

#[test]
fn deleting_a_column_recomputes_schema_holdings() {
    let w = world();
    w.seed_current_value("quantity * price");
    let schema = w.compose_equity("acct-1");
    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));
    w.orchestrator.holding_changed(&holding).unwrap();

    let column = w
        .composer
        .add_custom_column(
            &schema.id,
            "Notes",
            gridfolio_core::schemas::DataType::String,
            &w.orchestrator,
        )
        .unwrap();

    w.composer
        .delete_column(&schema.id, &column.id, &w.orchestrator)
        .unwrap();
    assert!(w.values.get(&column.id, &holding).unwrap().is_none());

    let stored = w.schemas.get_schema(&schema.id).unwrap().unwrap();
    assert!(stored.column_by_identifier("notes").is_none());
}

#[test]
fn computed_writes_respect_column_bounds() {
    let w = world();
    w.seed_current_value("quantity * price");

    // Cap the computed column at 100.
    let mut template = equity_template();
    template
        .columns
        .iter_mut()
        .find(|c| c.identifier == "current_value")
        .unwrap()
        .constraints
        .push(Constraint::value_range(Some(dec!(0)), Some(dec!(100))));
    let schema = w
        .composer
        .compose(
            &template,
            &SchemaComposeContext {
                account_id: "acct-1".to_string(),
                owner: None,
            },
        )
        .unwrap();

    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));
    w.orchestrator.holding_changed(&holding).unwrap();
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "25.00"
    );

    // 10 * 99 breaches the bound; the write is blocked and the cell
    // keeps its previous value while the raw cell still refreshes.
    w.providers.set_raw(&holding, "price", RawValue::Decimal(dec!(99)));
    w.orchestrator.asset_changed("asset-acme").unwrap();
    assert_eq!(w.cell_value(&schema, "price", &holding).unwrap(), "99.00");
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "25.00"
    );
}

#[test]
fn raw_cells_resolve_through_their_source_field() {
    let w = world();
    w.seed_definition("current_value", "quantity * price", AssetType::Metal);

    let schema = w
        .composer
        .compose(
            &metal_template(),
            &SchemaComposeContext {
                account_id: "acct-1".to_string(),
                owner: None,
            },
        )
        .unwrap();

    // The metal quantity column maps to the "ounces" holding field.
    let holding = HoldingRef::new(EntityKind::MetalHolding, "m1");
    w.providers.register_holding(&holding, &schema.id, "asset-gold");
    w.providers
        .set_raw(&holding, "ounces", RawValue::Decimal(dec!(3)));
    w.providers
        .set_raw(&holding, "price", RawValue::Decimal(dec!(5.00)));

    w.orchestrator.holding_changed(&holding).unwrap();
    assert_eq!(
        w.cell_value(&schema, "quantity", &holding).unwrap(),
        "3.0000"
    );
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "15.00"
    );
}

#[test]
fn a_failing_cell_keeps_its_value_and_siblings_still_compute() {
    let w = world();
    w.seed_current_value("quantity * price");
    w.seed_definition("ratio", "price / divisor", AssetType::Equity);

    let mut template = equity_template();
    template.columns.push(SchemaColumnTemplate {
        title: "Divisor".to_string(),
        identifier: "divisor".to_string(),
        data_type: DataType::Decimal,
        source: TemplateColumnSource::Custom,
        constraints: vec![],
        is_editable: true,
        is_deletable: true,
        is_system: false,
    });
    template.columns.push(SchemaColumnTemplate {
        title: "Ratio".to_string(),
        identifier: "ratio".to_string(),
        data_type: DataType::Decimal,
        source: TemplateColumnSource::Formula,
        constraints: vec![],
        is_editable: false,
        is_deletable: false,
        is_system: true,
    });
    let schema = w
        .composer
        .compose(
            &template,
            &SchemaComposeContext {
                account_id: "acct-1".to_string(),
                owner: None,
            },
        )
        .unwrap();

    let holding = w.seed_holding(&schema, "h1", "asset-acme", dec!(10), dec!(2.50));
    let divisor = schema.column_by_identifier("divisor").unwrap();
    w.value_service
        .apply_override(&divisor.id, &holding, "2", &w.orchestrator)
        .unwrap();
    w.orchestrator.holding_changed(&holding).unwrap();
    assert_eq!(w.cell_value(&schema, "ratio", &holding).unwrap(), "1.25");

    // Division by zero fails the ratio cell only; it keeps its prior
    // value while sibling columns keep recomputing.
    w.value_service
        .apply_override(&divisor.id, &holding, "0", &w.orchestrator)
        .unwrap();
    assert_eq!(w.cell_value(&schema, "ratio", &holding).unwrap(), "1.25");

    w.providers.set_raw(&holding, "price", RawValue::Decimal(dec!(3.00)));
    w.orchestrator.asset_changed("asset-acme").unwrap();
    assert_eq!(
        w.cell_value(&schema, "current_value", &holding).unwrap(),
        "30.00"
    );
    assert_eq!(w.cell_value(&schema, "ratio", &holding).unwrap(), "1.25");
}

#[test]
fn duplicate_definitions_are_rejected_per_scope() {
    let w = world();
    w.seed_current_value("quantity * price");

    let formula = w
        .formulas
        .create(NewFormula {
            owner: None,
            title: "Another".to_string(),
            identifier: "another_value".to_string(),
            expression: "price".to_string(),
            decimal_places: None,
        })
        .unwrap();
    let err = w
        .definitions
        .create_system_definition(NewFormulaDefinition {
            identifier: "current_value".to_string(),
            name: "Clash".to_string(),
            description: String::new(),
            asset_type: AssetType::Equity,
            formula_id: formula.id,
            dependency_policy: DependencyPolicy::Strict,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Formula(FormulaError::DuplicateIdentifier(_))
    ));
}

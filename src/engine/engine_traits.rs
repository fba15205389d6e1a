//! Collaborator contracts consumed by the recomputation engine.
//!
//! Raw identifier values, FX rates and the holding/account hierarchy
//! live outside this crate; the engine reaches them only through these
//! traits.

use rust_decimal::Decimal;

use crate::errors::Result;
use crate::holdings::HoldingRef;

/// A raw value surfaced by the external domain for one identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Decimal(Decimal),
    Text(String),
    Flag(bool),
}

impl RawValue {
    /// Numeric view of the value, if it has one.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            RawValue::Decimal(value) => Some(*value),
            RawValue::Text(text) => text.trim().parse().ok(),
            RawValue::Flag(_) => None,
        }
    }

    /// Canonical string form for storage in a column value.
    pub fn to_value_string(&self) -> String {
        match self {
            RawValue::Decimal(value) => value.to_string(),
            RawValue::Text(text) => text.clone(),
            RawValue::Flag(flag) => flag.to_string(),
        }
    }
}

impl From<Decimal> for RawValue {
    fn from(value: Decimal) -> Self {
        RawValue::Decimal(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Decimal(Decimal::from(value))
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Supplies current raw values for identifiers, backed by holding
/// fields, asset fields or derived amounts.
pub trait IdentifierValueProvider: Send + Sync {
    /// Returns the current value of `identifier` for `holding`, or
    /// `None` if the identifier has no raw backing there.
    fn value(&self, holding: &HoldingRef, identifier: &str) -> Result<Option<RawValue>>;
}

/// Supplies FX conversion rates. May fail when the provider is
/// unavailable.
pub trait FxRateProvider: Send + Sync {
    fn rate(&self, from_currency: &str, to_currency: &str) -> Result<Decimal>;
}

/// Navigation over the external holding/account hierarchy.
pub trait HoldingsProvider: Send + Sync {
    fn holdings_for_asset(&self, asset_id: &str) -> Result<Vec<HoldingRef>>;
    fn holdings_for_schema(&self, schema_id: &str) -> Result<Vec<HoldingRef>>;
    /// Holdings whose valuation currency path includes the pair.
    fn holdings_for_currency_pair(&self, from: &str, to: &str) -> Result<Vec<HoldingRef>>;

    /// Active schema id for the holding's account, if composed.
    fn schema_for_holding(&self, holding: &HoldingRef) -> Result<Option<String>>;

    /// Explicit account capability; every holding kind knows its
    /// account.
    fn account_for(&self, holding: &HoldingRef) -> Result<String>;

    /// Valuation currency pair for the holding, when it is priced in a
    /// currency other than its account's.
    fn valuation_currency_pair(&self, holding: &HoldingRef) -> Result<Option<(String, String)>>;
}

/// Named recomputation triggers exposed by the orchestrator.
///
/// Callers invoke these directly; there is no implicit listener
/// registration.
pub trait RecomputeTrigger: Send + Sync {
    /// Recompute every formula-sourced column for this holding.
    fn holding_changed(&self, holding: &HoldingRef) -> Result<()>;

    /// Recompute all holdings referencing the asset.
    fn asset_changed(&self, asset_id: &str) -> Result<()>;

    /// Recompute all holdings whose valuation path includes the pair.
    fn fx_changed(&self, from_currency: &str, to_currency: &str) -> Result<()>;

    /// Recompute every holding under every account using the schema.
    fn schema_changed(&self, schema_id: &str) -> Result<()>;

    /// Refresh one cell and the transitive closure of its dependents.
    fn identifier_changed(&self, holding: &HoldingRef, identifier: &str) -> Result<()>;
}

//! Shared constants for the schema engine.

/// Precision applied to computed decimal values when neither the formula
/// nor the column declares one.
pub const DEFAULT_DECIMAL_PLACES: u32 = 2;

/// Identifier resolved at evaluation time from the FX rate provider
/// instead of a schema column.
pub const FX_RATE_IDENTIFIER: &str = "fx_rate";

// Well-known constraint names. Columns carry constraints keyed by these
// names; the validator interprets them per data type.
pub const CONSTRAINT_DECIMAL_PLACES: &str = "decimal_places";
pub const CONSTRAINT_VALUE_RANGE: &str = "value_range";
pub const CONSTRAINT_CHARACTER_LIMIT: &str = "character_limit";
pub const CONSTRAINT_CHARACTER_MINIMUM: &str = "character_minimum";
pub const CONSTRAINT_ALL_CAPS: &str = "all_caps";

/// Default maximum length for string columns without an explicit limit.
pub const DEFAULT_CHARACTER_LIMIT: i64 = 100;

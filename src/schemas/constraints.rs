//! Per-column value constraints and the constraint validator.
//!
//! Validation runs both when a user supplies an override and when a
//! computed value is written, so a formula bug cannot silently violate
//! declared bounds.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::constants::{
    CONSTRAINT_ALL_CAPS, CONSTRAINT_CHARACTER_LIMIT, CONSTRAINT_CHARACTER_MINIMUM,
    CONSTRAINT_DECIMAL_PLACES, CONSTRAINT_VALUE_RANGE, DEFAULT_CHARACTER_LIMIT,
    DEFAULT_DECIMAL_PLACES,
};
use crate::errors::Result;
use crate::formulas::round_result;

use super::schema_errors::SchemaError;
use super::schema_model::DataType;

/// Typed constraint parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type", content = "value")]
pub enum ConstraintValue {
    Decimal(Decimal),
    Integer(i64),
    Text(String),
    Flag(bool),
}

impl ConstraintValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConstraintValue::Integer(v) => Some(*v),
            ConstraintValue::Decimal(v) => v.to_i64(),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> bool {
        matches!(self, ConstraintValue::Flag(true))
    }
}

/// One validation/formatting rule attached to a schema column.
///
/// `min_limit`/`max_limit` carry inclusive bounds: for the
/// `value_range` constraint they bound the column value itself, for
/// parameterized constraints they bound edits of the parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub name: String,
    pub applies_to: DataType,
    pub value: Option<ConstraintValue>,
    pub min_limit: Option<Decimal>,
    pub max_limit: Option<Decimal>,
    pub is_editable: bool,
}

impl Constraint {
    pub fn decimal_places(value: i64) -> Self {
        Constraint {
            name: CONSTRAINT_DECIMAL_PLACES.to_string(),
            applies_to: DataType::Decimal,
            value: Some(ConstraintValue::Integer(value)),
            min_limit: Some(Decimal::ZERO),
            max_limit: Some(Decimal::from(20)),
            is_editable: true,
        }
    }

    pub fn value_range(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Constraint {
            name: CONSTRAINT_VALUE_RANGE.to_string(),
            applies_to: DataType::Decimal,
            value: None,
            min_limit: min,
            max_limit: max,
            is_editable: false,
        }
    }

    pub fn character_limit(limit: i64) -> Self {
        Constraint {
            name: CONSTRAINT_CHARACTER_LIMIT.to_string(),
            applies_to: DataType::String,
            value: Some(ConstraintValue::Integer(limit)),
            min_limit: Some(Decimal::ONE),
            max_limit: Some(Decimal::from(255)),
            is_editable: false,
        }
    }

    pub fn character_minimum(minimum: i64) -> Self {
        Constraint {
            name: CONSTRAINT_CHARACTER_MINIMUM.to_string(),
            applies_to: DataType::String,
            value: Some(ConstraintValue::Integer(minimum)),
            min_limit: Some(Decimal::ZERO),
            max_limit: Some(Decimal::from(255)),
            is_editable: false,
        }
    }

    pub fn all_caps() -> Self {
        Constraint {
            name: CONSTRAINT_ALL_CAPS.to_string(),
            applies_to: DataType::String,
            value: Some(ConstraintValue::Flag(true)),
            min_limit: None,
            max_limit: None,
            is_editable: false,
        }
    }
}

/// Master constraint seeds per data type, applied when a column is
/// created without explicit overrides.
pub fn master_constraints_for(data_type: DataType) -> Vec<Constraint> {
    match data_type {
        DataType::Decimal => vec![Constraint::decimal_places(DEFAULT_DECIMAL_PLACES as i64)],
        DataType::String => vec![Constraint::character_limit(DEFAULT_CHARACTER_LIMIT)],
        DataType::Integer | DataType::Date | DataType::Boolean => Vec::new(),
    }
}

/// Merges template constraint overrides on top of the master seeds for
/// the data type. Overrides replace seeds with the same name.
pub fn merge_constraints(data_type: DataType, overrides: &[Constraint]) -> Vec<Constraint> {
    let mut merged = master_constraints_for(data_type);
    for over in overrides {
        if let Some(existing) = merged.iter_mut().find(|c| c.name == over.name) {
            *existing = over.clone();
        } else {
            merged.push(over.clone());
        }
    }
    merged
}

/// Effective precision for a column's decimal values.
pub fn decimal_places_of(constraints: &[Constraint]) -> Option<u32> {
    constraints
        .iter()
        .find(|c| c.name == CONSTRAINT_DECIMAL_PLACES)
        .and_then(|c| c.value.as_ref())
        .and_then(ConstraintValue::as_integer)
        .and_then(|v| u32::try_from(v).ok())
}

/// Validates and normalizes a raw value for a column.
///
/// Coerces to the declared data type, applies bounds and formatting
/// rules, and returns the canonical stored string.
pub fn validate_value(
    raw: &str,
    data_type: DataType,
    constraints: &[Constraint],
) -> Result<String> {
    match data_type {
        DataType::Decimal => {
            let parsed = Decimal::from_str(raw.trim()).map_err(|_| {
                SchemaError::ConstraintViolation(format!("'{}' is not a valid decimal", raw))
            })?;
            let bounded = check_bounds(parsed, constraints)?;
            let places = decimal_places_of(constraints).unwrap_or(DEFAULT_DECIMAL_PLACES);
            Ok(round_result(bounded, places).to_string())
        }
        DataType::Integer => {
            let parsed: i64 = raw.trim().parse().map_err(|_| {
                SchemaError::ConstraintViolation(format!("'{}' is not a valid integer", raw))
            })?;
            check_bounds(Decimal::from(parsed), constraints)?;
            Ok(parsed.to_string())
        }
        DataType::Date => {
            let parsed = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                SchemaError::ConstraintViolation(format!(
                    "'{}' is not a valid date (expected YYYY-MM-DD)",
                    raw
                ))
            })?;
            Ok(parsed.format("%Y-%m-%d").to_string())
        }
        DataType::Boolean => parse_boolean(raw)
            .map(|b| b.to_string())
            .ok_or_else(|| {
                SchemaError::ConstraintViolation(format!("'{}' is not a valid boolean", raw)).into()
            }),
        DataType::String => {
            let mut value = raw.to_string();
            for constraint in constraints {
                if constraint.applies_to != DataType::String {
                    continue;
                }
                match constraint.name.as_str() {
                    CONSTRAINT_CHARACTER_LIMIT => {
                        if let Some(limit) = constraint
                            .value
                            .as_ref()
                            .and_then(ConstraintValue::as_integer)
                        {
                            if value.chars().count() as i64 > limit {
                                return Err(SchemaError::ConstraintViolation(format!(
                                    "value must be at most {} characters",
                                    limit
                                ))
                                .into());
                            }
                        }
                    }
                    CONSTRAINT_CHARACTER_MINIMUM => {
                        if let Some(minimum) = constraint
                            .value
                            .as_ref()
                            .and_then(ConstraintValue::as_integer)
                        {
                            if (value.chars().count() as i64) < minimum {
                                return Err(SchemaError::ConstraintViolation(format!(
                                    "value must be at least {} characters",
                                    minimum
                                ))
                                .into());
                            }
                        }
                    }
                    CONSTRAINT_ALL_CAPS => {
                        if constraint.value.as_ref().is_some_and(|v| v.as_flag()) {
                            value = value.to_uppercase();
                        }
                    }
                    _ => {}
                }
            }
            Ok(value)
        }
    }
}

fn check_bounds(value: Decimal, constraints: &[Constraint]) -> Result<Decimal> {
    for constraint in constraints {
        if constraint.name != CONSTRAINT_VALUE_RANGE {
            continue;
        }
        if let Some(min) = constraint.min_limit {
            if value < min {
                return Err(SchemaError::ConstraintViolation(format!(
                    "value {} is below the minimum {}",
                    value, min
                ))
                .into());
            }
        }
        if let Some(max) = constraint.max_limit {
            if value > max {
                return Err(SchemaError::ConstraintViolation(format!(
                    "value {} is above the maximum {}",
                    value, max
                ))
                .into());
            }
        }
    }
    Ok(value)
}

/// Accepts true/1/yes and false/0/no in any case.
pub fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

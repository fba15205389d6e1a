//! Seed schema templates per asset type.
//!
//! Formula-sourced entries bind by identifier; the matching system
//! formula definitions must be registered before composition.

use rust_decimal::Decimal;

use crate::holdings::AssetType;

use super::constraints::Constraint;
use super::schema_model::{
    DataType, SchemaColumnTemplate, SchemaTemplate, TemplateColumnSource,
};

fn symbol_column(character_limit: i64) -> SchemaColumnTemplate {
    SchemaColumnTemplate {
        title: "Symbol".to_string(),
        identifier: "symbol".to_string(),
        data_type: DataType::String,
        source: TemplateColumnSource::Asset {
            field: "symbol".to_string(),
        },
        constraints: vec![Constraint::character_limit(character_limit), Constraint::all_caps()],
        is_editable: false,
        is_deletable: false,
        is_system: true,
    }
}

fn name_column() -> SchemaColumnTemplate {
    SchemaColumnTemplate {
        title: "Name".to_string(),
        identifier: "name".to_string(),
        data_type: DataType::String,
        source: TemplateColumnSource::Asset {
            field: "name".to_string(),
        },
        constraints: vec![Constraint::character_limit(200)],
        is_editable: true,
        is_deletable: true,
        is_system: true,
    }
}

fn price_column(decimal_places: i64) -> SchemaColumnTemplate {
    SchemaColumnTemplate {
        title: "Price".to_string(),
        identifier: "price".to_string(),
        data_type: DataType::Decimal,
        source: TemplateColumnSource::Asset {
            field: "price".to_string(),
        },
        constraints: vec![
            Constraint::decimal_places(decimal_places),
            Constraint::value_range(Some(Decimal::ZERO), None),
        ],
        is_editable: true,
        is_deletable: false,
        is_system: true,
    }
}

fn quantity_column(decimal_places: i64) -> SchemaColumnTemplate {
    SchemaColumnTemplate {
        title: "Quantity".to_string(),
        identifier: "quantity".to_string(),
        data_type: DataType::Decimal,
        source: TemplateColumnSource::Holding {
            field: "quantity".to_string(),
        },
        constraints: vec![
            Constraint::decimal_places(decimal_places),
            Constraint::value_range(Some(Decimal::ZERO), None),
        ],
        is_editable: true,
        is_deletable: false,
        is_system: true,
    }
}

fn current_value_column() -> SchemaColumnTemplate {
    SchemaColumnTemplate {
        title: "Current Value".to_string(),
        identifier: "current_value".to_string(),
        data_type: DataType::Decimal,
        source: TemplateColumnSource::Formula,
        constraints: vec![Constraint::decimal_places(2)],
        is_editable: false,
        is_deletable: false,
        is_system: true,
    }
}

/// Blueprint for equity accounts.
pub fn equity_template() -> SchemaTemplate {
    SchemaTemplate {
        asset_type: AssetType::Equity,
        columns: vec![
            symbol_column(10),
            name_column(),
            price_column(2),
            quantity_column(4),
            current_value_column(),
        ],
    }
}

/// Blueprint for crypto accounts; quantities carry more precision.
pub fn crypto_template() -> SchemaTemplate {
    SchemaTemplate {
        asset_type: AssetType::Crypto,
        columns: vec![
            symbol_column(10),
            name_column(),
            price_column(2),
            quantity_column(8),
            current_value_column(),
        ],
    }
}

/// Blueprint for precious metal accounts; quantity is weight in ounces.
pub fn metal_template() -> SchemaTemplate {
    SchemaTemplate {
        asset_type: AssetType::Metal,
        columns: vec![
            symbol_column(10),
            name_column(),
            price_column(2),
            SchemaColumnTemplate {
                title: "Ounces".to_string(),
                identifier: "quantity".to_string(),
                data_type: DataType::Decimal,
                source: TemplateColumnSource::Holding {
                    field: "ounces".to_string(),
                },
                constraints: vec![
                    Constraint::decimal_places(4),
                    Constraint::value_range(Some(Decimal::ZERO), None),
                ],
                is_editable: true,
                is_deletable: false,
                is_system: true,
            },
            current_value_column(),
        ],
    }
}

/// Seed template for an asset type.
pub fn template_for(asset_type: AssetType) -> Option<SchemaTemplate> {
    match asset_type {
        AssetType::Equity => Some(equity_template()),
        AssetType::Crypto => Some(crypto_template()),
        AssetType::Metal => Some(metal_template()),
        AssetType::Custom => None,
    }
}

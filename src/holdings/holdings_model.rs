//! Reference types for entities owned outside the engine.
//!
//! The account/portfolio hierarchy is a collaborator, not part of this
//! crate. Column values attach to holdings through an explicit
//! `(entity_kind, entity_id)` pair validated against a closed enumeration,
//! never through an untyped polymorphic join.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset class a schema is composed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Equity,
    Crypto,
    Metal,
    Custom,
}

impl AssetType {
    /// Returns the storage string representation (SCREAMING_SNAKE_CASE).
    pub const fn as_str(&self) -> &'static str {
        match self {
            AssetType::Equity => "EQUITY",
            AssetType::Crypto => "CRYPTO",
            AssetType::Metal => "METAL",
            AssetType::Custom => "CUSTOM",
        }
    }

    /// Parses an asset type from its storage string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "EQUITY" => Some(AssetType::Equity),
            "CRYPTO" => Some(AssetType::Crypto),
            "METAL" => Some(AssetType::Metal),
            "CUSTOM" => Some(AssetType::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of holding entity a column value can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    EquityHolding,
    CryptoHolding,
    MetalHolding,
    CustomHolding,
}

impl EntityKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::EquityHolding => "EQUITY_HOLDING",
            EntityKind::CryptoHolding => "CRYPTO_HOLDING",
            EntityKind::MetalHolding => "METAL_HOLDING",
            EntityKind::CustomHolding => "CUSTOM_HOLDING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "EQUITY_HOLDING" => Some(EntityKind::EquityHolding),
            "CRYPTO_HOLDING" => Some(EntityKind::CryptoHolding),
            "METAL_HOLDING" => Some(EntityKind::MetalHolding),
            "CUSTOM_HOLDING" => Some(EntityKind::CustomHolding),
            _ => None,
        }
    }

    /// Asset class this holding kind carries.
    pub const fn asset_type(&self) -> AssetType {
        match self {
            EntityKind::EquityHolding => AssetType::Equity,
            EntityKind::CryptoHolding => AssetType::Crypto,
            EntityKind::MetalHolding => AssetType::Metal,
            EntityKind::CustomHolding => AssetType::Custom,
        }
    }
}

/// Typed reference to one holding row in the external domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRef {
    pub kind: EntityKind,
    pub id: String,
}

impl HoldingRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for HoldingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

//! Holding references - typed links into the external account/portfolio domain.

mod holdings_model;

pub use holdings_model::{AssetType, EntityKind, HoldingRef};

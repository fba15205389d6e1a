//! Materialized column values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::holdings::HoldingRef;

/// The stored value of one schema column for one holding.
///
/// Rows are created lazily on first computation and deleted with the
/// holding or column. When `is_edited` is false the value always equals
/// the last successful computation; when true, a user override is in
/// effect and computation for this cell is suspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumnValue {
    pub id: String,
    pub column_id: String,
    pub holding: HoldingRef,
    pub value: Option<String>,
    pub is_edited: bool,
    pub updated_at: DateTime<Utc>,
}

//! Dynamic schema and formula computation engine for holdings data.
//!
//! Accounts get a column schema composed from per-asset-type templates;
//! columns draw their values from raw holding or asset fields, from
//! user input, or from named arithmetic formulas over other columns.
//! The engine keeps every stored value consistent by walking the column
//! dependency graph whenever an input changes, while honoring per-cell
//! user overrides.

pub mod constants;
pub mod engine;
pub mod errors;
pub mod formulas;
pub mod holdings;
pub mod schemas;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};

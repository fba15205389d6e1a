//! Identifier slug normalization.
//!
//! Column and formula identifiers are snake_case slugs derived from
//! user-facing titles, e.g. "Unrealized Gain %" -> "unrealized_gain".

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_IDENTIFIER: Regex =
        Regex::new(r"[^a-z0-9]+").expect("invalid slug regex");
}

/// Normalizes a title or raw identifier into a snake_case slug usable
/// inside formula expressions.
///
/// Leading digits are prefixed with an underscore so the result is
/// always a valid expression identifier. An input with no usable
/// characters normalizes to "column".
pub fn slugify_identifier(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let replaced = NON_IDENTIFIER.replace_all(&lowered, "_");
    let trimmed = replaced.trim_matches('_');

    if trimmed.is_empty() {
        return "column".to_string();
    }

    match trimmed.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{}", trimmed),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_titles() {
        assert_eq!(slugify_identifier("Unrealized Gain %"), "unrealized_gain");
        assert_eq!(slugify_identifier("Current Value"), "current_value");
        assert_eq!(slugify_identifier("  price  "), "price");
        assert_eq!(slugify_identifier("P/E Ratio"), "p_e_ratio");
    }

    #[test]
    fn handles_degenerate_titles() {
        assert_eq!(slugify_identifier("%%%"), "column");
        assert_eq!(slugify_identifier("52 Week High"), "_52_week_high");
        assert_eq!(slugify_identifier("already_snake"), "already_snake");
    }
}

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::formulas::expression::{round_result, Expr};
use crate::formulas::FormulaError;

fn ctx(pairs: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
}

#[test]
fn parses_and_evaluates_basic_arithmetic() {
    let expr = Expr::parse("quantity * price").unwrap();
    let result = expr
        .evaluate(&ctx(&[("quantity", dec!(10)), ("price", dec!(2.50))]))
        .unwrap();
    assert_eq!(result, dec!(25.00));
}

#[test]
fn respects_operator_precedence() {
    let expr = Expr::parse("2 + 3 * 4").unwrap();
    assert_eq!(expr.evaluate(&ctx(&[])).unwrap(), dec!(14));

    let expr = Expr::parse("(2 + 3) * 4").unwrap();
    assert_eq!(expr.evaluate(&ctx(&[])).unwrap(), dec!(20));

    let expr = Expr::parse("10 - 4 - 3").unwrap();
    assert_eq!(expr.evaluate(&ctx(&[])).unwrap(), dec!(3));
}

#[test]
fn supports_unary_sign_and_exponent() {
    let expr = Expr::parse("-price + 1").unwrap();
    assert_eq!(
        expr.evaluate(&ctx(&[("price", dec!(2.5))])).unwrap(),
        dec!(-1.5)
    );

    let expr = Expr::parse("2 ^ 10").unwrap();
    assert_eq!(expr.evaluate(&ctx(&[])).unwrap(), dec!(1024));

    // '**' is the alternate exponent spelling.
    let expr = Expr::parse("2 ** 3").unwrap();
    assert_eq!(expr.evaluate(&ctx(&[])).unwrap(), dec!(8));

    let expr = Expr::parse("2 ^ -1").unwrap();
    assert_eq!(expr.evaluate(&ctx(&[])).unwrap(), dec!(0.5));
}

#[test]
fn decimal_arithmetic_is_exact() {
    let expr = Expr::parse("a + b").unwrap();
    let result = expr
        .evaluate(&ctx(&[("a", dec!(0.1)), ("b", dec!(0.2))]))
        .unwrap();
    assert_eq!(result, dec!(0.3));
}

#[test]
fn division_by_zero_is_an_evaluation_error() {
    let expr = Expr::parse("a / b").unwrap();
    let err = expr
        .evaluate(&ctx(&[("a", dec!(1)), ("b", dec!(0))]))
        .unwrap_err();
    assert!(matches!(err, FormulaError::Evaluation(_)));
}

#[test]
fn missing_identifier_is_an_evaluation_error() {
    let expr = Expr::parse("a + b").unwrap();
    let err = expr.evaluate(&ctx(&[("a", dec!(1))])).unwrap_err();
    assert!(matches!(err, FormulaError::Evaluation(_)));
}

#[test]
fn rejects_disallowed_constructs() {
    for bad in [
        "",
        "   ",
        "max(a, b)",
        "a > b",
        "a.field",
        "'text'",
        "a && b",
        "a +",
        "(a + b",
        "1.2.3",
        "a b",
        "a = b",
        "[1, 2]",
    ] {
        let err = Expr::parse(bad).unwrap_err();
        assert!(
            matches!(err, FormulaError::InvalidExpression(_)),
            "expected InvalidExpression for {:?}",
            bad
        );
    }
}

#[test]
fn extracts_dependencies_in_first_occurrence_order() {
    let expr = Expr::parse("(last_price - purchase_price) * quantity + last_price").unwrap();
    assert_eq!(
        expr.dependencies(),
        vec!["last_price", "purchase_price", "quantity"]
    );
}

#[test]
fn numeric_literals_are_not_dependencies() {
    let expr = Expr::parse("price * 100 + 0.5").unwrap();
    assert_eq!(expr.dependencies(), vec!["price"]);
}

#[test]
fn rounds_half_up() {
    assert_eq!(round_result(dec!(2.345), 2), dec!(2.35));
    assert_eq!(round_result(dec!(2.344), 2), dec!(2.34));
    assert_eq!(round_result(dec!(-2.345), 2), dec!(-2.35));
    assert_eq!(round_result(dec!(25), 2), dec!(25.00));
    assert_eq!(round_result(dec!(25), 2).to_string(), "25.00");
    assert_eq!(round_result(dec!(990), 2).to_string(), "990.00");
}

// Property: for all valid expressions the extracted dependency set
// exactly equals the set of free identifiers in the expression.
fn arb_expr() -> impl Strategy<Value = (String, BTreeSet<String>)> {
    let identifiers = prop::sample::select(vec![
        "price",
        "quantity",
        "fee",
        "cost_basis",
        "fx_rate",
        "last_price",
    ]);
    let leaf = prop_oneof![
        (0u32..10_000).prop_map(|n| (n.to_string(), BTreeSet::new())),
        identifiers.prop_map(|name| {
            (
                name.to_string(),
                BTreeSet::from([name.to_string()]),
            )
        }),
    ];
    leaf.prop_recursive(4, 48, 2, |inner| {
        (
            inner.clone(),
            prop::sample::select(vec!["+", "-", "*", "/", "^"]),
            inner,
        )
            .prop_map(|((left, mut left_ids), op, (right, right_ids))| {
                left_ids.extend(right_ids);
                (format!("({} {} {})", left, op, right), left_ids)
            })
    })
}

proptest! {
    #[test]
    fn extracted_dependencies_equal_free_identifiers((expression, expected) in arb_expr()) {
        let parsed = Expr::parse(&expression).unwrap();
        let extracted: BTreeSet<String> = parsed.dependencies().into_iter().collect();
        prop_assert_eq!(extracted, expected);
    }
}

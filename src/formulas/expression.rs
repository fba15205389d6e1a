//! Restricted arithmetic expression parser and evaluator.
//!
//! The grammar is intentionally a small arithmetic subset:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := primary (('^' | '**') unary)?        (right-associative)
//! primary := NUMBER | IDENTIFIER | '(' expr ')'
//! ```
//!
//! No function calls, comparisons, strings or attribute access. Parsing
//! is pure; evaluation substitutes `Decimal` values from a context map
//! and never touches floating point.

use num_traits::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use super::formula_errors::FormulaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    const fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// Parsed expression tree over the restricted grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Decimal),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Parses expression text, rejecting anything outside the grammar.
    pub fn parse(input: &str) -> Result<Expr, FormulaError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(FormulaError::InvalidExpression(format!(
                "unexpected trailing token '{}'",
                tok
            ))),
        }
    }

    /// Returns the referenced identifiers, de-duplicated, in first
    /// occurrence order.
    pub fn dependencies(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        self.collect_identifiers(&mut seen, &mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, seen: &mut HashSet<&'a str>, out: &mut Vec<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Identifier(name) => {
                if seen.insert(name.as_str()) {
                    out.push(name.clone());
                }
            }
            Expr::Unary { operand, .. } => operand.collect_identifiers(seen, out),
            Expr::Binary { left, right, .. } => {
                left.collect_identifiers(seen, out);
                right.collect_identifiers(seen, out);
            }
        }
    }

    /// Evaluates the expression against an identifier -> value context
    /// using exact decimal arithmetic.
    pub fn evaluate(&self, context: &HashMap<String, Decimal>) -> Result<Decimal, FormulaError> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Identifier(name) => context.get(name).copied().ok_or_else(|| {
                FormulaError::Evaluation(format!("identifier '{}' has no value", name))
            }),
            Expr::Unary { op, operand } => {
                let value = operand.evaluate(context)?;
                Ok(match op {
                    UnaryOp::Plus => value,
                    UnaryOp::Minus => -value,
                })
            }
            Expr::Binary { op, left, right } => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;
                apply_binary(*op, lhs, rhs)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Identifier(name) => f.write_str(name),
            Expr::Unary { op, operand } => {
                let sign = match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Minus => "-",
                };
                write!(f, "{}{}", sign, operand)
            }
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
        }
    }
}

fn apply_binary(op: BinaryOp, lhs: Decimal, rhs: Decimal) -> Result<Decimal, FormulaError> {
    let overflow = || FormulaError::Evaluation("arithmetic overflow".to_string());
    match op {
        BinaryOp::Add => lhs.checked_add(rhs).ok_or_else(overflow),
        BinaryOp::Sub => lhs.checked_sub(rhs).ok_or_else(overflow),
        BinaryOp::Mul => lhs.checked_mul(rhs).ok_or_else(overflow),
        BinaryOp::Div => {
            if rhs.is_zero() {
                return Err(FormulaError::Evaluation("division by zero".to_string()));
            }
            lhs.checked_div(rhs).ok_or_else(overflow)
        }
        BinaryOp::Pow => {
            if rhs.fract().is_zero() {
                let exp = rhs.to_i64().ok_or_else(|| {
                    FormulaError::Evaluation("exponent out of range".to_string())
                })?;
                lhs.checked_powi(exp).ok_or_else(overflow)
            } else {
                lhs.checked_powd(rhs).ok_or_else(overflow)
            }
        }
    }
}

/// Rounds a computed value to `decimal_places` using half-up rounding,
/// matching how currency amounts are displayed. The result carries
/// exactly that scale, so stored strings are stable ("25.00", never
/// "25").
pub fn round_result(value: Decimal, decimal_places: u32) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimal_places);
    rounded
}

// ---------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Identifier(s) => f.write_str(s),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                // '**' is accepted as an exponent spelling alongside '^'.
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Caret);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                let mut seen_dot = false;
                while i < chars.len() {
                    match chars[i] {
                        '0'..='9' => i += 1,
                        '.' if !seen_dot => {
                            seen_dot = true;
                            i += 1;
                        }
                        '.' => {
                            return Err(FormulaError::InvalidExpression(format!(
                                "malformed number at position {}",
                                start
                            )))
                        }
                        _ => break,
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let value = Decimal::from_str(&literal).map_err(|e| {
                    FormulaError::InvalidExpression(format!(
                        "invalid numeric literal '{}': {}",
                        literal, e
                    ))
                })?;
                tokens.push(Token::Number(value));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
                {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(Token::Identifier(name));
            }
            other => {
                return Err(FormulaError::InvalidExpression(format!(
                    "unexpected character '{}' at position {}",
                    other, i
                )))
            }
        }
    }

    if tokens.is_empty() {
        return Err(FormulaError::InvalidExpression(
            "expression is empty".to_string(),
        ));
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------
// Recursive-descent parser
// ---------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinaryOp::Add),
            Some(Token::Minus) => Some(BinaryOp::Sub),
            _ => None,
        } {
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinaryOp::Mul),
            Some(Token::Slash) => Some(BinaryOp::Div),
            _ => None,
        } {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                Ok(Expr::Unary {
                    op: UnaryOp::Plus,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Unary {
                    op: UnaryOp::Minus,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.advance();
            // Right-associative; the exponent may carry its own sign.
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Identifier(name)) => Ok(Expr::Identifier(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(FormulaError::InvalidExpression(
                        "expected closing parenthesis".to_string(),
                    )),
                }
            }
            Some(tok) => Err(FormulaError::InvalidExpression(format!(
                "unexpected token '{}'",
                tok
            ))),
            None => Err(FormulaError::InvalidExpression(
                "unexpected end of expression".to_string(),
            )),
        }
    }
}

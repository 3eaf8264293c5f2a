//! Stored recipient-selection predicates ("domains").
//!
//! A domain is stored as text in list form, for example:
//!
//! ```text
//! [["customer", "=", true], "|", ["lang", "=", "ca_ES"], ["lang", "=", "es_ES"]]
//! ```
//!
//! `&` and `|` are binary prefix operators, `!` is unary. Adjacent terms with no
//! operator between them are AND-ed. The text is parsed once into an [`Expr`]
//! tree and evaluated against record field maps; nothing is ever executed.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use mailcamp_core::ValueObject;

static NULL: JsonValue = JsonValue::Null;

/// Deepest operator nesting a stored domain may use.
pub const MAX_DEPTH: usize = 64;

/// Malformed domain expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PredicateError {
    #[error("domain is not valid list syntax: {0}")]
    Syntax(String),

    #[error("domain must be a list of terms, got {0}")]
    NotAList(String),

    #[error("unknown logical operator `{0}`")]
    UnknownOperator(String),

    #[error("unsupported comparison operator `{0}`")]
    UnknownComparison(String),

    #[error("malformed term at position {position}: {reason}")]
    MalformedTerm { position: usize, reason: String },

    #[error("operator `{0}` is missing an operand")]
    MissingOperand(String),

    #[error("domain nests operators deeper than {0} levels")]
    TooDeep(usize),
}

/// Comparison operator of a leaf term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Like,
    ILike,
}

impl CompareOp {
    fn parse(op: &str) -> Result<Self, PredicateError> {
        Ok(match op {
            "=" | "==" => CompareOp::Eq,
            "!=" | "<>" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            "in" => CompareOp::In,
            "not in" => CompareOp::NotIn,
            "like" => CompareOp::Like,
            "ilike" => CompareOp::ILike,
            other => return Err(PredicateError::UnknownComparison(other.to_string())),
        })
    }
}

/// Predicate expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        field: String,
        op: CompareOp,
        value: JsonValue,
    },
}

impl Expr {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: JsonValue) -> Self {
        Expr::Compare {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn matches(&self, fields: &Map<String, JsonValue>) -> bool {
        match self {
            Expr::And(a, b) => a.matches(fields) && b.matches(fields),
            Expr::Or(a, b) => a.matches(fields) || b.matches(fields),
            Expr::Not(inner) => !inner.matches(fields),
            Expr::Compare { field, op, value } => {
                let actual = fields.get(field).unwrap_or(&NULL);
                compare(actual, *op, value)
            }
        }
    }
}

/// A parsed domain. `root == None` is the empty domain, which matches every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    root: Option<Expr>,
}

impl ValueObject for Domain {}

impl Domain {
    /// Domain matching every record.
    pub fn match_all() -> Self {
        Self { root: None }
    }

    pub fn from_expr(expr: Expr) -> Self {
        Self { root: Some(expr) }
    }

    pub fn root(&self) -> Option<&Expr> {
        self.root.as_ref()
    }

    /// Parse stored domain text.
    pub fn parse(text: &str) -> Result<Self, PredicateError> {
        let value: JsonValue =
            serde_json::from_str(text).map_err(|e| PredicateError::Syntax(e.to_string()))?;
        let items = match value {
            JsonValue::Array(items) => items,
            other => return Err(PredicateError::NotAList(other.to_string())),
        };

        let mut parser = Parser {
            items: &items,
            pos: 0,
            depth: 0,
        };
        let mut terms = Vec::new();
        while parser.pos < items.len() {
            terms.push(parser.term()?);
        }

        Ok(Self { root: conjoin(terms) })
    }

    pub fn matches(&self, fields: &Map<String, JsonValue>) -> bool {
        self.root.as_ref().is_none_or(|expr| expr.matches(fields))
    }
}

struct Parser<'a> {
    items: &'a [JsonValue],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn term(&mut self) -> Result<Expr, PredicateError> {
        if self.depth >= MAX_DEPTH {
            return Err(PredicateError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let term = self.node();
        self.depth -= 1;
        term
    }

    fn node(&mut self) -> Result<Expr, PredicateError> {
        let items = self.items;
        let position = self.pos;
        let item = &items[position];
        self.pos += 1;

        match item {
            JsonValue::String(op) => match op.as_str() {
                "&" => {
                    let (a, b) = self.operands(op)?;
                    Ok(Expr::And(Box::new(a), Box::new(b)))
                }
                "|" => {
                    let (a, b) = self.operands(op)?;
                    Ok(Expr::Or(Box::new(a), Box::new(b)))
                }
                "!" => {
                    self.require(op)?;
                    Ok(Expr::Not(Box::new(self.term()?)))
                }
                other => Err(PredicateError::UnknownOperator(other.to_string())),
            },
            JsonValue::Array(parts) => leaf(position, parts),
            other => Err(PredicateError::MalformedTerm {
                position,
                reason: format!("expected operator or [field, op, value], got {other}"),
            }),
        }
    }

    fn operands(&mut self, op: &str) -> Result<(Expr, Expr), PredicateError> {
        self.require(op)?;
        let a = self.term()?;
        self.require(op)?;
        let b = self.term()?;
        Ok((a, b))
    }

    fn require(&self, op: &str) -> Result<(), PredicateError> {
        if self.pos >= self.items.len() {
            return Err(PredicateError::MissingOperand(op.to_string()));
        }
        Ok(())
    }
}

// Implicit AND of top-level terms, paired up level by level so a long flat
// domain stays shallow.
fn conjoin(mut terms: Vec<Expr>) -> Option<Expr> {
    while terms.len() > 1 {
        let mut paired = Vec::with_capacity(terms.len().div_ceil(2));
        let mut rest = terms.into_iter();
        while let Some(a) = rest.next() {
            paired.push(match rest.next() {
                Some(b) => Expr::And(Box::new(a), Box::new(b)),
                None => a,
            });
        }
        terms = paired;
    }
    terms.pop()
}

fn leaf(position: usize, parts: &[JsonValue]) -> Result<Expr, PredicateError> {
    let malformed = |reason: &str| PredicateError::MalformedTerm {
        position,
        reason: reason.to_string(),
    };

    let [field, op, value] = parts else {
        return Err(malformed("term must have exactly three elements"));
    };
    let field = field
        .as_str()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| malformed("field name must be a non-empty string"))?;
    let op = CompareOp::parse(op.as_str().ok_or_else(|| malformed("operator must be a string"))?)?;

    if matches!(op, CompareOp::In | CompareOp::NotIn) && !value.is_array() {
        return Err(malformed("`in`/`not in` expect a list value"));
    }
    if matches!(op, CompareOp::Like | CompareOp::ILike) && !value.is_string() {
        return Err(malformed("`like`/`ilike` expect a string value"));
    }

    Ok(Expr::compare(field, op, value.clone()))
}

fn compare(actual: &JsonValue, op: CompareOp, expected: &JsonValue) -> bool {
    match op {
        CompareOp::Eq => loose_eq(actual, expected),
        CompareOp::Ne => !loose_eq(actual, expected),
        CompareOp::Lt => order(actual, expected) == Some(Ordering::Less),
        CompareOp::Le => matches!(order(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => order(actual, expected) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::In => list_contains(expected, actual),
        CompareOp::NotIn => !list_contains(expected, actual),
        CompareOp::Like => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(e)) => a.contains(e),
            _ => false,
        },
        CompareOp::ILike => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(e)) => a.to_lowercase().contains(&e.to_lowercase()),
            _ => false,
        },
    }
}

// `false` also matches an unset field.
fn loose_eq(actual: &JsonValue, expected: &JsonValue) -> bool {
    match (actual, expected) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
        (JsonValue::Null, JsonValue::Bool(false)) => true,
        _ => actual == expected,
    }
}

fn order(actual: &JsonValue, expected: &JsonValue) -> Option<Ordering> {
    match (actual, expected) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn list_contains(list: &JsonValue, actual: &JsonValue) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|item| loose_eq(actual, item)))
}

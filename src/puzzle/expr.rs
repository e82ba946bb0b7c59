//! Solution checks: AND/OR trees over natural-language assertions
//!
//! A puzzle's `checks` arrive as JSON where a node is either a string
//! (an assertion the guess must entail) or an object with exactly one key,
//! `AND` or `OR`, holding an array of child nodes. The JSON is parsed into
//! [`Expr`] at the storage boundary, so a malformed tree is rejected before
//! any guess is ever checked against it.

use crate::classifier::{Classifier, ClassifierError};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// The checks tree of a puzzle could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("Malformed expression: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Combine already-computed child results. Empty input yields the
    /// operator's identity.
    pub fn combine(self, results: &[bool]) -> bool {
        match self {
            Self::And => results.iter().all(|r| *r),
            Self::Or => results.iter().any(|r| *r),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Expr {
    Leaf(String),
    Node { op: Operator, children: Vec<Expr> },
}

impl Expr {
    pub fn leaf(text: impl Into<String>) -> Self {
        Expr::Leaf(text.into())
    }

    pub fn and(children: Vec<Expr>) -> Self {
        Expr::Node {
            op: Operator::And,
            children,
        }
    }

    pub fn or(children: Vec<Expr>) -> Self {
        Expr::Node {
            op: Operator::Or,
            children,
        }
    }

    /// Number of leaf assertions, i.e. classifier calls per evaluation
    pub fn leaf_count(&self) -> usize {
        match self {
            Expr::Leaf(_) => 1,
            Expr::Node { children, .. } => children.iter().map(Expr::leaf_count).sum(),
        }
    }
}

impl TryFrom<Value> for Expr {
    type Error = ExprError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Expr::Leaf(text)),
            Value::Object(map) => node_from_map(map),
            other => Err(ExprError::Malformed(format!(
                "unsupported node type: {}",
                json_type_name(&other)
            ))),
        }
    }
}

fn node_from_map(map: Map<String, Value>) -> Result<Expr, ExprError> {
    if map.len() != 1 {
        return Err(ExprError::Malformed(format!(
            "expected exactly one of AND/OR, found {} keys",
            map.len()
        )));
    }
    let Some((key, children)) = map.into_iter().next() else {
        return Err(ExprError::Malformed("empty node".to_string()));
    };
    let op = Operator::from_key(&key)
        .ok_or_else(|| ExprError::Malformed(format!("unknown operator {key:?}")))?;
    let Value::Array(children) = children else {
        return Err(ExprError::Malformed(format!(
            "{op} must map to an array, found {}",
            json_type_name(&children)
        )));
    };
    let children = children
        .into_iter()
        .map(Expr::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expr::Node { op, children })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<Expr> for Value {
    fn from(expr: Expr) -> Self {
        match expr {
            Expr::Leaf(text) => Value::String(text),
            Expr::Node { op, children } => {
                let children = children.into_iter().map(Value::from).collect();
                let mut map = Map::new();
                map.insert(op.key().to_string(), Value::Array(children));
                Value::Object(map)
            }
        }
    }
}

/// Prompt used to check one assertion against a guess.
pub fn leaf_prompt(guess: &str, assertion: &str) -> String {
    format!("{guess} mnli {assertion}")
}

/// Evaluate `expr` against `guess`.
///
/// Children of a node are evaluated concurrently and every child is always
/// awaited; results are combined only once all of them are in. A classifier
/// failure anywhere fails the whole evaluation.
pub fn evaluate<'a, C>(
    expr: &'a Expr,
    guess: &'a str,
    classifier: &'a C,
) -> BoxFuture<'a, Result<bool, ClassifierError>>
where
    C: Classifier + ?Sized,
{
    async move {
        match expr {
            Expr::Leaf(assertion) => {
                let label = classifier.classify_raw(&leaf_prompt(guess, assertion)).await?;
                Ok(label.is_entailment())
            }
            Expr::Node { op, children } => {
                let results = join_all(
                    children
                        .iter()
                        .map(|child| evaluate(child, guess, classifier)),
                )
                .await
                .into_iter()
                .collect::<Result<Vec<bool>, _>>()?;
                tracing::debug!(op = %op, results = ?results, "Combined check results");
                Ok(op.combine(&results))
            }
        }
    }
    .boxed()
}

//! Result document query port.
//!
//! The pipeline never walks result documents itself; it asks this
//! collaborator to resolve path expressions against a parsed document.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::RunResult;

/// Value produced by evaluating a path expression.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Several matching nodes, each reduced to its text value.
    Nodes(Vec<String>),
}

impl QueryValue {
    /// Text value, XPath-style: a node set reduces to its first node.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Nodes(nodes) => nodes.first().cloned().unwrap_or_default(),
        }
    }

    /// Numeric value, if the match coerces to one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
            Self::Nodes(nodes) => nodes.first().and_then(|n| n.trim().parse().ok()),
        }
    }

    /// All matched text values.
    pub fn into_texts(self) -> Vec<String> {
        match self {
            Self::Nodes(nodes) => nodes,
            other => vec![other.as_text()],
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Parses result documents and evaluates path expressions against them.
#[async_trait]
pub trait DocumentQuery: Send + Sync {
    /// Parse the document at `path`. A missing or unreadable document is
    /// `None`, never an error: absence is outcome data, not a failure.
    async fn parse(&self, path: &Path) -> RunResult<Option<Value>>;

    /// Evaluate `expr` against a parsed document. `None` means no match —
    /// a missing node and a false trailing predicate are indistinguishable
    /// here by design.
    fn evaluate(&self, doc: &Value, expr: &str) -> Option<QueryValue>;
}

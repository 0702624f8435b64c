//! JSON-backed adapter for the `DocumentQuery` port.
//!
//! Result documents are JSON. Path expressions are slash-separated field
//! paths with optional bracket predicates, e.g. `/loadreport/errors[.<10]`
//! or `/requests/entry[name='login']/p95`. Arrays flatten into node sets
//! as the path descends.

use std::cmp::Ordering;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::domain::errors::{RunError, RunResult};
use crate::domain::ports::{DocumentQuery, QueryValue};

#[derive(Debug, Default)]
pub struct JsonDocumentQuery;

impl JsonDocumentQuery {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentQuery for JsonDocumentQuery {
    async fn parse(&self, path: &Path) -> RunResult<Option<Value>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(doc) => Ok(Some(doc)),
                Err(e) => {
                    // an unreadable document means "no result data", it is
                    // never an error value
                    warn!(path = %path.display(), error = %e, "result document is not valid JSON");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RunError::Storage(format!(
                "reading '{}' failed: {e}",
                path.display()
            ))),
        }
    }

    fn evaluate(&self, doc: &Value, expr: &str) -> Option<QueryValue> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }
        let segments: Vec<Segment<'_>> = split_segments(expr)
            .into_iter()
            .map(parse_segment)
            .collect::<Option<_>>()?;
        if segments.is_empty() {
            return None;
        }

        let mut nodes: Vec<&Value> = vec![doc];
        for segment in &segments {
            let mut next: Vec<&Value> = Vec::new();
            for node in &nodes {
                collect_children(node, segment.name, &mut next);
            }
            for predicate in &segment.predicates {
                next.retain(|n| predicate.holds(n));
            }
            if next.is_empty() {
                return None;
            }
            nodes = next;
        }
        Some(to_query_value(&nodes))
    }
}

struct Segment<'a> {
    name: &'a str,
    predicates: Vec<Predicate<'a>>,
}

#[derive(Debug, Clone, Copy)]
enum Operand<'a> {
    /// `.` — the matched node itself.
    SelfValue,
    /// A child field of the matched node.
    Field(&'a str),
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

struct Predicate<'a> {
    lhs: Operand<'a>,
    op: Op,
    rhs: &'a str,
}

impl Predicate<'_> {
    fn holds(&self, node: &Value) -> bool {
        let target = match self.lhs {
            Operand::SelfValue => Some(node),
            Operand::Field(name) => node.get(name),
        };
        let Some(target) = target else { return false };
        compare_value(target, self.op, self.rhs)
    }
}

/// Split on `/` outside brackets, dropping empty segments.
fn split_segments(expr: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in expr.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                segments.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&expr[start..]);
    segments.into_iter().filter(|s| !s.is_empty()).collect()
}

fn parse_segment(segment: &str) -> Option<Segment<'_>> {
    let (name, mut rest) = match segment.find('[') {
        Some(i) => (&segment[..i], &segment[i..]),
        None => (segment, ""),
    };
    if name.is_empty() {
        return None;
    }

    let mut predicates = Vec::new();
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return None;
        }
        let end = rest.find(']')?;
        predicates.push(parse_predicate(&rest[1..end])?);
        rest = &rest[end + 1..];
    }
    Some(Segment { name, predicates })
}

fn parse_predicate(text: &str) -> Option<Predicate<'_>> {
    let text = text.trim();
    let idx = text.find(['<', '>', '=', '!'])?;
    let tail = &text[idx..];
    let (op, op_len) = if tail.starts_with("<=") {
        (Op::Le, 2)
    } else if tail.starts_with(">=") {
        (Op::Ge, 2)
    } else if tail.starts_with("!=") {
        (Op::Ne, 2)
    } else if tail.starts_with('<') {
        (Op::Lt, 1)
    } else if tail.starts_with('>') {
        (Op::Gt, 1)
    } else if tail.starts_with('=') {
        (Op::Eq, 1)
    } else {
        return None;
    };

    let lhs = match text[..idx].trim() {
        "." => Operand::SelfValue,
        "" => return None,
        field => Operand::Field(field),
    };
    let rhs = strip_quotes(text[idx + op_len..].trim());
    Some(Predicate { lhs, op, rhs })
}

fn strip_quotes(text: &str) -> &str {
    let quoted = (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
        || (text.starts_with('"') && text.ends_with('"') && text.len() >= 2);
    if quoted {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

fn collect_children<'a>(node: &'a Value, name: &str, out: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            if let Some(value) = map.get(name) {
                push_flat(value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Value::Object(map) = item {
                    if let Some(value) = map.get(name) {
                        push_flat(value, out);
                    }
                }
            }
        }
        _ => {}
    }
}

fn push_flat<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    if let Value::Array(items) = value {
        out.extend(items.iter());
    } else {
        out.push(value);
    }
}

fn compare_value(value: &Value, op: Op, literal: &str) -> bool {
    if let (Some(lhs), Ok(rhs)) = (coerce_number(value), literal.parse::<f64>()) {
        let Some(ord) = lhs.partial_cmp(&rhs) else { return false };
        return match op {
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
        };
    }
    let text = text_value(value);
    match op {
        Op::Eq => text == literal,
        Op::Ne => text != literal,
        _ => false,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn to_query_value(nodes: &[&Value]) -> QueryValue {
    if let [node] = nodes {
        match node {
            Value::String(s) => QueryValue::Text(s.clone()),
            Value::Number(n) => QueryValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::Bool(b) => QueryValue::Bool(*b),
            other => QueryValue::Nodes(vec![text_value(other)]),
        }
    } else {
        QueryValue::Nodes(nodes.iter().map(|n| text_value(n)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "loadreport": {
                "errors": 15,
                "label": "  smoke  ",
                "requests": [
                    {"name": "login", "p95": 120.5, "failed": false},
                    {"name": "browse", "p95": 80.0, "failed": true}
                ],
                "testFailures": ["TAuthor timed out", "TVisitor crashed"]
            }
        })
    }

    #[test]
    fn plain_path_resolves_scalars() {
        let query = JsonDocumentQuery::new();
        let value = query.evaluate(&doc(), "/loadreport/errors").unwrap();
        assert_eq!(value.as_number(), Some(15.0));
        assert_eq!(value.as_text(), "15");
    }

    #[test]
    fn unmatched_path_is_none() {
        let query = JsonDocumentQuery::new();
        assert!(query.evaluate(&doc(), "/loadreport/missing").is_none());
        assert!(query.evaluate(&doc(), "").is_none());
        assert!(query.evaluate(&doc(), "/").is_none());
    }

    #[test]
    fn trailing_predicate_gates_the_match() {
        let query = JsonDocumentQuery::new();
        // same expression shape as a path plus appended condition
        assert!(query.evaluate(&doc(), "/loadreport/errors[.<10]").is_none());
        assert!(query.evaluate(&doc(), "/loadreport/errors[.<20]").is_some());
        assert!(query.evaluate(&doc(), "/loadreport/errors[.>=15]").is_some());
        assert!(query.evaluate(&doc(), "/loadreport/errors[.!=15]").is_none());
    }

    #[test]
    fn field_predicate_selects_array_entries() {
        let query = JsonDocumentQuery::new();
        let value = query
            .evaluate(&doc(), "/loadreport/requests[name='login']/p95")
            .unwrap();
        assert_eq!(value.as_number(), Some(120.5));
    }

    #[test]
    fn string_comparison_falls_back_to_text_equality() {
        let query = JsonDocumentQuery::new();
        assert!(query
            .evaluate(&doc(), "/loadreport/requests[name=\"browse\"]")
            .is_some());
        // ordering operators have no meaning for non-numeric text
        assert!(query.evaluate(&doc(), "/loadreport/requests[name<'z']").is_none());
    }

    #[test]
    fn arrays_flatten_into_node_sets() {
        let query = JsonDocumentQuery::new();
        let value = query.evaluate(&doc(), "/loadreport/testFailures").unwrap();
        assert_eq!(
            value.into_texts(),
            vec!["TAuthor timed out", "TVisitor crashed"]
        );
    }

    #[test]
    fn node_set_text_is_the_first_node() {
        let query = JsonDocumentQuery::new();
        let value = query.evaluate(&doc(), "/loadreport/requests/p95").unwrap();
        assert_eq!(value.as_text(), "120.5");
        assert_eq!(value.as_number(), Some(120.5));
    }

    #[test]
    fn text_values_keep_their_whitespace() {
        // trimming is the criteria engine's business
        let query = JsonDocumentQuery::new();
        let value = query.evaluate(&doc(), "/loadreport/label").unwrap();
        assert_eq!(value.as_text(), "  smoke  ");
    }

    #[tokio::test]
    async fn missing_and_malformed_documents_parse_to_none() {
        let query = JsonDocumentQuery::new();
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("absent.json");
        assert!(query.parse(&missing).await.unwrap().is_none());

        let malformed = dir.path().join("broken.json");
        std::fs::write(&malformed, "{not json").unwrap();
        assert!(query.parse(&malformed).await.unwrap().is_none());

        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"r": {"x": 1}}"#).unwrap();
        assert!(query.parse(&good).await.unwrap().is_some());
    }
}

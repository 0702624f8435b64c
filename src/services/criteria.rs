//! Success criteria evaluation.
//!
//! Turns the result document and the configured metric conditions into an
//! ordered verdict list. A satisfied condition emits nothing; verdict
//! order follows configuration order, not severity.

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::models::{ConditionVerdict, MetricsConfig};
use crate::domain::ports::DocumentQuery;

pub struct CriteriaEngine<'a> {
    query: &'a dyn DocumentQuery,
}

impl<'a> CriteriaEngine<'a> {
    pub fn new(query: &'a dyn DocumentQuery) -> Self {
        Self { query }
    }

    /// Evaluate every conditioned metric against the result document.
    ///
    /// With no document at all, the single possible answer is one Error
    /// verdict. Metrics with a blank condition are chart-only and never
    /// produce a verdict.
    pub fn evaluate(&self, doc: Option<&Value>, config: &MetricsConfig) -> Vec<ConditionVerdict> {
        let Some(doc) = doc else {
            return vec![ConditionVerdict::error(
                "No result data available for criteria evaluation",
            )];
        };

        let mut verdicts = Vec::new();
        for metric in &config.values {
            if metric.is_informational() {
                continue;
            }

            if metric.path.trim().is_empty() {
                verdicts.push(
                    ConditionVerdict::error(format!(
                        "Metric '{}' has a condition but no path expression",
                        metric.id
                    ))
                    .with_metric(&metric.id),
                );
                continue;
            }

            let Some(matched) = self.query.evaluate(doc, &metric.path) else {
                verdicts.push(
                    ConditionVerdict::error(format!(
                        "No result for path '{}' of metric '{}'",
                        metric.path, metric.id
                    ))
                    .with_metric(&metric.id)
                    .with_path(&metric.path),
                );
                continue;
            };

            // A missing node and a false condition are indistinguishable
            // here: both come back as no match.
            let conditioned = format!("{}{}", metric.path, metric.condition);
            if self.query.evaluate(doc, &conditioned).is_none() {
                let value = matched.as_text().trim().to_string();
                verdicts.push(
                    ConditionVerdict::failed(format!(
                        "Condition '{}' not met for metric '{}' (value: {})",
                        metric.condition, metric.id, value
                    ))
                    .with_metric(&metric.id)
                    .with_path(&metric.path)
                    .with_value(value)
                    .with_condition(&metric.condition),
                );
            } else {
                debug!(metric = %metric.id, "condition satisfied");
            }
        }
        verdicts
    }

    /// Parse verdicts from an external tool's machine-readable output (a
    /// JSON array of verdict objects). These are appended to the run's own
    /// verdicts without de-duplication. Unreadable output contributes
    /// nothing.
    pub fn parse_external(raw: &str) -> Vec<ConditionVerdict> {
        match serde_json::from_str::<Vec<ConditionVerdict>>(raw) {
            Ok(verdicts) => verdicts,
            Err(e) => {
                warn!(error = %e, "external verdict output is not parseable, ignoring");
                Vec::new()
            }
        }
    }
}

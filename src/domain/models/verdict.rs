//! Verdicts and the aggregated run outcome.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::chart::ChartData;

/// Severity of an evaluated criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSeverity {
    /// The condition was evaluated and not met.
    Failed,
    /// The condition could not be evaluated.
    Error,
}

impl VerdictSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

/// One evaluated pass/fail/error result for a configured criterion.
///
/// A satisfied condition produces no verdict at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionVerdict {
    pub severity: VerdictSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Trimmed text value the plain path matched, for failed conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Underlying cause when evaluation itself blew up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ConditionVerdict {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(VerdictSeverity::Failed, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(VerdictSeverity::Error, message)
    }

    fn new(severity: VerdictSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            metric_id: None,
            path: None,
            value: None,
            condition: None,
            cause: None,
        }
    }

    pub fn with_metric(mut self, metric_id: impl Into<String>) -> Self {
        self.metric_id = Some(metric_id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

/// Overall status of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Criteria produced at least one failed verdict.
    Unstable,
    /// A phase failed.
    Failure,
    /// The run was cancelled from outside.
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unstable => "unstable",
            Self::Failure => "failure",
            Self::Aborted => "aborted",
        }
    }
}

/// Aggregated result of one pipeline invocation, built once and published
/// immutably.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub ran_failed: bool,
    pub condition_failed: bool,
    pub condition_error: bool,
    pub condition_critical: bool,
    /// Concatenated messages of all failed and error verdicts.
    pub message: String,
    pub report_url: Option<String>,
    pub diff_report_url: Option<String>,
    pub verdicts: Vec<ConditionVerdict>,
    pub test_failures: Vec<String>,
    pub slow_requests: Vec<String>,
    /// Chart data, present only when report artifacts were persisted.
    pub charts: Vec<ChartData>,
}

impl RunOutcome {
    /// The string-keyed parameter map handed to the host. Every key is
    /// always present, with defaults when nothing was produced.
    pub fn publish_parameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("run-failed".into(), self.ran_failed.to_string());
        params.insert("condition-failed".into(), self.condition_failed.to_string());
        params.insert("condition-error".into(), self.condition_error.to_string());
        params.insert(
            "condition-critical".into(),
            self.condition_critical.to_string(),
        );
        params.insert("condition-message".into(), self.message.clone());
        params.insert(
            "report-url".into(),
            self.report_url.clone().unwrap_or_default(),
        );
        params.insert(
            "diff-report-url".into(),
            self.diff_report_url.clone().unwrap_or_default(),
        );
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_always_present_with_defaults() {
        let outcome = RunOutcome {
            status: RunStatus::Success,
            ran_failed: false,
            condition_failed: false,
            condition_error: false,
            condition_critical: false,
            message: String::new(),
            report_url: None,
            diff_report_url: None,
            verdicts: vec![],
            test_failures: vec![],
            slow_requests: vec![],
            charts: vec![],
        };

        let params = outcome.publish_parameters();
        for key in [
            "run-failed",
            "condition-failed",
            "condition-error",
            "condition-critical",
            "condition-message",
            "report-url",
            "diff-report-url",
        ] {
            assert!(params.contains_key(key), "missing key {key}");
        }
        assert_eq!(params["run-failed"], "false");
        assert_eq!(params["report-url"], "");
    }

    #[test]
    fn status_ordering_tracks_severity() {
        assert!(RunStatus::Success < RunStatus::Unstable);
        assert!(RunStatus::Unstable < RunStatus::Failure);
        assert!(RunStatus::Failure < RunStatus::Aborted);
    }

    #[test]
    fn verdict_builder_carries_criteria_details() {
        let v = ConditionVerdict::failed("value out of range")
            .with_metric("v1")
            .with_path("/r/x")
            .with_value("15")
            .with_condition("[.<10]");
        assert_eq!(v.severity, VerdictSeverity::Failed);
        assert_eq!(v.metric_id.as_deref(), Some("v1"));
        assert_eq!(v.value.as_deref(), Some("15"));
    }
}

//! Metrics configuration wire format.
//!
//! The metrics configuration is a user-authored JSON document with two
//! arrays: `values` (one entry per extracted metric) and `plots` (one entry
//! per chart). Records missing a required field are dropped without
//! failing the run; only a structurally malformed document is an error.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{RunError, RunResult};

/// One metric extracted from the result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub id: String,
    /// Display name; falls back to the id when absent in the wire format.
    pub name: String,
    /// Path expression evaluated against the result document.
    pub path: String,
    /// Optional condition appended to the path for criteria evaluation.
    /// Blank means the metric is chart-only.
    pub condition: String,
    /// Chart this metric plots into.
    pub plot_id: String,
}

impl MetricDefinition {
    /// Chart-only metrics carry no condition and are skipped by the
    /// criteria engine.
    pub fn is_informational(&self) -> bool {
        self.condition.trim().is_empty()
    }
}

/// One chart definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotDefinition {
    pub id: String,
    pub title: String,
    pub enabled: bool,
    /// Insert a 0.0 point when a metric yields no value for a build.
    pub show_no_values: bool,
    /// Requested history depth; may be non-positive in the wire format.
    pub build_count: i64,
}

impl PlotDefinition {
    /// Effective per-line history depth. Non-positive or unspecified
    /// counts clamp to 1, never error.
    pub fn history_depth(&self) -> usize {
        usize::try_from(self.build_count.max(1)).unwrap_or(1)
    }
}

/// Parsed metrics configuration: the accepted values and plots, in
/// configuration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub values: Vec<MetricDefinition>,
    pub plots: Vec<PlotDefinition>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetricsConfig {
    #[serde(default)]
    values: Vec<RawValue>,
    #[serde(default)]
    plots: Vec<RawPlot>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "xPath")]
    path: Option<String>,
    condition: Option<String>,
    #[serde(rename = "plotID")]
    plot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlot {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "buildCount")]
    build_count: Option<String>,
    enabled: Option<String>,
    #[serde(rename = "showNoValues")]
    show_no_values: Option<String>,
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn yes(field: &Option<String>) -> bool {
    matches!(non_blank(field), Some("yes"))
}

impl MetricsConfig {
    /// Parse the metrics configuration document.
    ///
    /// A record is accepted only if all its required fields are present and
    /// non-blank ({id, enabled, showNoValues} for plots; {id, xPath, plotID}
    /// for values); otherwise it is silently dropped. A malformed document
    /// fails with a configuration error.
    pub fn parse(json: &str) -> RunResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: RawMetricsConfig = serde_json::from_str(json)
            .map_err(|e| RunError::Configuration(format!("malformed metrics configuration: {e}")))?;

        let plots = raw
            .plots
            .iter()
            .filter_map(|p| {
                let id = non_blank(&p.id)?;
                non_blank(&p.enabled)?;
                non_blank(&p.show_no_values)?;
                Some(PlotDefinition {
                    id: id.to_string(),
                    title: non_blank(&p.title).unwrap_or(id).to_string(),
                    enabled: yes(&p.enabled),
                    show_no_values: yes(&p.show_no_values),
                    build_count: non_blank(&p.build_count)
                        .and_then(|c| c.parse().ok())
                        .unwrap_or(0),
                })
            })
            .collect();

        let values = raw
            .values
            .iter()
            .filter_map(|v| {
                let id = non_blank(&v.id)?;
                let path = non_blank(&v.path)?;
                let plot_id = non_blank(&v.plot_id)?;
                Some(MetricDefinition {
                    id: id.to_string(),
                    name: non_blank(&v.name).unwrap_or(id).to_string(),
                    path: path.to_string(),
                    condition: non_blank(&v.condition).unwrap_or("").to_string(),
                    plot_id: plot_id.to_string(),
                })
            })
            .collect();

        Ok(Self { values, plots })
    }

    /// Metrics plotting into the given chart, in configuration order.
    pub fn metrics_for_plot<'a>(
        &'a self,
        plot_id: &'a str,
    ) -> impl Iterator<Item = &'a MetricDefinition> {
        self.values.iter().filter(move |m| m.plot_id == plot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "values": [
            {"id": "v1", "name": "Errors", "xPath": "/r/errors", "condition": "[.<10]", "plotID": "p1"},
            {"id": "v2", "xPath": "/r/runtime", "plotID": "p1"},
            {"id": "", "xPath": "/r/x", "plotID": "p1"},
            {"id": "v3", "xPath": "  ", "plotID": "p1"},
            {"id": "v4", "xPath": "/r/y", "plotID": ""}
        ],
        "plots": [
            {"id": "p1", "title": "Errors", "buildCount": "25", "enabled": "yes", "showNoValues": "no"},
            {"id": "p2", "title": "Disabled", "buildCount": "5", "enabled": "no", "showNoValues": "yes"},
            {"id": "", "title": "Dropped", "buildCount": "5", "enabled": "yes", "showNoValues": "no"},
            {"id": "p3", "title": "NoFlags", "buildCount": "5", "enabled": "yes"}
        ]
    }"#;

    #[test]
    fn accepts_complete_records_and_drops_partial_ones() {
        let config = MetricsConfig::parse(SAMPLE).unwrap();

        let ids: Vec<&str> = config.values.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);

        let plot_ids: Vec<&str> = config.plots.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(plot_ids, vec!["p1", "p2"]);
    }

    #[test]
    fn name_falls_back_to_id() {
        let config = MetricsConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.values[0].name, "Errors");
        assert_eq!(config.values[1].name, "v2");
    }

    #[test]
    fn blank_condition_marks_informational() {
        let config = MetricsConfig::parse(SAMPLE).unwrap();
        assert!(!config.values[0].is_informational());
        assert!(config.values[1].is_informational());
    }

    #[test]
    fn yes_no_flags_parse() {
        let config = MetricsConfig::parse(SAMPLE).unwrap();
        assert!(config.plots[0].enabled);
        assert!(!config.plots[0].show_no_values);
        assert!(!config.plots[1].enabled);
        assert!(config.plots[1].show_no_values);
    }

    #[test]
    fn build_count_clamps_to_one() {
        let json = r#"{"plots": [
            {"id": "a", "buildCount": "0", "enabled": "yes", "showNoValues": "no"},
            {"id": "b", "buildCount": "-3", "enabled": "yes", "showNoValues": "no"},
            {"id": "c", "buildCount": "oops", "enabled": "yes", "showNoValues": "no"},
            {"id": "d", "enabled": "yes", "showNoValues": "no"}
        ]}"#;
        let config = MetricsConfig::parse(json).unwrap();
        assert!(config.plots.iter().all(|p| p.history_depth() == 1));
    }

    #[test]
    fn malformed_document_is_a_configuration_error() {
        let err = MetricsConfig::parse("{not json").unwrap_err();
        assert!(matches!(err, RunError::Configuration(_)));
    }

    #[test]
    fn empty_document_yields_empty_config() {
        let config = MetricsConfig::parse("   ").unwrap();
        assert!(config.values.is_empty());
        assert!(config.plots.is_empty());
    }
}

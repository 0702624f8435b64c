//! Bounded time-series aggregation over build results.
//!
//! A `TimeSeriesStore` is rebuilt per pipeline invocation: one chart per
//! enabled plot, one line per metric plotting into it. Folding a build
//! evaluates every metric's plain path against that build's result
//! document and appends points under a fixed per-line history depth.

use serde_json::Value;
use tracing::debug;

use crate::domain::models::{Chart, ChartData, Line, MetricDefinition, MetricsConfig, Point};
use crate::domain::ports::DocumentQuery;

/// Caller-supplied annotations for one folded build. The store never
/// computes timestamps or labels itself.
#[derive(Debug, Clone)]
pub struct BuildStamp {
    pub build_number: u32,
    pub label: String,
    pub timestamp: String,
}

struct ChartBinding {
    chart: Chart,
    /// `metrics[i]` drives `chart.lines()[i]`.
    metrics: Vec<MetricDefinition>,
}

/// Fixed-memory sliding-window aggregator serving cross-build trend views.
pub struct TimeSeriesStore {
    bindings: Vec<ChartBinding>,
}

impl TimeSeriesStore {
    /// Build the chart set from the metrics configuration.
    ///
    /// Disabled plots are omitted entirely; a metric referencing no plot is
    /// ignored. History depth clamps to at least 1.
    pub fn from_config(config: &MetricsConfig) -> Self {
        let bindings = config
            .plots
            .iter()
            .filter(|plot| plot.enabled)
            .map(|plot| {
                let metrics: Vec<MetricDefinition> =
                    config.metrics_for_plot(&plot.id).cloned().collect();
                let lines = metrics
                    .iter()
                    .map(|m| Line::new(&m.id, &m.name, plot.show_no_values, plot.history_depth()))
                    .collect();
                ChartBinding {
                    chart: Chart::new(&plot.id, &plot.title, lines),
                    metrics,
                }
            })
            .collect();
        Self { bindings }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Largest line capacity across all charts; 1 for an empty store.
    pub fn max_history(&self) -> usize {
        self.bindings
            .iter()
            .flat_map(|b| b.chart.lines().iter().map(Line::capacity))
            .max()
            .unwrap_or(1)
    }

    /// Fold one build's result document into every chart.
    ///
    /// A metric that yields no finite number inserts a 0.0 point only when
    /// its line shows empty values, otherwise it is skipped for this build.
    /// A chart's x-index advances once, after all of its metrics were
    /// processed, and only if at least one of them produced a point.
    pub fn fold_build(&mut self, query: &dyn DocumentQuery, doc: &Value, stamp: &BuildStamp) {
        for binding in &mut self.bindings {
            let x = binding.chart.x_index();
            let mut contributed = false;

            for (i, metric) in binding.metrics.iter().enumerate() {
                let value = query
                    .evaluate(doc, &metric.path)
                    .and_then(|v| v.as_number())
                    .filter(|y| y.is_finite());
                let line = &mut binding.chart.lines_mut()[i];

                let y = match value {
                    Some(y) => y,
                    None if line.show_no_values => 0.0,
                    None => {
                        debug!(
                            metric = %metric.id,
                            build = stamp.build_number,
                            "no value for metric, skipping point"
                        );
                        continue;
                    }
                };
                line.push(Point {
                    x,
                    y,
                    label: stamp.label.clone(),
                    build_number: stamp.build_number,
                    timestamp: stamp.timestamp.clone(),
                });
                contributed = true;
            }

            if contributed {
                binding.chart.advance();
            }
        }
    }

    pub fn charts(&self) -> impl Iterator<Item = &Chart> {
        self.bindings.iter().map(|b| &b.chart)
    }

    /// Serialize every chart into its renderer-agnostic form.
    pub fn to_chart_data(&self) -> Vec<ChartData> {
        self.bindings.iter().map(|b| b.chart.to_data()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::document::JsonDocumentQuery;
    use serde_json::json;

    fn config(build_count: &str, show_no_values: &str) -> MetricsConfig {
        MetricsConfig::parse(&format!(
            r#"{{
                "values": [
                    {{"id": "v1", "name": "Errors", "xPath": "/r/x", "plotID": "p1"}},
                    {{"id": "v2", "name": "Runtime", "xPath": "/r/y", "plotID": "p1"}}
                ],
                "plots": [
                    {{"id": "p1", "title": "T", "buildCount": "{build_count}",
                      "enabled": "yes", "showNoValues": "{show_no_values}"}}
                ]
            }}"#
        ))
        .unwrap()
    }

    fn stamp(build: u32) -> BuildStamp {
        BuildStamp {
            build_number: build,
            label: format!("#{build}"),
            timestamp: "2026-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn disabled_plots_and_unmatched_metrics_are_ignored() {
        let config = MetricsConfig::parse(
            r#"{
                "values": [
                    {"id": "v1", "xPath": "/r/x", "plotID": "p1"},
                    {"id": "orphan", "xPath": "/r/x", "plotID": "nope"}
                ],
                "plots": [
                    {"id": "p1", "title": "On", "buildCount": "2", "enabled": "yes", "showNoValues": "no"},
                    {"id": "p2", "title": "Off", "buildCount": "2", "enabled": "no", "showNoValues": "no"}
                ]
            }"#,
        )
        .unwrap();

        let store = TimeSeriesStore::from_config(&config);
        let charts: Vec<&Chart> = store.charts().collect();
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].id, "p1");
        assert_eq!(charts[0].lines().len(), 1);
    }

    #[test]
    fn history_depth_honors_build_count_cap() {
        let query = JsonDocumentQuery::new();
        let mut store = TimeSeriesStore::from_config(&config("2", "no"));

        for (build, value) in [(1, 15.0), (2, 5.0), (3, 7.0)] {
            let doc = json!({"r": {"x": value, "y": 1.0}});
            store.fold_build(&query, &doc, &stamp(build));
        }

        let chart = store.charts().next().unwrap();
        let ys: Vec<f64> = chart.lines()[0].points().map(|p| p.y).collect();
        assert_eq!(ys, vec![5.0, 7.0]);
    }

    #[test]
    fn non_positive_build_count_behaves_as_one() {
        let query = JsonDocumentQuery::new();
        let mut store = TimeSeriesStore::from_config(&config("-4", "no"));

        for build in 1..=3 {
            let doc = json!({"r": {"x": build, "y": 1.0}});
            store.fold_build(&query, &doc, &stamp(build));
        }

        let chart = store.charts().next().unwrap();
        assert_eq!(chart.lines()[0].len(), 1);
        assert_eq!(chart.lines()[0].points().next().unwrap().y, 3.0);
    }

    #[test]
    fn x_index_advances_only_for_contributing_builds() {
        let query = JsonDocumentQuery::new();
        let mut store = TimeSeriesStore::from_config(&config("10", "no"));

        store.fold_build(&query, &json!({"r": {"x": 1.0}}), &stamp(1));
        // nothing matches, no points, no advance
        store.fold_build(&query, &json!({"other": 1}), &stamp(2));
        store.fold_build(&query, &json!({"r": {"x": 3.0}}), &stamp(3));

        let chart = store.charts().next().unwrap();
        assert_eq!(chart.x_index(), 2);
        let xs: Vec<u64> = chart.lines()[0].points().map(|p| p.x).collect();
        assert_eq!(xs, vec![0, 1]);
    }

    #[test]
    fn missing_value_inserts_zero_only_when_showing_empty() {
        let query = JsonDocumentQuery::new();
        let doc = json!({"r": {"y": 2.5}});

        let mut hidden = TimeSeriesStore::from_config(&config("5", "no"));
        hidden.fold_build(&query, &doc, &stamp(1));
        let chart = hidden.charts().next().unwrap();
        assert!(chart.lines()[0].is_empty());
        assert_eq!(chart.lines()[1].len(), 1);

        let mut shown = TimeSeriesStore::from_config(&config("5", "yes"));
        shown.fold_build(&query, &doc, &stamp(1));
        let chart = shown.charts().next().unwrap();
        assert_eq!(chart.lines()[0].points().next().unwrap().y, 0.0);
    }

    #[test]
    fn points_carry_build_annotations() {
        let query = JsonDocumentQuery::new();
        let mut store = TimeSeriesStore::from_config(&config("5", "no"));
        store.fold_build(&query, &json!({"r": {"x": 4.0, "y": 1.0}}), &stamp(42));

        let chart = store.charts().next().unwrap();
        let point = chart.lines()[0].points().next().unwrap();
        assert_eq!(point.build_number, 42);
        assert_eq!(point.label, "#42");
        assert_eq!(point.timestamp, "2026-01-01 00:00:00");
    }
}

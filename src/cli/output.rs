//! Console output for the CLI.

use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;

use crate::domain::models::RunOutcome;
use crate::domain::ports::{OutputSink, StreamOrigin};

/// Sink printing the run narrative and subprocess output to the console.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn note(&self, line: &str) {
        println!("[stampede] {line}");
    }

    fn output(&self, origin: StreamOrigin, line: &str) {
        match origin {
            StreamOrigin::Stdout => println!("{line}"),
            StreamOrigin::Stderr => eprintln!("{line}"),
        }
    }
}

/// Render the published parameters and verdicts as tables.
pub fn render_outcome(outcome: &RunOutcome) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Parameter", "Value"]);
    for (key, value) in outcome.publish_parameters() {
        table.add_row(vec![key, value]);
    }
    println!("{table}");

    if !outcome.verdicts.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Severity", "Metric", "Value", "Condition", "Message"]);
        for verdict in &outcome.verdicts {
            table.add_row(vec![
                verdict.severity.as_str().to_string(),
                verdict.metric_id.clone().unwrap_or_default(),
                verdict.value.clone().unwrap_or_default(),
                verdict.condition.clone().unwrap_or_default(),
                verdict.message.clone(),
            ]);
        }
        println!("{table}");
    }
}

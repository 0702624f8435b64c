//! Process-wide toolchain defaults.
//!
//! Loaded once at startup from the bundled defaults plus optional local
//! overrides, then injected into the orchestrator. Never accessed as
//! ambient global state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default log level when `RUST_LOG` is unset.
    pub level: String,
    /// When set, a daily-rolling JSON log file is written here in addition
    /// to stderr.
    pub log_dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".into(), log_dir: None }
    }
}

/// Commands and directory roots of the external load-test toolkit.
///
/// The external tools are opaque contracts: input directory, output
/// directory, exit code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainDefaults {
    /// Primary distributed run controller.
    pub controller_cmd: String,
    /// Report generator over one or more raw result sets.
    pub report_cmd: String,
    /// Trend report generator over prior report sets.
    pub trend_report_cmd: String,
    /// Diff report generator between two reports.
    pub diff_report_cmd: String,
    /// Criteria checker emitting machine-readable verdicts.
    pub criteria_cmd: String,
    /// Cloud provisioning and teardown tool.
    pub cloud_admin_cmd: String,
    /// Root for per-run temporary working directories.
    pub working_area: PathBuf,
    /// Root of the append-only per-build archive.
    pub builds_area: PathBuf,
    /// Directory holding run-time configuration files (agent URL files,
    /// cloud admin properties).
    pub config_dir: PathBuf,
    /// File name of the machine-readable result document within a result
    /// set.
    pub result_document: String,
    /// When set, published report locations are URLs under this base
    /// instead of local paths.
    pub report_url_base: Option<String>,
    /// Node-set path listing failed test cases in the result document.
    pub test_failures_path: String,
    /// Node-set path listing the slowest requests in the result document.
    pub slow_requests_path: String,
    /// Forwarded to the controller for external enforcement.
    pub initial_response_timeout_secs: u64,
    pub logging: LogSettings,
}

impl Default for ToolchainDefaults {
    fn default() -> Self {
        Self {
            controller_cmd: "lt-controller".into(),
            report_cmd: "lt-report".into(),
            trend_report_cmd: "lt-trend-report".into(),
            diff_report_cmd: "lt-diff-report".into(),
            criteria_cmd: "lt-check-criteria".into(),
            cloud_admin_cmd: "lt-cloud-admin".into(),
            working_area: PathBuf::from(".stampede/work"),
            builds_area: PathBuf::from(".stampede/builds"),
            config_dir: PathBuf::from(".stampede/config"),
            result_document: "loadreport.json".into(),
            report_url_base: None,
            test_failures_path: "/loadreport/testFailures".into(),
            slow_requests_path: "/loadreport/slowRequests".into(),
            initial_response_timeout_secs: 360,
            logging: LogSettings::default(),
        }
    }
}

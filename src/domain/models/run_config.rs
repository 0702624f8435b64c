//! Run configuration domain model.
//!
//! A `RunConfiguration` is parsed once when a run is scheduled and stays
//! immutable for the whole pipeline invocation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the remote agent controllers for a run are obtained.
///
/// This is a closed set: every variant is matched exhaustively by the
/// resolver, there is no open-ended registration of new variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AgentControllerConfig {
    /// Run the agent inside the controller process; no remote endpoints.
    Embedded,
    /// A literal list of controller URLs, separated by any common delimiter.
    UrlList { urls: String },
    /// Like `UrlList`, but the text is read from a file under the config
    /// directory at run time, so the value may be produced by checkout.
    UrlFile { file: PathBuf },
    /// Controllers are provisioned on demand through the cloud admin tool.
    CloudProvisioned(CloudAgentConfig),
}

impl AgentControllerConfig {
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded)
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, Self::CloudProvisioned(_))
    }

    /// Short name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::UrlList { .. } => "url-list",
            Self::UrlFile { .. } => "url-file",
            Self::CloudProvisioned(_) => "cloud",
        }
    }
}

/// Parameters forwarded to the cloud provisioning tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudAgentConfig {
    pub region: String,
    pub image_id: String,
    pub instance_type: String,
    pub instance_count: u32,
    /// Tag applied to the provisioned machines; teardown terminates by
    /// region plus tag.
    pub tag_name: String,
    /// Optional user-data payload handed to every provisioned instance.
    pub user_data: Option<String>,
    /// Optional stored credential pair appended to the properties file the
    /// admin tool reads.
    pub credentials: Option<CloudCredentials>,
}

/// Access credentials for the cloud admin tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudCredentials {
    pub access_key: String,
    pub secret_key: String,
}

/// Critical-streak thresholds.
///
/// A run is flagged critical when at least `condition_count` of the last
/// `max(condition_count, build_count)` prior builds carried a failed
/// verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalStreakConfig {
    pub condition_count: u32,
    pub build_count: u32,
}

impl CriticalStreakConfig {
    /// Number of prior builds the streak scan examines.
    pub fn scan_depth(&self) -> usize {
        self.condition_count.max(self.build_count) as usize
    }

    /// Streak detection is off when no threshold is configured.
    pub fn is_enabled(&self) -> bool {
        self.condition_count > 0
    }
}

/// Immutable per-run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Identifies the step within the build; part of the working directory
    /// name and the archive layout.
    pub step_id: String,
    pub job_name: String,
    pub build_number: u32,
    /// Directory holding the worker binaries staged into the working area.
    pub worker_template_dir: PathBuf,
    pub agent_controllers: AgentControllerConfig,
    /// Raw metrics configuration (JSON); parsed once at pipeline start.
    pub metrics_json: String,
    pub critical: CriticalStreakConfig,
    /// History depth of the summary report built from raw results.
    pub summary_builds: u32,
    /// History depth of the trend report built from prior reports.
    pub trend_builds: u32,
    pub archive_results: bool,
    pub create_summary_report: bool,
    pub create_trend_report: bool,
    /// Build number to diff the fresh report against, if any.
    pub diff_baseline: Option<u32>,
    /// Forwarded to the load controller for external enforcement; the
    /// pipeline itself never applies a timeout.
    pub initial_response_timeout_secs: u64,
}

impl RunConfiguration {
    /// Unique working directory name for this run.
    pub fn working_dir_name(&self) -> String {
        format!("{}_{}_{}", self.job_name, self.build_number, self.step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_scan_depth_is_max_of_both_counts() {
        let cfg = CriticalStreakConfig { condition_count: 3, build_count: 5 };
        assert_eq!(cfg.scan_depth(), 5);

        let cfg = CriticalStreakConfig { condition_count: 7, build_count: 5 };
        assert_eq!(cfg.scan_depth(), 7);
    }

    #[test]
    fn streak_disabled_without_condition_count() {
        let cfg = CriticalStreakConfig { condition_count: 0, build_count: 8 };
        assert!(!cfg.is_enabled());
    }

    #[test]
    fn working_dir_name_is_unique_per_job_build_step() {
        let cfg = RunConfiguration {
            step_id: "smoke".into(),
            job_name: "checkout".into(),
            build_number: 17,
            worker_template_dir: PathBuf::from("/opt/workers"),
            agent_controllers: AgentControllerConfig::Embedded,
            metrics_json: String::new(),
            critical: CriticalStreakConfig { condition_count: 0, build_count: 0 },
            summary_builds: 5,
            trend_builds: 10,
            archive_results: false,
            create_summary_report: false,
            create_trend_report: false,
            diff_baseline: None,
            initial_response_timeout_secs: 360,
        };
        assert_eq!(cfg.working_dir_name(), "checkout_17_smoke");
    }
}

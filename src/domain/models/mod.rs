//! Domain models for the Stampede run pipeline.

pub mod chart;
pub mod metrics;
pub mod run_config;
pub mod toolchain;
pub mod verdict;

pub use chart::{Chart, ChartData, Line, LineData, Point};
pub use metrics::{MetricDefinition, MetricsConfig, PlotDefinition};
pub use run_config::{
    AgentControllerConfig, CloudAgentConfig, CloudCredentials, CriticalStreakConfig,
    RunConfiguration,
};
pub use toolchain::{LogSettings, ToolchainDefaults};
pub use verdict::{ConditionVerdict, RunOutcome, RunStatus, VerdictSeverity};

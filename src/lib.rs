//! Stampede - Load-Test Run Orchestrator
//!
//! Stampede drives distributed load-test runs end to end: staging worker
//! binaries, resolving agent controllers, executing the external load-test
//! toolkit, evaluating success criteria against the result document, and
//! folding per-build metrics into bounded cross-build trend charts.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure business logic and domain models
//! - **Service Layer** (`services`): The pipeline components
//! - **Infrastructure Layer** (`infrastructure`): External integrations and adapters
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use stampede::services::Orchestrator;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Wire adapters, build an Orchestrator, then:
//!     // let outcome = orchestrator.run(&CancellationToken::new()).await;
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{RunError, RunResult};
pub use domain::models::{
    AgentControllerConfig, Chart, ChartData, CloudAgentConfig, ConditionVerdict,
    CriticalStreakConfig, Line, MetricDefinition, MetricsConfig, PlotDefinition,
    RunConfiguration, RunOutcome, RunStatus, ToolchainDefaults, VerdictSeverity,
};
pub use domain::ports::{
    BuildHistory, BuildRecord, DocumentQuery, FileStore, OutputSink, ProcessExecutor,
    QueryValue, StreamOrigin,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AgentControllerResolver, CriteriaEngine, Orchestrator, TimeSeriesStore};

//! Service layer: the pipeline components.

pub mod agent_resolver;
pub mod criteria;
pub mod orchestrator;
pub mod timeseries;

pub use agent_resolver::{AgentControllerResolver, ResolvedAgents};
pub use criteria::CriteriaEngine;
pub use orchestrator::{detect_critical_streak, Orchestrator};
pub use timeseries::{BuildStamp, TimeSeriesStore};

//! Historical build access port.
//!
//! Critical-streak scanning and trend building read prior builds through
//! this seam as a finite, restartable, most-recent-first sequence — never
//! as a live handle into host build storage.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::RunResult;
use crate::domain::models::RunStatus;

/// Persisted summary of one completed run, appended by the publishing
/// phase and read back by later runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub build_number: u32,
    pub completed_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Whether the build carried at least one failed verdict.
    pub condition_failed: bool,
    /// Archived raw results, when result archiving succeeded.
    pub results_dir: Option<PathBuf>,
    /// Archived report artifacts, when report archiving succeeded.
    pub report_dir: Option<PathBuf>,
}

#[async_trait]
pub trait BuildHistory: Send + Sync {
    /// Records of prior builds for a job/step, most recent first.
    async fn prior_builds(&self, job_name: &str, step_id: &str) -> RunResult<Vec<BuildRecord>>;
}

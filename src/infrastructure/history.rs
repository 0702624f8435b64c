//! Filesystem adapter for the `BuildHistory` port.
//!
//! Prior builds live in the append-only archive area as
//! `<builds>/<job>/<step>/<number>/record.json`. Each record was written
//! by that build's publishing phase. Unreadable entries are skipped.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::{RunError, RunResult};
use crate::domain::ports::{BuildHistory, BuildRecord};

pub struct FsBuildHistory {
    builds_area: PathBuf,
}

impl FsBuildHistory {
    pub fn new(builds_area: impl Into<PathBuf>) -> Self {
        Self { builds_area: builds_area.into() }
    }
}

#[async_trait]
impl BuildHistory for FsBuildHistory {
    async fn prior_builds(&self, job_name: &str, step_id: &str) -> RunResult<Vec<BuildRecord>> {
        let dir = self.builds_area.join(job_name).join(step_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RunError::Storage(format!(
                    "listing '{}' failed: {e}",
                    dir.display()
                )))
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RunError::Storage(e.to_string()))?
        {
            if entry.file_name().to_string_lossy().parse::<u32>().is_err() {
                continue;
            }
            let record_path = entry.path().join("record.json");
            let Ok(text) = tokio::fs::read_to_string(&record_path).await else {
                debug!(path = %record_path.display(), "build directory without record, skipping");
                continue;
            };
            match serde_json::from_str::<BuildRecord>(&text) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(path = %record_path.display(), error = %e, "unreadable build record, skipping");
                }
            }
        }

        records.sort_by(|a, b| b.build_number.cmp(&a.build_number));
        Ok(records)
    }
}

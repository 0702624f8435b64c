//! Run orchestrator service.
//!
//! A deterministic state machine that drives one load-test run through its
//! ordered phases. Any phase failure triggers the post-run cleanup steps,
//! downstream phases are gated by explicit progress flags, and a
//! `RunOutcome` is always produced.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{RunError, RunResult};
use crate::domain::models::{
    ChartData, ConditionVerdict, CriticalStreakConfig, MetricsConfig, RunConfiguration,
    RunOutcome, RunStatus, ToolchainDefaults, VerdictSeverity,
};
use crate::domain::ports::{
    BuildHistory, BuildRecord, DocumentQuery, FileStore, OutputSink, ProcessExecutor,
};
use crate::services::agent_resolver::{AgentControllerResolver, ResolvedAgents};
use crate::services::criteria::CriteriaEngine;
use crate::services::timeseries::{BuildStamp, TimeSeriesStore};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Drives one run. Owns no shared mutable state: concurrent runs only
/// share read-only configuration and the append-only build archive.
pub struct Orchestrator {
    config: RunConfiguration,
    defaults: Arc<ToolchainDefaults>,
    executor: Arc<dyn ProcessExecutor>,
    files: Arc<dyn FileStore>,
    query: Arc<dyn DocumentQuery>,
    history: Arc<dyn BuildHistory>,
    resolver: AgentControllerResolver,
    sink: Arc<dyn OutputSink>,
}

/// Mutable per-run progress, discarded once the outcome is published.
struct RunState {
    status: RunStatus,
    validated: bool,
    results_saved: bool,
    reports_saved: bool,
    cloud_active: bool,
    diff_created: bool,
    metrics: MetricsConfig,
    document: Option<Value>,
    report_url: Option<String>,
    diff_report_url: Option<String>,
    verdicts: Vec<ConditionVerdict>,
    condition_critical: bool,
    test_failures: Vec<String>,
    slow_requests: Vec<String>,
    phase_failures: Vec<String>,
    charts: Vec<ChartData>,
}

impl RunState {
    fn new() -> Self {
        Self {
            status: RunStatus::Success,
            validated: false,
            results_saved: false,
            reports_saved: false,
            cloud_active: false,
            diff_created: false,
            metrics: MetricsConfig::default(),
            document: None,
            report_url: None,
            diff_report_url: None,
            verdicts: Vec::new(),
            condition_critical: false,
            test_failures: Vec::new(),
            slow_requests: Vec::new(),
            phase_failures: Vec::new(),
            charts: Vec::new(),
        }
    }

    /// Only ever move towards a worse status.
    fn downgrade(&mut self, status: RunStatus) {
        if status > self.status {
            self.status = status;
        }
    }

    fn mark_failure(&mut self, message: impl Into<String>) {
        self.phase_failures.push(message.into());
        self.downgrade(RunStatus::Failure);
    }
}

/// All paths of one run, derived once from configuration and defaults.
/// The working directory is named uniquely by job, build number and step.
struct RunPaths {
    work_dir: PathBuf,
    agent_dir: PathBuf,
    results_dir: PathBuf,
    report_dir: PathBuf,
    diff_report_dir: PathBuf,
    checks_file: PathBuf,
    log_dir: PathBuf,
    archive_dir: PathBuf,
    archive_results_dir: PathBuf,
    archive_report_dir: PathBuf,
    archive_log_dir: PathBuf,
    summary_dir: PathBuf,
    trend_dir: PathBuf,
    record_file: PathBuf,
}

impl RunPaths {
    fn new(config: &RunConfiguration, defaults: &ToolchainDefaults) -> Self {
        let work_dir = defaults.working_area.join(config.working_dir_name());
        let archive_dir = defaults
            .builds_area
            .join(&config.job_name)
            .join(&config.step_id)
            .join(config.build_number.to_string());
        let diff_report_dir = work_dir.join("diff-report");
        Self {
            agent_dir: work_dir.join("agent"),
            results_dir: work_dir.join("results"),
            report_dir: work_dir.join("report"),
            checks_file: diff_report_dir.join("checks.json"),
            diff_report_dir,
            log_dir: work_dir.join("log"),
            archive_results_dir: archive_dir.join("results"),
            archive_report_dir: archive_dir.join("report"),
            archive_log_dir: archive_dir.join("log"),
            summary_dir: archive_dir.join("summary-report"),
            trend_dir: archive_dir.join("trend-report"),
            record_file: archive_dir.join("record.json"),
            work_dir,
            archive_dir,
        }
    }
}

impl Orchestrator {
    pub fn new(
        config: RunConfiguration,
        defaults: Arc<ToolchainDefaults>,
        executor: Arc<dyn ProcessExecutor>,
        files: Arc<dyn FileStore>,
        query: Arc<dyn DocumentQuery>,
        history: Arc<dyn BuildHistory>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        let resolver = AgentControllerResolver::new(
            executor.clone(),
            files.clone(),
            defaults.cloud_admin_cmd.clone(),
            defaults.config_dir.clone(),
        );
        Self { config, defaults, executor, files, query, history, resolver, sink }
    }

    /// Execute the full pipeline. Always returns an outcome; cancellation
    /// and phase failures are folded into it.
    pub async fn run(&self, cancel: &CancellationToken) -> RunOutcome {
        let paths = RunPaths::new(&self.config, &self.defaults);
        info!(
            job = %self.config.job_name,
            build = self.config.build_number,
            step = %self.config.step_id,
            "starting load test run"
        );
        self.sink.note(&format!(
            "starting load test run {} #{} step '{}'",
            self.config.job_name, self.config.build_number, self.config.step_id
        ));

        let mut state = RunState::new();

        // Phase 1: validation, before any side effect. A rejected
        // configuration never reaches cleanup or post-run steps.
        if let Err(e) = self.validate(&mut state) {
            error!(error = %e, "run configuration rejected");
            state.mark_failure(e.to_string());
            return self.publish(state, &paths).await;
        }

        match self.primary_phases(&mut state, &paths, cancel).await {
            Ok(()) => {}
            Err(RunError::Aborted) => {
                warn!("run cancelled, skipping remaining primary phases");
                self.sink.note("run cancelled");
                state.downgrade(RunStatus::Aborted);
            }
            Err(e) => {
                error!(error = %e, "run failed");
                self.sink.note(&format!("run failed: {e}"));
                state.mark_failure(e.to_string());
            }
        }

        self.post_run(&mut state, &paths).await;
        self.publish(state, &paths).await
    }

    fn validate(&self, state: &mut RunState) -> RunResult<()> {
        if self.config.step_id.trim().is_empty() {
            return Err(RunError::Configuration("step identifier must not be blank".into()));
        }
        if self.config.worker_template_dir.as_os_str().is_empty() {
            return Err(RunError::Configuration("worker template path must not be blank".into()));
        }
        state.metrics = MetricsConfig::parse(&self.config.metrics_json)?;
        state.validated = true;
        Ok(())
    }

    /// Phases 2 through 10. Fatal phases propagate; non-fatal ones mark
    /// FAILURE and keep going. Cancellation wins over both.
    async fn primary_phases(
        &self,
        state: &mut RunState,
        paths: &RunPaths,
        cancel: &CancellationToken,
    ) -> RunResult<()> {
        // Phase 2: best-effort cleanup of prior temporary state.
        self.cleanup_previous(paths).await;
        Self::checkpoint(cancel)?;

        // Phase 3: stage worker binaries (fatal).
        self.sink.note("staging worker binaries");
        self.stage_workers(paths).await?;
        Self::checkpoint(cancel)?;

        // Phase 4: resolve agent controllers (fatal when none resolve).
        let resolved = self.resolve_agents(state, paths, cancel).await?;

        // Phase 5: primary distributed run (fatal on nonzero exit).
        self.execute_load_test(&resolved, paths, cancel).await?;

        // Phase 6: persist raw results.
        if self.config.archive_results {
            match self.files.copy_tree(&paths.results_dir, &paths.archive_results_dir).await {
                Ok(()) => {
                    state.results_saved = true;
                    info!(dir = %paths.archive_results_dir.display(), "raw results archived");
                }
                Err(e) => {
                    warn!(error = %e, "failed to archive raw results");
                    state.mark_failure(format!("archiving raw results failed: {e}"));
                }
            }
        }
        Self::checkpoint(cancel)?;

        // Phase 7: primary report (fatal on nonzero exit).
        self.create_report(state, paths, cancel).await?;

        // Phase 8: diff report against a baseline build (non-fatal).
        if let Some(baseline) = self.config.diff_baseline {
            match self.create_diff_report(state, baseline, paths, cancel).await {
                Ok(()) => state.diff_created = true,
                Err(RunError::Aborted) => return Err(RunError::Aborted),
                Err(e) => {
                    warn!(error = %e, baseline, "diff report generation failed");
                    state.mark_failure(format!("diff report against #{baseline} failed: {e}"));
                }
            }
        }

        // Phase 9: persist report artifacts.
        match self.files.copy_tree(&paths.report_dir, &paths.archive_report_dir).await {
            Ok(()) => {
                state.reports_saved = true;
                info!(dir = %paths.archive_report_dir.display(), "report artifacts archived");
            }
            Err(e) => {
                warn!(error = %e, "failed to archive report artifacts");
                state.mark_failure(format!("archiving report artifacts failed: {e}"));
            }
        }
        Self::checkpoint(cancel)?;

        // Phase 10: success criteria.
        self.evaluate_criteria(state, paths).await;
        Ok(())
    }

    fn checkpoint(cancel: &CancellationToken) -> RunResult<()> {
        if cancel.is_cancelled() {
            Err(RunError::Aborted)
        } else {
            Ok(())
        }
    }

    async fn cleanup_previous(&self, paths: &RunPaths) {
        debug!(dir = %paths.work_dir.display(), "removing temporary state of previous runs");
        if let Err(e) = self.files.delete_tree(&paths.work_dir).await {
            warn!(error = %e, "failed to remove previous temporary state");
        }
    }

    async fn stage_workers(&self, paths: &RunPaths) -> RunResult<()> {
        let template = &self.config.worker_template_dir;
        if !self.files.is_directory(template).await {
            return Err(RunError::ResourceUnavailable(format!(
                "worker template directory '{}' does not exist",
                template.display()
            )));
        }
        self.files.copy_tree(template, &paths.agent_dir).await?;

        // Launch scripts lose their execute bit on some checkouts.
        let bin_dir = paths.agent_dir.join("bin");
        if self.files.is_directory(&bin_dir).await {
            for entry in self.files.list(&bin_dir).await? {
                self.files.chmod(&entry, 0o755).await?;
            }
        }
        Ok(())
    }

    async fn resolve_agents(
        &self,
        state: &mut RunState,
        paths: &RunPaths,
        cancel: &CancellationToken,
    ) -> RunResult<ResolvedAgents> {
        let controllers = &self.config.agent_controllers;
        self.sink.note(&format!("resolving agent controllers ({})", controllers.as_str()));

        // Teardown must run even when provisioning itself fails halfway.
        if controllers.is_cloud() {
            state.cloud_active = true;
        }

        let resolved = self
            .resolver
            .resolve(controllers, &paths.work_dir, self.sink.as_ref(), cancel)
            .await?;
        match &resolved {
            ResolvedAgents::Embedded => info!("running with embedded agent controller"),
            ResolvedAgents::Controllers(urls) if urls.is_empty() => {
                return Err(RunError::ResourceUnavailable(
                    "no agent controllers resolved".into(),
                ));
            }
            ResolvedAgents::Controllers(urls) => {
                info!(count = urls.len(), "agent controllers resolved");
            }
        }
        Ok(resolved)
    }

    async fn execute_load_test(
        &self,
        resolved: &ResolvedAgents,
        paths: &RunPaths,
        cancel: &CancellationToken,
    ) -> RunResult<()> {
        self.sink.note("executing load test");
        let mut argv = vec![self.defaults.controller_cmd.clone()];
        match resolved {
            ResolvedAgents::Embedded => argv.push("-embedded".into()),
            ResolvedAgents::Controllers(urls) => {
                argv.push("-agents".into());
                argv.push(urls.join(","));
            }
        }
        argv.push("-label".into());
        argv.push(self.config.step_id.clone());
        argv.push("-timeout".into());
        argv.push(self.config.initial_response_timeout_secs.to_string());
        argv.push("-o".into());
        argv.push(paths.results_dir.display().to_string());

        let code = self
            .executor
            .execute(&paths.work_dir, &argv, self.sink.as_ref(), cancel)
            .await?;
        if code != 0 {
            return Err(RunError::tool_failed(&self.defaults.controller_cmd, code));
        }
        Ok(())
    }

    async fn create_report(
        &self,
        state: &mut RunState,
        paths: &RunPaths,
        cancel: &CancellationToken,
    ) -> RunResult<()> {
        self.sink.note("generating load test report");
        let argv = vec![
            self.defaults.report_cmd.clone(),
            paths.results_dir.display().to_string(),
            "-o".into(),
            paths.report_dir.display().to_string(),
        ];
        let code = self
            .executor
            .execute(&paths.work_dir, &argv, self.sink.as_ref(), cancel)
            .await?;
        if code != 0 {
            return Err(RunError::tool_failed(&self.defaults.report_cmd, code));
        }
        state.report_url = Some(self.artifact_url(&paths.archive_report_dir));
        Ok(())
    }

    async fn create_diff_report(
        &self,
        state: &mut RunState,
        baseline: u32,
        paths: &RunPaths,
        cancel: &CancellationToken,
    ) -> RunResult<()> {
        self.sink.note(&format!("generating diff report against build #{baseline}"));
        let priors = self.prior_records().await?;
        let baseline_report = priors
            .iter()
            .find(|r| r.build_number == baseline)
            .and_then(|r| r.report_dir.clone())
            .ok_or_else(|| {
                RunError::Configuration(format!(
                    "no archived report for baseline build #{baseline}"
                ))
            })?;

        let argv = vec![
            self.defaults.diff_report_cmd.clone(),
            baseline_report.display().to_string(),
            paths.report_dir.display().to_string(),
            "-o".into(),
            paths.diff_report_dir.display().to_string(),
        ];
        let code = self
            .executor
            .execute(&paths.work_dir, &argv, self.sink.as_ref(), cancel)
            .await?;
        if code != 0 {
            return Err(RunError::tool_failed(&self.defaults.diff_report_cmd, code));
        }

        // The checker emits machine-readable verdicts over the diff; they
        // are merged during criteria evaluation.
        let argv = vec![
            self.defaults.criteria_cmd.clone(),
            paths.diff_report_dir.display().to_string(),
            "-o".into(),
            paths.checks_file.display().to_string(),
        ];
        let code = self
            .executor
            .execute(&paths.work_dir, &argv, self.sink.as_ref(), cancel)
            .await?;
        if code != 0 {
            return Err(RunError::tool_failed(&self.defaults.criteria_cmd, code));
        }

        state.diff_report_url = Some(self.artifact_url(&paths.diff_report_dir));
        Ok(())
    }

    async fn evaluate_criteria(&self, state: &mut RunState, paths: &RunPaths) {
        self.sink.note("evaluating success criteria");

        let doc_path = paths.results_dir.join(&self.defaults.result_document);
        state.document = match self.query.parse(&doc_path).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "result document could not be read");
                None
            }
        };

        let engine = CriteriaEngine::new(self.query.as_ref());
        let mut verdicts = engine.evaluate(state.document.as_ref(), &state.metrics);

        if state.diff_created {
            if let Ok(raw) = self.files.read(&paths.checks_file).await {
                verdicts.extend(CriteriaEngine::parse_external(&raw));
            }
        }

        let condition_failed =
            verdicts.iter().any(|v| v.severity == VerdictSeverity::Failed);
        if condition_failed {
            self.sink.note("success criteria not met, marking run unstable");
            state.downgrade(RunStatus::Unstable);
        }
        state.verdicts = verdicts;

        if self.config.critical.is_enabled() {
            match self.prior_records().await {
                Ok(priors) => {
                    state.condition_critical =
                        detect_critical_streak(&priors, &self.config.critical);
                }
                Err(e) => {
                    warn!(error = %e, "could not scan build history for critical streak");
                }
            }
            if state.condition_critical {
                warn!(
                    threshold = self.config.critical.condition_count,
                    "critical condition streak detected"
                );
                self.sink.note("critical condition streak detected");
            }
        }

        if let Some(doc) = &state.document {
            state.test_failures = self.extract_list(doc, &self.defaults.test_failures_path);
            state.slow_requests = self.extract_list(doc, &self.defaults.slow_requests_path);
        }
    }

    /// Phase 11. Every step is independently guarded: it logs, may mark
    /// FAILURE, and never prevents the remaining steps. These steps run to
    /// completion even when the run itself was cancelled, so subprocess
    /// calls here get a fresh token.
    async fn post_run(&self, state: &mut RunState, paths: &RunPaths) {
        self.sink.note("running post-run steps");
        let post_cancel = CancellationToken::new();

        if state.cloud_active {
            if let Err(e) = self
                .resolver
                .teardown(
                    &self.config.agent_controllers,
                    &paths.work_dir,
                    self.sink.as_ref(),
                    &post_cancel,
                )
                .await
            {
                error!(error = %e, "cloud agent teardown failed");
                state.mark_failure(format!("cloud agent teardown failed: {e}"));
            }
        }

        if self.config.create_summary_report && state.results_saved {
            if let Err(e) = self.create_summary_report(paths, &post_cancel).await {
                warn!(error = %e, "summary report generation failed");
                state.mark_failure(format!("summary report failed: {e}"));
            }
        }

        if self.config.create_trend_report && state.reports_saved {
            if let Err(e) = self.create_trend_report(paths, &post_cancel).await {
                warn!(error = %e, "trend report generation failed");
                state.mark_failure(format!("trend report failed: {e}"));
            }
        }

        if self.files.is_directory(&paths.log_dir).await {
            if let Err(e) = self.files.copy_tree(&paths.log_dir, &paths.archive_log_dir).await {
                warn!(error = %e, "log archiving failed");
                state.mark_failure(format!("log archiving failed: {e}"));
            }
        }

        if let Err(e) = self.files.delete_tree(&paths.work_dir).await {
            warn!(error = %e, "failed to remove temporary working area");
            state.mark_failure(format!("working area cleanup failed: {e}"));
        }
    }

    async fn create_summary_report(
        &self,
        paths: &RunPaths,
        cancel: &CancellationToken,
    ) -> RunResult<()> {
        self.sink.note("building summary report over recent builds");
        let mut argv = vec![self.defaults.report_cmd.clone()];
        argv.push(paths.archive_results_dir.display().to_string());

        let take = (self.config.summary_builds.max(1) as usize) - 1;
        let priors = self.prior_records().await?;
        argv.extend(
            priors
                .iter()
                .filter_map(|r| r.results_dir.as_ref())
                .take(take)
                .map(|p| p.display().to_string()),
        );
        argv.push("-o".into());
        argv.push(paths.summary_dir.display().to_string());

        let code = self
            .executor
            .execute(&paths.archive_dir, &argv, self.sink.as_ref(), cancel)
            .await?;
        if code != 0 {
            return Err(RunError::tool_failed(&self.defaults.report_cmd, code));
        }
        Ok(())
    }

    async fn create_trend_report(
        &self,
        paths: &RunPaths,
        cancel: &CancellationToken,
    ) -> RunResult<()> {
        self.sink.note("building trend report over recent builds");
        let mut argv = vec![self.defaults.trend_report_cmd.clone()];
        argv.push(paths.archive_report_dir.display().to_string());

        let take = (self.config.trend_builds.max(1) as usize) - 1;
        let priors = self.prior_records().await?;
        argv.extend(
            priors
                .iter()
                .filter_map(|r| r.report_dir.as_ref())
                .take(take)
                .map(|p| p.display().to_string()),
        );
        argv.push("-o".into());
        argv.push(paths.trend_dir.display().to_string());

        let code = self
            .executor
            .execute(&paths.archive_dir, &argv, self.sink.as_ref(), cancel)
            .await?;
        if code != 0 {
            return Err(RunError::tool_failed(&self.defaults.trend_report_cmd, code));
        }
        Ok(())
    }

    /// Phase 12: build the outcome, append the build record, publish.
    async fn publish(&self, mut state: RunState, paths: &RunPaths) -> RunOutcome {
        if state.reports_saved {
            state.charts = self.build_charts(&state).await;
        }

        let condition_failed =
            state.verdicts.iter().any(|v| v.severity == VerdictSeverity::Failed);
        let condition_error =
            state.verdicts.iter().any(|v| v.severity == VerdictSeverity::Error);
        let message = state
            .verdicts
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let ran_failed =
            state.status == RunStatus::Failure || !state.phase_failures.is_empty();

        let outcome = RunOutcome {
            status: state.status,
            ran_failed,
            condition_failed,
            condition_error,
            condition_critical: state.condition_critical,
            message,
            report_url: state.report_url.clone(),
            diff_report_url: state.diff_report_url.clone(),
            verdicts: state.verdicts.clone(),
            test_failures: state.test_failures.clone(),
            slow_requests: state.slow_requests.clone(),
            charts: state.charts.clone(),
        };

        // Append this run to the build archive other runs scan. Skipped
        // when validation failed: that path must stay side-effect free.
        if state.validated {
            if let Err(e) = self.write_build_record(&state, &outcome, paths).await {
                warn!(error = %e, "failed to persist build record");
            }
        }

        for (key, value) in outcome.publish_parameters() {
            debug!(%key, %value, "publishing run parameter");
        }
        info!(status = outcome.status.as_str(), "load test run finished");
        self.sink.note(&format!("run finished with status {}", outcome.status.as_str()));
        outcome
    }

    async fn write_build_record(
        &self,
        state: &RunState,
        outcome: &RunOutcome,
        paths: &RunPaths,
    ) -> RunResult<()> {
        let record = BuildRecord {
            build_number: self.config.build_number,
            completed_at: Utc::now(),
            status: outcome.status,
            condition_failed: outcome.condition_failed,
            results_dir: state.results_saved.then(|| paths.archive_results_dir.clone()),
            report_dir: state.reports_saved.then(|| paths.archive_report_dir.clone()),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| RunError::Storage(e.to_string()))?;
        self.files.write(&paths.record_file, &json).await
    }

    /// Rebuild the chart set by folding one result document per relevant
    /// prior build plus the current one.
    async fn build_charts(&self, state: &RunState) -> Vec<ChartData> {
        let mut store = TimeSeriesStore::from_config(&state.metrics);
        if store.is_empty() {
            return Vec::new();
        }

        let mut priors = match self.prior_records().await {
            Ok(priors) => priors,
            Err(e) => {
                warn!(error = %e, "could not read build history for charts");
                Vec::new()
            }
        };
        priors.retain(|r| r.results_dir.is_some());
        priors.truncate(store.max_history().saturating_sub(1));
        priors.reverse(); // fold oldest first

        for record in &priors {
            let Some(results_dir) = &record.results_dir else { continue };
            let doc_path = results_dir.join(&self.defaults.result_document);
            match self.query.parse(&doc_path).await {
                Ok(Some(doc)) => store.fold_build(
                    self.query.as_ref(),
                    &doc,
                    &BuildStamp {
                        build_number: record.build_number,
                        label: format!("#{}", record.build_number),
                        timestamp: record.completed_at.format(TIMESTAMP_FORMAT).to_string(),
                    },
                ),
                Ok(None) => {
                    debug!(build = record.build_number, "no result document for prior build");
                }
                Err(e) => {
                    warn!(build = record.build_number, error = %e, "skipping unreadable prior build");
                }
            }
        }

        if let Some(doc) = &state.document {
            store.fold_build(
                self.query.as_ref(),
                doc,
                &BuildStamp {
                    build_number: self.config.build_number,
                    label: format!("#{}", self.config.build_number),
                    timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
                },
            );
        }
        store.to_chart_data()
    }

    /// Prior build records, most recent first, strictly older than this
    /// run's build.
    async fn prior_records(&self) -> RunResult<Vec<BuildRecord>> {
        let mut records = self
            .history
            .prior_builds(&self.config.job_name, &self.config.step_id)
            .await?;
        records.retain(|r| r.build_number < self.config.build_number);
        Ok(records)
    }

    fn extract_list(&self, doc: &Value, path: &str) -> Vec<String> {
        self.query
            .evaluate(doc, path)
            .map(crate::domain::ports::QueryValue::into_texts)
            .unwrap_or_default()
    }

    fn artifact_url(&self, local: &Path) -> String {
        match &self.defaults.report_url_base {
            Some(base) => format!(
                "{}/{}/{}/{}/{}",
                base.trim_end_matches('/'),
                self.config.job_name,
                self.config.build_number,
                self.config.step_id,
                local.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            ),
            None => local.display().to_string(),
        }
    }
}

/// Scan the last `max(condition_count, build_count)` prior outcomes, most
/// recent first, and flag a critical streak as soon as `condition_count`
/// of them carried a failed verdict.
pub fn detect_critical_streak(priors: &[BuildRecord], config: &CriticalStreakConfig) -> bool {
    let mut failed = 0;
    for record in priors.iter().take(config.scan_depth()) {
        if record.condition_failed {
            failed += 1;
            if failed >= config.condition_count {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(build_number: u32, condition_failed: bool) -> BuildRecord {
        BuildRecord {
            build_number,
            completed_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            status: if condition_failed { RunStatus::Unstable } else { RunStatus::Success },
            condition_failed,
            results_dir: None,
            report_dir: None,
        }
    }

    fn outcomes(pattern: &[bool]) -> Vec<BuildRecord> {
        // most recent first, newest gets the highest number
        pattern
            .iter()
            .enumerate()
            .map(|(i, &failed)| record((pattern.len() - i) as u32, failed))
            .collect()
    }

    #[test]
    fn streak_flags_when_threshold_reached_within_scan_depth() {
        let config = CriticalStreakConfig { condition_count: 3, build_count: 5 };
        let priors = outcomes(&[true, false, true, true, false]);
        assert!(detect_critical_streak(&priors, &config));
    }

    #[test]
    fn streak_ignores_failures_beyond_scan_depth() {
        let config = CriticalStreakConfig { condition_count: 3, build_count: 5 };
        let priors = outcomes(&[true, false, true, false, false, true, true]);
        assert!(!detect_critical_streak(&priors, &config));
    }

    #[test]
    fn streak_scan_depth_extends_to_condition_count() {
        // condition_count > build_count widens the window
        let config = CriticalStreakConfig { condition_count: 6, build_count: 2 };
        let priors = outcomes(&[true; 6]);
        assert!(detect_critical_streak(&priors, &config));
    }

    #[test]
    fn streak_needs_enough_failures() {
        let config = CriticalStreakConfig { condition_count: 3, build_count: 5 };
        let priors = outcomes(&[true, false, true, false, false]);
        assert!(!detect_critical_streak(&priors, &config));
    }

    #[test]
    fn state_only_downgrades() {
        let mut state = RunState::new();
        state.downgrade(RunStatus::Unstable);
        assert_eq!(state.status, RunStatus::Unstable);
        state.downgrade(RunStatus::Success);
        assert_eq!(state.status, RunStatus::Unstable);
        state.mark_failure("boom");
        assert_eq!(state.status, RunStatus::Failure);
        state.downgrade(RunStatus::Aborted);
        assert_eq!(state.status, RunStatus::Aborted);
    }
}

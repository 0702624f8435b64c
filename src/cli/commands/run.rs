//! `stampede run`: execute one load-test run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio_util::sync::CancellationToken;

use crate::cli::output::{render_outcome, ConsoleSink};
use crate::domain::models::{
    AgentControllerConfig, CloudAgentConfig, CloudCredentials, CriticalStreakConfig,
    RunConfiguration, RunStatus,
};
use crate::domain::ports::{BuildHistory, DocumentQuery, FileStore, OutputSink, ProcessExecutor};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::{
    logging, FsBuildHistory, JsonDocumentQuery, LocalFileStore, TokioProcessExecutor,
};
use crate::services::Orchestrator;

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Job name this run belongs to.
    #[arg(long)]
    pub job: String,

    /// Build number within the job.
    #[arg(long)]
    pub build: u32,

    /// Step identifier within the build.
    #[arg(long)]
    pub step: String,

    /// Directory holding the worker binaries to stage.
    #[arg(long, value_name = "DIR")]
    pub template_dir: PathBuf,

    /// Metrics configuration file (JSON).
    #[arg(long, value_name = "FILE")]
    pub metrics_config: Option<PathBuf>,

    /// Agent controller URLs, separated by any common delimiter.
    #[arg(long, group = "agents")]
    pub agent_urls: Option<String>,

    /// File with agent controller URLs, relative to the config directory.
    #[arg(long, group = "agents", value_name = "FILE")]
    pub agent_url_file: Option<PathBuf>,

    /// Run with the embedded agent controller.
    #[arg(long, group = "agents")]
    pub embedded: bool,

    /// Provision agent controllers in this cloud region.
    #[arg(long, group = "agents", value_name = "REGION")]
    pub cloud_region: Option<String>,

    /// Machine image for provisioned controllers.
    #[arg(long, requires = "cloud_region")]
    pub cloud_image: Option<String>,

    #[arg(long, default_value = "c5.xlarge")]
    pub cloud_instance_type: String,

    #[arg(long, default_value_t = 1)]
    pub cloud_count: u32,

    #[arg(long, default_value = "stampede")]
    pub cloud_tag: String,

    /// File with a user-data payload for provisioned instances.
    #[arg(long, value_name = "FILE")]
    pub cloud_user_data: Option<PathBuf>,

    /// Archive raw results into the builds area.
    #[arg(long)]
    pub archive_results: bool,

    /// Build a summary report over recent builds after the run.
    #[arg(long)]
    pub summary_report: bool,

    /// Build a trend report over recent builds after the run.
    #[arg(long)]
    pub trend_report: bool,

    /// Generate a diff report against this baseline build.
    #[arg(long, value_name = "BUILD")]
    pub diff_baseline: Option<u32>,

    /// Failed builds needed to flag a critical streak (0 disables).
    #[arg(long, default_value_t = 0)]
    pub critical_conditions: u32,

    /// Prior builds scanned for the critical streak.
    #[arg(long, default_value_t = 0)]
    pub critical_builds: u32,

    #[arg(long, default_value_t = 5)]
    pub summary_builds: u32,

    #[arg(long, default_value_t = 10)]
    pub trend_builds: u32,

    /// Initial response timeout forwarded to the controller, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl RunArgs {
    fn agent_controllers(&self) -> Result<AgentControllerConfig> {
        if let Some(urls) = &self.agent_urls {
            return Ok(AgentControllerConfig::UrlList { urls: urls.clone() });
        }
        if let Some(file) = &self.agent_url_file {
            return Ok(AgentControllerConfig::UrlFile { file: file.clone() });
        }
        if let Some(region) = &self.cloud_region {
            let image_id = self
                .cloud_image
                .clone()
                .ok_or_else(|| anyhow!("--cloud-image is required with --cloud-region"))?;
            let user_data = match &self.cloud_user_data {
                Some(path) => Some(std::fs::read_to_string(path).with_context(|| {
                    format!("reading user data from {}", path.display())
                })?),
                None => None,
            };
            let credentials = match (
                std::env::var("STAMPEDE_CLOUD_ACCESS_KEY"),
                std::env::var("STAMPEDE_CLOUD_SECRET_KEY"),
            ) {
                (Ok(access_key), Ok(secret_key)) => {
                    Some(CloudCredentials { access_key, secret_key })
                }
                _ => None,
            };
            return Ok(AgentControllerConfig::CloudProvisioned(CloudAgentConfig {
                region: region.clone(),
                image_id,
                instance_type: self.cloud_instance_type.clone(),
                instance_count: self.cloud_count,
                tag_name: self.cloud_tag.clone(),
                user_data,
                credentials,
            }));
        }
        Ok(AgentControllerConfig::Embedded)
    }
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let defaults = Arc::new(ConfigLoader::load()?);
    let _log_guard = logging::init(&defaults.logging)?;

    let metrics_json = match &args.metrics_config {
        Some(path) => std::fs::read_to_string(path).with_context(|| {
            format!("reading metrics configuration from {}", path.display())
        })?,
        None => String::new(),
    };

    let config = RunConfiguration {
        step_id: args.step.clone(),
        job_name: args.job.clone(),
        build_number: args.build,
        worker_template_dir: args.template_dir.clone(),
        agent_controllers: args.agent_controllers()?,
        metrics_json,
        critical: CriticalStreakConfig {
            condition_count: args.critical_conditions,
            build_count: args.critical_builds,
        },
        summary_builds: args.summary_builds,
        trend_builds: args.trend_builds,
        archive_results: args.archive_results,
        create_summary_report: args.summary_report,
        create_trend_report: args.trend_report,
        diff_baseline: args.diff_baseline,
        initial_response_timeout_secs: args
            .timeout
            .unwrap_or(defaults.initial_response_timeout_secs),
    };

    let executor: Arc<dyn ProcessExecutor> = Arc::new(TokioProcessExecutor::new());
    let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new());
    let query: Arc<dyn DocumentQuery> = Arc::new(JsonDocumentQuery::new());
    let history: Arc<dyn BuildHistory> =
        Arc::new(FsBuildHistory::new(defaults.builds_area.clone()));
    let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let orchestrator =
        Orchestrator::new(config, defaults, executor, files, query, history, sink);
    let outcome = orchestrator.run(&cancel).await;
    render_outcome(&outcome);

    match outcome.status {
        RunStatus::Failure => bail!("run failed"),
        RunStatus::Aborted => bail!("run aborted"),
        _ => Ok(()),
    }
}

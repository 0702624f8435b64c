//! Agent controller resolution.
//!
//! Resolves the remote execution endpoints for a run from one of the four
//! controller configuration variants, and tears cloud-provisioned
//! controllers down again after the run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::errors::{RunError, RunResult};
use crate::domain::models::{AgentControllerConfig, CloudAgentConfig};
use crate::domain::ports::{FileStore, OutputSink, ProcessExecutor};

/// Delimiters accepted between controller URLs in list form.
const URL_DELIMITERS: &[char] = &[' ', ',', ';', '|', '\t', '\r', '\n'];

/// Properties file the cloud admin tool reads its credentials from.
const CLOUD_PROPERTIES_FILE: &str = "cloud-admin.properties";

/// Outcome of endpoint resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAgents {
    /// The agent runs inside the controller process.
    Embedded,
    /// Ordered remote controller URLs.
    Controllers(Vec<String>),
}

pub struct AgentControllerResolver {
    executor: Arc<dyn ProcessExecutor>,
    files: Arc<dyn FileStore>,
    cloud_admin_cmd: String,
    config_dir: PathBuf,
    /// After cloud provisioning, the resolved list cached as an equivalent
    /// static list for later reference.
    provisioned: Mutex<Option<AgentControllerConfig>>,
}

impl AgentControllerResolver {
    pub fn new(
        executor: Arc<dyn ProcessExecutor>,
        files: Arc<dyn FileStore>,
        cloud_admin_cmd: impl Into<String>,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            files,
            cloud_admin_cmd: cloud_admin_cmd.into(),
            config_dir: config_dir.into(),
            provisioned: Mutex::new(None),
        }
    }

    /// Resolve the endpoint list for the given variant.
    pub async fn resolve(
        &self,
        config: &AgentControllerConfig,
        work_dir: &Path,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> RunResult<ResolvedAgents> {
        match config {
            AgentControllerConfig::Embedded => Ok(ResolvedAgents::Embedded),
            AgentControllerConfig::UrlList { urls } => {
                Ok(ResolvedAgents::Controllers(parse_url_list(urls)?))
            }
            AgentControllerConfig::UrlFile { file } => {
                // Read at run time, not configuration time: the file may
                // only exist after checkout.
                let path = self.config_dir.join(file);
                let text = self.files.read(&path).await.map_err(|e| {
                    RunError::Configuration(format!(
                        "agent controller file '{}' is not readable: {e}",
                        path.display()
                    ))
                })?;
                Ok(ResolvedAgents::Controllers(parse_url_list(&text)?))
            }
            AgentControllerConfig::CloudProvisioned(cloud) => {
                self.provision(cloud, work_dir, sink, cancel).await
            }
        }
    }

    /// Terminate cloud-provisioned controllers by region and tag. A no-op
    /// for every other variant.
    pub async fn teardown(
        &self,
        config: &AgentControllerConfig,
        work_dir: &Path,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> RunResult<()> {
        let AgentControllerConfig::CloudProvisioned(cloud) = config else {
            return Ok(());
        };

        sink.note(&format!(
            "terminating cloud agent controllers in {} tagged '{}'",
            cloud.region, cloud.tag_name
        ));
        let argv = vec![
            self.cloud_admin_cmd.clone(),
            "terminate".into(),
            cloud.region.clone(),
            "-t".into(),
            cloud.tag_name.clone(),
        ];
        let code = self.executor.execute(work_dir, &argv, sink, cancel).await?;
        if code != 0 {
            return Err(RunError::tool_failed(&self.cloud_admin_cmd, code));
        }
        info!(region = %cloud.region, tag = %cloud.tag_name, "cloud agent controllers terminated");
        Ok(())
    }

    /// The cloud resolution result as an equivalent static list, if a
    /// provisioning run happened.
    pub fn provisioned_as_static(&self) -> Option<AgentControllerConfig> {
        self.provisioned.lock().expect("provisioned cache lock").clone()
    }

    async fn provision(
        &self,
        cloud: &CloudAgentConfig,
        work_dir: &Path,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> RunResult<ResolvedAgents> {
        sink.note(&format!(
            "provisioning {} cloud agent controller(s) in {}",
            cloud.instance_count, cloud.region
        ));

        if let Some(credentials) = &cloud.credentials {
            let properties = self.config_dir.join(CLOUD_PROPERTIES_FILE);
            let mut text = if self.files.exists(&properties).await {
                self.files.read(&properties).await?
            } else {
                String::new()
            };
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("cloud.access_key = {}\n", credentials.access_key));
            text.push_str(&format!("cloud.secret_key = {}\n", credentials.secret_key));
            self.files.write(&properties, &text).await?;
            debug!(path = %properties.display(), "stored credentials appended for cloud admin tool");
        }

        let output_file = work_dir.join("agent-controllers.properties");
        let mut argv = vec![
            self.cloud_admin_cmd.clone(),
            "run".into(),
            cloud.region.clone(),
            cloud.image_id.clone(),
            cloud.instance_type.clone(),
            cloud.instance_count.to_string(),
            "-t".into(),
            cloud.tag_name.clone(),
        ];
        if let Some(user_data) = &cloud.user_data {
            let user_data_file = work_dir.join("user-data.txt");
            self.files.write(&user_data_file, user_data).await?;
            argv.push("-u".into());
            argv.push(user_data_file.display().to_string());
        }
        argv.push("-o".into());
        argv.push(output_file.display().to_string());

        let code = self.executor.execute(work_dir, &argv, sink, cancel).await?;
        if code != 0 {
            return Err(RunError::tool_failed(&self.cloud_admin_cmd, code));
        }

        let text = self.files.read(&output_file).await?;
        let urls = parse_properties_urls(&text);
        info!(count = urls.len(), region = %cloud.region, "cloud agent controllers provisioned");

        *self.provisioned.lock().expect("provisioned cache lock") =
            Some(AgentControllerConfig::UrlList { urls: urls.join(",") });
        Ok(ResolvedAgents::Controllers(urls))
    }
}

/// Split a URL list on any supported delimiter, dropping blank tokens.
pub(crate) fn split_url_list(text: &str) -> Vec<String> {
    text.split(URL_DELIMITERS)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_url_list(text: &str) -> RunResult<Vec<String>> {
    let urls = split_url_list(text);
    for url in &urls {
        validate_controller_url(url)?;
    }
    Ok(urls)
}

/// Controller URLs must look like `https://host[:port]`.
fn validate_controller_url(url: &str) -> RunResult<()> {
    let invalid = |reason: &str| {
        Err(RunError::Configuration(format!(
            "agent controller URL '{url}' is invalid: {reason}"
        )))
    };

    let Some(rest) = url.strip_prefix("https://") else {
        return invalid("must start with https://");
    };
    let (host, port) = match rest.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (rest, None),
    };
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return invalid("host must be alphanumeric, dots or dashes");
    }
    if let Some(port) = port {
        if port.is_empty() || port.parse::<u16>().is_err() {
            return invalid("port must be a number between 0 and 65535");
        }
    }
    Ok(())
}

/// Extract URLs from the cloud admin tool's properties output: the value
/// is the substring after the first `=` on each non-blank line, trimmed.
pub(crate) fn parse_properties_urls(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once('=').map(|(_, value)| value.trim()))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

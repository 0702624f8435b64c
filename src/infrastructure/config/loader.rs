use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::ToolchainDefaults;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Tool command for '{0}' cannot be blank")]
    BlankToolCommand(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid initial response timeout: {0}. Must be positive")]
    InvalidTimeout(u64),

    #[error("Result document name cannot be blank")]
    BlankResultDocument,
}

/// Loader for the process-wide toolchain defaults.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Bundled programmatic defaults (Serialized)
    /// 2. .stampede/config.yaml (project config)
    /// 3. Environment variables (STAMPEDE_* prefix, highest priority)
    pub fn load() -> Result<ToolchainDefaults> {
        let defaults: ToolchainDefaults = Figment::new()
            .merge(Serialized::defaults(ToolchainDefaults::default()))
            .merge(Yaml::file(".stampede/config.yaml"))
            .merge(Env::prefixed("STAMPEDE_").split("__"))
            .extract()
            .context("Failed to extract toolchain defaults from figment")?;

        Self::validate(&defaults)?;
        Ok(defaults)
    }

    /// Load defaults from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<ToolchainDefaults> {
        let defaults: ToolchainDefaults = Figment::new()
            .merge(Serialized::defaults(ToolchainDefaults::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load toolchain defaults from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&defaults)?;
        Ok(defaults)
    }

    /// Validate defaults after loading.
    pub fn validate(defaults: &ToolchainDefaults) -> Result<(), ConfigError> {
        for (name, cmd) in [
            ("controller", &defaults.controller_cmd),
            ("report", &defaults.report_cmd),
            ("trend-report", &defaults.trend_report_cmd),
            ("diff-report", &defaults.diff_report_cmd),
            ("criteria", &defaults.criteria_cmd),
            ("cloud-admin", &defaults.cloud_admin_cmd),
        ] {
            if cmd.trim().is_empty() {
                return Err(ConfigError::BlankToolCommand(name));
            }
        }

        if defaults.result_document.trim().is_empty() {
            return Err(ConfigError::BlankResultDocument);
        }

        if defaults.initial_response_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(defaults.initial_response_timeout_secs));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&defaults.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(defaults.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::LogSettings;

    #[test]
    fn bundled_defaults_are_valid() {
        let defaults = ToolchainDefaults::default();
        assert!(ConfigLoader::validate(&defaults).is_ok());
    }

    #[test]
    fn blank_tool_command_is_rejected() {
        let defaults = ToolchainDefaults { report_cmd: "  ".into(), ..ToolchainDefaults::default() };
        assert!(matches!(
            ConfigLoader::validate(&defaults),
            Err(ConfigError::BlankToolCommand("report"))
        ));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let defaults = ToolchainDefaults {
            logging: LogSettings { level: "chatty".into(), log_dir: None },
            ..ToolchainDefaults::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&defaults),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn yaml_overrides_bundled_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "controller_cmd: /opt/lt/bin/controller\n").unwrap();

        let defaults = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(defaults.controller_cmd, "/opt/lt/bin/controller");
        assert_eq!(defaults.result_document, "loadreport.json");
    }
}

//! Domain errors for the Stampede run pipeline.

use thiserror::Error;

/// Errors that can abort or degrade a load-test run.
///
/// Data unavailability (a missing result document) is deliberately not
/// represented here; it surfaces as an `Error` verdict in the run outcome
/// instead of an error value.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid run configuration: {0}")]
    Configuration(String),

    #[error("Execution resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("External tool '{tool}' exited with code {code}")]
    ExternalTool { tool: String, code: i32 },

    #[error("File operation failed: {0}")]
    Storage(String),

    #[error("Run aborted")]
    Aborted,
}

pub type RunResult<T> = Result<T, RunError>;

impl RunError {
    /// Build an `ExternalTool` error from a tool name and its exit code.
    pub fn tool_failed(tool: impl Into<String>, code: i32) -> Self {
        Self::ExternalTool { tool: tool.into(), code }
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        RunError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RunError {
    fn from(err: serde_json::Error) -> Self {
        RunError::Configuration(err.to_string())
    }
}

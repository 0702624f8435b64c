//! Process execution port.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::RunResult;

/// Which stream a subprocess line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

/// Receives the run narrative and streamed subprocess output.
///
/// Implementations must tolerate being called from multiple tasks; the
/// executor streams stdout and stderr concurrently.
pub trait OutputSink: Send + Sync {
    /// One line of pipeline narrative.
    fn note(&self, line: &str);

    /// One line of subprocess output.
    fn output(&self, origin: StreamOrigin, line: &str);
}

/// Executes external tools, streaming their output to a sink.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run `argv` in `working_dir` and wait for it to exit.
    ///
    /// Returns the exit code; a nonzero code is not an error at this level,
    /// callers decide whether it is fatal. Cancellation kills the child and
    /// yields `RunError::Aborted`.
    async fn execute(
        &self,
        working_dir: &Path,
        argv: &[String],
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> RunResult<i32>;
}

//! Process execution adapter.
//!
//! Runs external tools via `tokio::process`, streaming both output pipes
//! line by line to the caller's sink. Cancellation kills the child and
//! surfaces as an aborted run.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::errors::{RunError, RunResult};
use crate::domain::ports::{OutputSink, ProcessExecutor, StreamOrigin};

#[derive(Debug, Default)]
pub struct TokioProcessExecutor;

impl TokioProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessExecutor for TokioProcessExecutor {
    async fn execute(
        &self,
        working_dir: &Path,
        argv: &[String],
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> RunResult<i32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RunError::Configuration("empty command line".into()))?;
        debug!(%program, ?args, dir = %working_dir.display(), "spawning external tool");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RunError::ResourceUnavailable(format!("failed to spawn '{program}': {e}"))
            })?;

        let mut out_lines = child.stdout.take().map(|s| BufReader::new(s).lines());
        let mut err_lines = child.stderr.take().map(|s| BufReader::new(s).lines());

        let drain = async {
            let out = async {
                if let Some(lines) = out_lines.as_mut() {
                    while let Ok(Some(line)) = lines.next_line().await {
                        sink.output(StreamOrigin::Stdout, &line);
                    }
                }
            };
            let err = async {
                if let Some(lines) = err_lines.as_mut() {
                    while let Ok(Some(line)) = lines.next_line().await {
                        sink.output(StreamOrigin::Stderr, &line);
                    }
                }
            };
            tokio::join!(out, err);
        };
        tokio::pin!(drain);

        tokio::select! {
            () = &mut drain => {}
            () = cancel.cancelled() => {
                warn!(%program, "cancellation requested, terminating child process");
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(RunError::Aborted);
            }
        }

        // Pipes are closed; reap the child. Cancellation can still arrive
        // between pipe close and exit.
        tokio::select! {
            status = child.wait() => {
                let status = status?;
                Ok(status.code().unwrap_or(-1))
            }
            () = cancel.cancelled() => {
                warn!(%program, "cancellation requested, terminating child process");
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(RunError::Aborted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        lines: Mutex<Vec<(StreamOrigin, String)>>,
    }

    impl OutputSink for CollectingSink {
        fn note(&self, _line: &str) {}

        fn output(&self, origin: StreamOrigin, line: &str) {
            self.lines.lock().unwrap().push((origin, line.to_string()));
        }
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn streams_stdout_and_returns_exit_code() {
        let executor = TokioProcessExecutor::new();
        let sink = CollectingSink::default();
        let dir = tempfile::tempdir().unwrap();

        let code = executor
            .execute(
                dir.path(),
                &argv(&["sh", "-c", "echo one; echo two >&2"]),
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(code, 0);
        let lines = sink.lines.lock().unwrap();
        assert!(lines.contains(&(StreamOrigin::Stdout, "one".to_string())));
        assert!(lines.contains(&(StreamOrigin::Stderr, "two".to_string())));
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let executor = TokioProcessExecutor::new();
        let sink = CollectingSink::default();
        let dir = tempfile::tempdir().unwrap();

        let code = executor
            .execute(dir.path(), &argv(&["sh", "-c", "exit 3"]), &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn missing_program_is_resource_unavailable() {
        let executor = TokioProcessExecutor::new();
        let sink = CollectingSink::default();
        let dir = tempfile::tempdir().unwrap();

        let err = executor
            .execute(
                dir.path(),
                &argv(&["definitely-not-a-real-tool"]),
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::ResourceUnavailable(_)));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let executor = TokioProcessExecutor::new();
        let sink = CollectingSink::default();
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();

        let killer = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            killer.cancel();
        });

        let started = std::time::Instant::now();
        let err = executor
            .execute(dir.path(), &argv(&["sleep", "30"]), &sink, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Aborted));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}

//! Real worker spawner backed by `tokio::process`.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::types::{OutputLine, StageError, WorkerHandle, WorkerInvocation, WorkerSpawner};

/// Buffer for in-flight output lines per worker.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Spawns real worker processes with unbuffered output so progress
/// lines arrive as the worker produces them.
pub struct ProcessSpawner;

impl ProcessSpawner {
    pub fn new() -> Self {
        Self
    }

    fn forward_lines<R>(reader: R, tx: mpsc::Sender<OutputLine>, wrap: fn(String) -> OutputLine)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(wrap(line)).await.is_err() {
                    break;
                }
            }
        });
    }
}

impl Default for ProcessSpawner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    async fn spawn(&self, invocation: WorkerInvocation) -> Result<WorkerHandle, StageError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            // Python workers buffer stdout when not attached to a tty;
            // disable so classification sees lines in real time.
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| StageError::SpawnFailed {
            script: invocation.label.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take().expect("stdout should be captured");
        let stderr = child.stderr.take().expect("stderr should be captured");

        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let (exit_tx, exit_rx) = oneshot::channel();

        Self::forward_lines(stdout, line_tx.clone(), OutputLine::Stdout);
        Self::forward_lines(stderr, line_tx, OutputLine::Stderr);

        let label = invocation.label;
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!("Failed to wait for {}: {}", label, e);
                    -1
                }
            };
            let _ = exit_tx.send(code);
        });

        Ok(WorkerHandle {
            lines: line_rx,
            exit: exit_rx,
        })
    }
}

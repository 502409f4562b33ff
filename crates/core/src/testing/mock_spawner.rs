//! Mock worker spawner for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::runner::{OutputLine, StageError, WorkerHandle, WorkerInvocation, WorkerSpawner};

/// A canned worker: the output lines it produces and its exit code.
#[derive(Debug, Clone)]
pub struct ScriptedWorker {
    pub lines: Vec<OutputLine>,
    pub exit_code: i32,
}

impl ScriptedWorker {
    pub fn new(exit_code: i32) -> Self {
        Self {
            lines: Vec::new(),
            exit_code,
        }
    }

    pub fn stdout_line(mut self, line: &str) -> Self {
        self.lines.push(OutputLine::Stdout(line.to_string()));
        self
    }

    pub fn stdout_lines(mut self, lines: &[&str]) -> Self {
        for line in lines {
            self.lines.push(OutputLine::Stdout(line.to_string()));
        }
        self
    }

    pub fn stderr_line(mut self, line: &str) -> Self {
        self.lines.push(OutputLine::Stderr(line.to_string()));
        self
    }
}

/// Mock implementation of the [`WorkerSpawner`] trait.
///
/// Spawn calls consume scripted workers in FIFO order and record every
/// invocation for assertions. An unscripted spawn yields a silent
/// worker that exits 0.
#[derive(Clone, Default)]
pub struct MockWorkerSpawner {
    scripts: Arc<Mutex<VecDeque<Result<ScriptedWorker, String>>>>,
    invocations: Arc<Mutex<Vec<WorkerInvocation>>>,
}

impl MockWorkerSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next worker to hand out on spawn.
    pub async fn push_worker(&self, worker: ScriptedWorker) {
        self.scripts.lock().await.push_back(Ok(worker));
    }

    /// Queue a spawn failure for the next spawn call.
    pub async fn push_spawn_error(&self, reason: &str) {
        self.scripts.lock().await.push_back(Err(reason.to_string()));
    }

    /// All invocations seen so far, in spawn order.
    pub async fn recorded_invocations(&self) -> Vec<WorkerInvocation> {
        self.invocations.lock().await.clone()
    }

    pub async fn spawn_count(&self) -> usize {
        self.invocations.lock().await.len()
    }
}

#[async_trait]
impl WorkerSpawner for MockWorkerSpawner {
    async fn spawn(&self, invocation: WorkerInvocation) -> Result<WorkerHandle, StageError> {
        self.invocations.lock().await.push(invocation.clone());

        let scripted = self
            .scripts
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(ScriptedWorker::new(0)));

        let worker = match scripted {
            Ok(worker) => worker,
            Err(reason) => {
                return Err(StageError::SpawnFailed {
                    script: invocation.label,
                    reason,
                })
            }
        };

        let (line_tx, line_rx) = mpsc::channel(64);
        let (exit_tx, exit_rx) = oneshot::channel();

        tokio::spawn(async move {
            for line in worker.lines {
                if line_tx.send(line).await.is_err() {
                    break;
                }
            }
            drop(line_tx);
            let _ = exit_tx.send(worker.exit_code);
        });

        Ok(WorkerHandle {
            lines: line_rx,
            exit: exit_rx,
        })
    }
}

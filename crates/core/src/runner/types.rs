use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

/// Error type for worker execution.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The worker binary or script could not be launched.
    #[error("Failed to start {script}: {reason}")]
    SpawnFailed { script: String, reason: String },

    /// The worker exited non-zero with explicit error markers in its
    /// error stream.
    #[error("{script} exited with code {code}\nStderr: {stderr}")]
    WorkerFailed {
        script: String,
        code: i32,
        stderr: String,
    },

    /// The spawner dropped the exit channel before delivering a code.
    #[error("Worker exit status was never delivered")]
    ExitStatusLost,
}

/// A line of worker output, tagged by source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// One external worker launch request.
#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Short name used in log messages.
    pub label: String,
}

impl WorkerInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let label = program
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "worker".to_string());
        Self {
            program,
            args: Vec::new(),
            env: Vec::new(),
            label,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Override the log label, e.g. with the script name when the
    /// program is an interpreter.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Derive a label from a script path's file stem.
    pub fn label_from_script(self, script: &Path) -> Self {
        match script.file_stem() {
            Some(stem) => self.labeled(stem.to_string_lossy().to_string()),
            None => self,
        }
    }
}

/// Streaming handle for a spawned worker.
pub struct WorkerHandle {
    /// Combined stdout/stderr lines in arrival order. Closes when both
    /// streams reach EOF.
    pub lines: mpsc::Receiver<OutputLine>,
    /// Exit code, delivered once the process finishes.
    pub exit: oneshot::Receiver<i32>,
}

/// Capability interface for launching worker processes.
///
/// The stage runner and orchestrator only see this trait, so tests can
/// substitute a scripted implementation without spawning anything.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn spawn(&self, invocation: WorkerInvocation) -> Result<WorkerHandle, StageError>;
}

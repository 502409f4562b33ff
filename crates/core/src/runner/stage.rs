//! Per-stage worker execution with streamed progress classification.

use std::sync::Arc;

use crate::classifier::classify_line;
use crate::events::{EventEmitter, LogLevel};

use super::types::{OutputLine, StageError, WorkerInvocation, WorkerSpawner};

/// Accumulated text output of one finished stage.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Markers that make a stderr line (and a non-zero exit) a real error.
const ERROR_MARKERS: [&str; 2] = ["ERROR -", "CRITICAL -"];
const WARNING_MARKER: &str = "WARNING -";

fn has_error_marker(line: &str) -> bool {
    ERROR_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Runs one external worker per pipeline stage and turns its output
/// stream into progress and log events.
#[derive(Clone)]
pub struct StageRunner {
    spawner: Arc<dyn WorkerSpawner>,
}

impl StageRunner {
    pub fn new(spawner: Arc<dyn WorkerSpawner>) -> Self {
        Self { spawner }
    }

    /// Run the worker to completion, streaming its output.
    ///
    /// Progress is tracked against a per-invocation high-water mark: a
    /// classified percent at or below the mark is demoted to an info
    /// log event, so emitted progress never regresses within a stage.
    ///
    /// A non-zero exit code is a failure only when the accumulated
    /// stderr carries an explicit error marker; workers whose own
    /// logging shows no failure are trusted over their exit code.
    pub async fn run(
        &self,
        invocation: WorkerInvocation,
        emitter: &EventEmitter,
        stage: &str,
    ) -> Result<StageOutput, StageError> {
        let script = invocation.label.clone();
        emitter.emit_log(&format!("Starting {} script...", script), LogLevel::Info);

        let mut handle = match self.spawner.spawn(invocation).await {
            Ok(handle) => handle,
            Err(e) => {
                emitter.emit_log(&e.to_string(), LogLevel::Error);
                return Err(e);
            }
        };

        let mut output = StageOutput::default();
        let mut high_water: u8 = 0;

        while let Some(line) = handle.lines.recv().await {
            match line {
                OutputLine::Stdout(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    output.stdout.push_str(text);
                    output.stdout.push('\n');

                    self.classify_and_emit(text, stage, &mut high_water, emitter)
                        .await;
                }
                OutputLine::Stderr(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    output.stderr.push_str(text);
                    output.stderr.push('\n');

                    if has_error_marker(text) {
                        emitter.emit_log(text, LogLevel::Error);
                    } else if text.contains(WARNING_MARKER) {
                        emitter.emit_log(text, LogLevel::Warning);
                    } else {
                        // Some workers log informational text to
                        // stderr; treat it like stdout.
                        self.classify_and_emit(text, stage, &mut high_water, emitter)
                            .await;
                    }
                }
            }
        }

        let code = handle.exit.await.map_err(|_| StageError::ExitStatusLost)?;
        emitter.emit_log(
            &format!("{} script exited with code {}", script, code),
            if code == 0 {
                LogLevel::Info
            } else {
                LogLevel::Warning
            },
        );

        if code == 0 {
            return Ok(output);
        }

        if output.stderr.lines().any(has_error_marker) {
            Err(StageError::WorkerFailed {
                script,
                code,
                stderr: output.stderr,
            })
        } else {
            // Non-zero exit without explicit error markers is noise.
            Ok(output)
        }
    }

    async fn classify_and_emit(
        &self,
        line: &str,
        stage: &str,
        high_water: &mut u8,
        emitter: &EventEmitter,
    ) {
        let classification = classify_line(line, stage);
        match classification.percent {
            Some(percent) if percent > *high_water => {
                *high_water = percent;
                emitter
                    .emit_progress(percent, line, Some(&classification.stage))
                    .await;
            }
            _ => emitter.emit_log(line, LogLevel::Info),
        }
    }
}

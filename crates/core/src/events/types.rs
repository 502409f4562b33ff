use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::registry::Job;

/// Severity of a forwarded worker log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Output locations of one completed pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPaths {
    pub download_dir: PathBuf,
    pub output_dir: PathBuf,
    pub printpanels_output_dir: PathBuf,
    pub csv_path: PathBuf,
    /// Timestamp token naming this run's working directories.
    pub timestamp: String,
}

/// Response to a `getProcessStatus` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessStatus {
    /// Snapshot of the tracked job plus its elapsed time.
    Active {
        #[serde(flatten)]
        job: Job,
        /// Milliseconds since the job started.
        duration: i64,
    },
    /// No job is tracked for this subscriber.
    NotFound { status: String, message: String },
}

impl ProcessStatus {
    /// The `not_found` shape with the standard message.
    pub fn not_found() -> Self {
        Self::NotFound {
            status: "not_found".to_string(),
            message: "No active process found for this client".to_string(),
        }
    }
}

/// Event sent to a connected subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Pipeline progress moved forward.
    #[serde(rename_all = "camelCase")]
    ProgressUpdate {
        /// 0-100, monotonically non-decreasing within a job.
        percent: u8,
        message: String,
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
    },
    /// A worker output line that did not advance progress.
    #[serde(rename_all = "camelCase")]
    ProcessLog {
        message: String,
        #[serde(rename = "type")]
        level: LogLevel,
        timestamp: DateTime<Utc>,
    },
    /// Terminal event for a run. No further progress or log events are
    /// expected for the job after this fires.
    #[serde(rename_all = "camelCase")]
    ProcessComplete {
        success: bool,
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<RunPaths>,
    },
    /// Answer to a status inquiry.
    ProcessStatusResponse {
        #[serde(flatten)]
        status: ProcessStatus,
    },
}

impl ClientEvent {
    /// Short event name, used for metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::ProgressUpdate { .. } => "progress_update",
            ClientEvent::ProcessLog { .. } => "process_log",
            ClientEvent::ProcessComplete { .. } => "process_complete",
            ClientEvent::ProcessStatusResponse { .. } => "process_status_response",
        }
    }
}

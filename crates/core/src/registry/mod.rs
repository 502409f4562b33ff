//! In-memory per-subscriber job tracking.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::events::RunPaths;

/// Lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// Tracked state of one subscriber's pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub start_time: DateTime<Utc>,
    pub status: JobStatus,
    pub stage: String,
    /// 0-100, never decreases within a job's lifetime.
    pub progress: u8,
    pub last_message: String,
    pub last_update: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_data: Option<RunPaths>,
}

impl Job {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            status: JobStatus::Running,
            stage: "initialization".to_string(),
            progress: 0,
            last_message: "Process started".to_string(),
            last_update: now,
            end_time: None,
            error: None,
            result_data: None,
        }
    }
}

/// Process-wide map from subscriber identity to job state.
///
/// Constructed once at startup and handed by clone to the gateway and
/// the orchestrator; all clones share the same map. One entry exists
/// per live subscriber, created on an accepted start request and
/// removed on disconnect.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh running job for the subscriber, replacing any
    /// previous entry.
    pub async fn create(&self, client_id: &str) -> Job {
        let job = Job::new();
        self.jobs
            .write()
            .await
            .insert(client_id.to_string(), job.clone());
        job
    }

    pub async fn get(&self, client_id: &str) -> Option<Job> {
        self.jobs.read().await.get(client_id).cloned()
    }

    pub async fn remove(&self, client_id: &str) -> Option<Job> {
        self.jobs.write().await.remove(client_id)
    }

    /// Whether the subscriber currently has a job in the running state.
    pub async fn is_running(&self, client_id: &str) -> bool {
        matches!(
            self.jobs.read().await.get(client_id),
            Some(job) if job.status == JobStatus::Running
        )
    }

    pub async fn active_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Record a progress event. A percent below the job's current value
    /// is rejected; progress only moves forward.
    pub async fn update_progress(
        &self,
        client_id: &str,
        percent: u8,
        message: &str,
        stage: Option<&str>,
    ) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(client_id) {
            if percent < job.progress {
                return;
            }
            job.progress = percent;
            job.last_message = message.to_string();
            job.last_update = Utc::now();
            if let Some(stage) = stage {
                job.stage = stage.to_string();
            }
        }
    }

    /// Record the terminal outcome of a run.
    pub async fn complete(
        &self,
        client_id: &str,
        success: bool,
        error: Option<String>,
        result_data: Option<RunPaths>,
    ) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(client_id) {
            job.status = if success {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            };
            let now = Utc::now();
            job.end_time = Some(now);
            job.last_update = now;
            if let Some(error) = error {
                job.error = Some(error);
            }
            if let Some(data) = result_data {
                job.result_data = Some(data);
            }
        }
    }
}

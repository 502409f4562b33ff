use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::registry::JobRegistry;

use super::types::{ClientEvent, LogLevel, RunPaths};

/// Per-subscriber facade for progress, log, and completion events.
///
/// Each call sends the structured event to the subscriber's channel
/// when one is attached and mutates the subscriber's job record when
/// one exists. A detached emitter (no channel) still logs and updates
/// the registry, which supports headless and test invocation.
///
/// Cheaply cloneable; clones share the subscriber channel and registry.
#[derive(Clone)]
pub struct EventEmitter {
    client_id: String,
    subscriber: Option<mpsc::UnboundedSender<ClientEvent>>,
    registry: JobRegistry,
}

impl EventEmitter {
    pub fn new(
        client_id: impl Into<String>,
        subscriber: mpsc::UnboundedSender<ClientEvent>,
        registry: JobRegistry,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            subscriber: Some(subscriber),
            registry,
        }
    }

    /// Emitter with no attached subscriber.
    pub fn detached(client_id: impl Into<String>, registry: JobRegistry) -> Self {
        Self {
            client_id: client_id.into(),
            subscriber: None,
            registry,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn send(&self, event: ClientEvent) {
        if let Some(tx) = &self.subscriber {
            // A send error means the subscriber went away; the gateway
            // removes the job record on disconnect.
            let _ = tx.send(event);
        }
    }

    /// Emit a progress event and advance the job record.
    pub async fn emit_progress(&self, percent: u8, message: &str, stage: Option<&str>) {
        info!("Progress: {}% - {}", percent, message);

        self.send(ClientEvent::ProgressUpdate {
            percent,
            message: message.to_string(),
            timestamp: Utc::now(),
            stage: stage.map(str::to_string),
        });

        self.registry
            .update_progress(&self.client_id, percent, message, stage)
            .await;
    }

    /// Emit an informational, warning, or error log event.
    pub fn emit_log(&self, message: &str, level: LogLevel) {
        match level {
            LogLevel::Info => info!("[{}] {}", self.client_id, message),
            LogLevel::Warning => warn!("[{}] {}", self.client_id, message),
            LogLevel::Error => error!("[{}] {}", self.client_id, message),
        }

        self.send(ClientEvent::ProcessLog {
            message: message.to_string(),
            level,
            timestamp: Utc::now(),
        });
    }

    /// Emit the terminal completion event and close out the job record.
    pub async fn emit_complete(&self, success: bool, error: Option<&str>, data: Option<RunPaths>) {
        match &error {
            Some(error) => info!("Complete: success={}, error={}", success, error),
            None => info!("Complete: success={}", success),
        }

        self.send(ClientEvent::ProcessComplete {
            success,
            timestamp: Utc::now(),
            error: error.map(str::to_string),
            data: data.clone(),
        });

        self.registry
            .complete(&self.client_id, success, error.map(str::to_string), data)
            .await;
    }
}

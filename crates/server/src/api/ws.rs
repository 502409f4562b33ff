//! WebSocket gateway for pipeline control and event streaming.
//!
//! Each connection gets its own identity, its own event channel, and at
//! most one pipeline run at a time. Events flow one way, server to
//! client; the client sends control requests.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use printflow_core::{parse_records, ClientEvent, EventEmitter, LogLevel, ProcessStatus};

use crate::metrics::{
    PIPELINE_RUNS_COMPLETED, PIPELINE_RUNS_FAILED, PIPELINE_RUNS_STARTED, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_EVENTS_SENT,
};
use crate::state::AppState;

/// Control request received from a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientRequest {
    /// Start a pipeline run over the given raw input.
    #[serde(rename_all = "camelCase")]
    StartProcess { csv_data: Option<String> },
    /// Ask for the state of this client's tracked job.
    GetProcessStatus,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("Client connected: {}", client_id);

    // Per-connection event channel; everything the pipeline emits for
    // this client funnels through here and onto the socket.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ClientEvent>();

    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            WS_EVENTS_SENT.with_label_values(&[event.kind()]).inc();
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                }
            }
        }
    });

    let session = Session {
        client_id: client_id.clone(),
        state: Arc::clone(&state),
        events: event_tx,
    };

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                session.handle_text(&text).await;
            }
            Ok(Message::Close(_)) => {
                debug!("Client {} requested close", client_id);
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(_) => {
                // Ignore other message types
            }
            Err(e) => {
                warn!("WebSocket receive error for {}: {}", client_id, e);
                break;
            }
        }
    }

    // The job record dies with the connection. Workers already running
    // are left to finish on their own.
    state.registry().remove(&client_id).await;
    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("Client disconnected: {}", client_id);
}

/// Per-connection request handling.
struct Session {
    client_id: String,
    state: Arc<AppState>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Session {
    async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<ClientRequest>(text) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!(
                    "Unrecognized request from {}: {} ({})",
                    self.client_id, text, e
                );
            }
        }
    }

    async fn handle_request(&self, request: ClientRequest) {
        match request {
            ClientRequest::StartProcess { csv_data } => self.start_process(csv_data).await,
            ClientRequest::GetProcessStatus => self.process_status().await,
        }
    }

    fn emitter(&self) -> EventEmitter {
        EventEmitter::new(
            self.client_id.clone(),
            self.events.clone(),
            self.state.registry().clone(),
        )
    }

    async fn start_process(&self, csv_data: Option<String>) {
        let emitter = self.emitter();

        // One run per client at a time; the running job is untouched.
        // This guard comes first so a bad follow-up request cannot
        // close out the live job's record.
        if self.state.registry().is_running(&self.client_id).await {
            emitter.emit_log(
                "A process is already running for this client",
                LogLevel::Error,
            );
            return;
        }

        let csv_data = match csv_data {
            Some(csv_data) if !csv_data.trim().is_empty() => csv_data,
            _ => {
                emitter.emit_log("No CSV data provided", LogLevel::Error);
                emitter
                    .emit_complete(false, Some("No CSV data provided"), None)
                    .await;
                return;
            }
        };

        let records = parse_records(&csv_data);
        info!(
            "Received {} records from client {}",
            records.len(),
            self.client_id
        );

        self.state.registry().create(&self.client_id).await;
        PIPELINE_RUNS_STARTED.inc();

        let orchestrator = self.state.orchestrator();
        let client_id = self.client_id.clone();
        tokio::spawn(async move {
            match orchestrator.run(&csv_data, &emitter).await {
                Ok(paths) => {
                    PIPELINE_RUNS_COMPLETED.inc();
                    info!(
                        "Pipeline run for {} completed (timestamp {})",
                        client_id, paths.timestamp
                    );
                }
                Err(e) => {
                    PIPELINE_RUNS_FAILED.inc();
                    error!("Pipeline run for {} failed: {}", client_id, e);
                }
            }
        });
    }

    async fn process_status(&self) {
        let status = match self.state.registry().get(&self.client_id).await {
            Some(job) => {
                let duration = (Utc::now() - job.start_time).num_milliseconds();
                ProcessStatus::Active { job, duration }
            }
            None => ProcessStatus::not_found(),
        };

        // Ignore send errors - the client is already gone
        let _ = self
            .events
            .send(ClientEvent::ProcessStatusResponse { status });
    }
}

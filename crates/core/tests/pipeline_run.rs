//! Full pipeline run integration tests.
//!
//! These tests drive the orchestrator with a mock worker spawner and
//! verify:
//! - Stage sequencing and short-circuiting on failure
//! - The inter-stage product payload handoff
//! - Exactly one terminal completion event per run
//! - Job registry state after success and failure

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use printflow_core::{
    testing::{MockWorkerSpawner, ScriptedWorker},
    ClientEvent, EventEmitter, JobRegistry, JobStatus, LogLevel, PipelineConfig, PipelineError,
    PipelineOrchestrator,
};

const CSV: &str = "https://x/img.png,NAME,tag";

/// Test helper wiring the orchestrator to a mock spawner and a
/// captured event stream.
struct TestHarness {
    orchestrator: PipelineOrchestrator,
    spawner: MockWorkerSpawner,
    registry: JobRegistry,
    emitter: EventEmitter,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    _temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();
        let config = PipelineConfig {
            download_root: root.join("Download"),
            output_root: root.join("Output"),
            panels_root: root.join("printpanels"),
            ..PipelineConfig::default()
        };

        let spawner = MockWorkerSpawner::new();
        let registry = JobRegistry::new();
        registry.create("client-1").await;

        let (tx, events) = mpsc::unbounded_channel();
        let emitter = EventEmitter::new("client-1", tx, registry.clone());

        Self {
            orchestrator: PipelineOrchestrator::new(config, Arc::new(spawner.clone())),
            spawner,
            registry,
            emitter,
            events,
            _temp_dir: temp_dir,
        }
    }

    async fn run(&self) -> Result<printflow_core::RunPaths, PipelineError> {
        self.orchestrator.run(CSV, &self.emitter).await
    }

    fn drain_events(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

fn completions(events: &[ClientEvent]) -> Vec<(bool, Option<String>)> {
    events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::ProcessComplete { success, error, .. } => {
                Some((*success, error.clone()))
            }
            _ => None,
        })
        .collect()
}

fn progress_percents(events: &[ClientEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::ProgressUpdate { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

fn log_messages(events: &[ClientEvent], level: LogLevel) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::ProcessLog {
                message,
                level: event_level,
                ..
            } if *event_level == level => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_full_run_with_product_payload() {
    let mut harness = TestHarness::new().await;

    harness
        .spawner
        .push_worker(ScriptedWorker::new(0).stdout_lines(&[
            "Starting download of pattern files",
            "EDITOR_START",
            "EDITOR_COMPLETE",
            "UPLOAD_COMPLETE",
            "JSON_OUTPUT_START[{\"sku\": \"NAME\"}, {\"sku\": \"OTHER\"}]JSON_OUTPUT_END",
        ]))
        .await;
    harness
        .spawner
        .push_worker(
            ScriptedWorker::new(0)
                .stdout_line("PDF_WRAPPING_COMPLETE")
                .stdout_line("PDF_PANELS_COMPLETE"),
        )
        .await;
    harness
        .spawner
        .push_worker(ScriptedWorker::new(0).stdout_line("CATALOG_UPDATE_COMPLETE"))
        .await;

    let paths = harness.run().await.expect("run should succeed");
    let events = harness.drain_events();

    // All three workers ran, in order, via the configured interpreter.
    let invocations = harness.spawner.recorded_invocations().await;
    assert_eq!(invocations.len(), 3);
    assert_eq!(invocations[0].label, "images");
    assert_eq!(invocations[0].args[1], CSV);
    assert_eq!(invocations[1].label, "pdfs");
    assert_eq!(
        PathBuf::from(&invocations[1].args[1]),
        paths.csv_path,
        "PDF stage receives the persisted CSV path"
    );
    assert_eq!(invocations[2].label, "process_products");
    assert!(
        invocations[2].args[1].ends_with("processed_products.json"),
        "catalog stage receives the extracted payload path"
    );

    // The payload was persisted next to the CSV.
    let payload_path = paths
        .csv_path
        .parent()
        .unwrap()
        .join("processed_products.json");
    let products: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(payload_path).unwrap()).unwrap();
    assert_eq!(products.len(), 2);

    // Exactly one completion, successful, carrying the run's paths.
    assert_eq!(completions(&events), vec![(true, None)]);
    let data = events.iter().find_map(|event| match event {
        ClientEvent::ProcessComplete { data, .. } => data.clone(),
        _ => None,
    });
    assert_eq!(data, Some(paths.clone()));

    // Progress moved forward only and finished at 100.
    let percents = progress_percents(&events);
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!(percents.contains(&55), "EDITOR_COMPLETE maps to 55");

    // Registry reflects the terminal state.
    let job = harness.registry.get("client-1").await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.result_data, Some(paths));
    assert!(job.end_time.is_some());
}

#[tokio::test]
async fn test_missing_payload_skips_catalog_update() {
    let mut harness = TestHarness::new().await;

    // Image worker succeeds but never prints the payload markers.
    harness
        .spawner
        .push_worker(ScriptedWorker::new(0).stdout_line("UPLOAD_COMPLETE"))
        .await;
    harness
        .spawner
        .push_worker(ScriptedWorker::new(0).stdout_line("PDF_PANELS_COMPLETE"))
        .await;

    harness.run().await.expect("run should succeed");
    let events = harness.drain_events();

    assert_eq!(harness.spawner.spawn_count().await, 2);

    let warnings = log_messages(&events, LogLevel::Warning);
    assert!(warnings
        .iter()
        .any(|m| m.contains("Skipping catalog update")));

    assert_eq!(completions(&events), vec![(true, None)]);
}

#[tokio::test]
async fn test_malformed_payload_degrades_to_warning() {
    let mut harness = TestHarness::new().await;

    harness
        .spawner
        .push_worker(
            ScriptedWorker::new(0).stdout_line("JSON_OUTPUT_START{not json]JSON_OUTPUT_END"),
        )
        .await;
    harness.spawner.push_worker(ScriptedWorker::new(0)).await;

    harness.run().await.expect("run should succeed");
    let events = harness.drain_events();

    // Catalog stage never ran, but the run still succeeded.
    assert_eq!(harness.spawner.spawn_count().await, 2);
    let warnings = log_messages(&events, LogLevel::Warning);
    assert!(warnings
        .iter()
        .any(|m| m.contains("Failed to parse product list")));
    assert_eq!(completions(&events), vec![(true, None)]);
}

#[tokio::test]
async fn test_pdf_failure_short_circuits_catalog_update() {
    let mut harness = TestHarness::new().await;

    harness
        .spawner
        .push_worker(ScriptedWorker::new(0).stdout_lines(&[
            "UPLOAD_COMPLETE",
            "JSON_OUTPUT_START[{\"sku\": \"NAME\"}]JSON_OUTPUT_END",
        ]))
        .await;
    harness
        .spawner
        .push_worker(
            ScriptedWorker::new(1).stderr_line("ERROR - vector editor not responding"),
        )
        .await;

    let err = harness.run().await.expect_err("run should fail");
    assert!(matches!(err, PipelineError::PdfGeneration(_)));

    let events = harness.drain_events();

    // The catalog worker never spawned even though a payload existed.
    assert_eq!(harness.spawner.spawn_count().await, 2);

    let completions = completions(&events);
    assert_eq!(completions.len(), 1, "exactly one terminal event");
    let (success, error) = &completions[0];
    assert!(!success);
    let error = error.as_deref().unwrap();
    assert!(error.starts_with("PDF generation failed"));
    assert!(error.contains("vector editor not responding"));

    let job = harness.registry.get("client-1").await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("PDF generation failed"));
    assert!(job.result_data.is_none());
}

#[tokio::test]
async fn test_image_failure_stops_everything() {
    let mut harness = TestHarness::new().await;

    harness
        .spawner
        .push_worker(
            ScriptedWorker::new(1)
                .stdout_line("Starting download of pattern files")
                .stderr_line("ERROR - source image 404"),
        )
        .await;

    let err = harness.run().await.expect_err("run should fail");
    assert!(matches!(err, PipelineError::ImageProcessing(_)));

    let events = harness.drain_events();
    assert_eq!(harness.spawner.spawn_count().await, 1);

    let completions = completions(&events);
    assert_eq!(completions.len(), 1);
    assert!(!completions[0].0);
    assert!(completions[0]
        .1
        .as_deref()
        .unwrap()
        .starts_with("Image processing failed"));
}

#[tokio::test]
async fn test_nonzero_exit_without_error_marker_is_tolerated() {
    let mut harness = TestHarness::new().await;

    // The image worker exits 1 but its stderr shows no real failure.
    harness
        .spawner
        .push_worker(
            ScriptedWorker::new(1)
                .stdout_line("UPLOAD_COMPLETE")
                .stderr_line("WARNING - flaky network, retried"),
        )
        .await;
    harness.spawner.push_worker(ScriptedWorker::new(0)).await;

    harness.run().await.expect("exit code should be tolerated");
    let events = harness.drain_events();
    assert_eq!(completions(&events), vec![(true, None)]);
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let mut harness = TestHarness::new().await;
    harness.spawner.push_spawn_error("permission denied").await;

    let err = harness.run().await.expect_err("run should fail");
    assert!(matches!(err, PipelineError::ImageProcessing(_)));

    let events = harness.drain_events();
    let completions = completions(&events);
    assert_eq!(completions.len(), 1);
    assert!(completions[0]
        .1
        .as_deref()
        .unwrap()
        .contains("permission denied"));
}

#[tokio::test]
async fn test_detached_run_without_subscriber() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();
    let config = PipelineConfig {
        download_root: root.join("Download"),
        output_root: root.join("Output"),
        panels_root: root.join("printpanels"),
        ..PipelineConfig::default()
    };

    let spawner = MockWorkerSpawner::new();
    let registry = JobRegistry::new();
    registry.create("headless").await;

    let orchestrator = PipelineOrchestrator::new(config, Arc::new(spawner));
    let emitter = EventEmitter::detached("headless", registry.clone());

    // No subscriber channel; the run still completes and the registry
    // still tracks it.
    orchestrator
        .run(CSV, &emitter)
        .await
        .expect("detached run should succeed");

    let job = registry.get("headless").await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
}

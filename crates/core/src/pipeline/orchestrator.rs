//! The pipeline orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::events::{EventEmitter, LogLevel, RunPaths};
use crate::runner::{StageError, StageRunner, WorkerInvocation, WorkerSpawner};

use super::config::PipelineConfig;

/// Start/end markers framing the product JSON embedded in the image
/// worker's stdout.
const JSON_START_TAG: &str = "JSON_OUTPUT_START";
const JSON_END_TAG: &str = "JSON_OUTPUT_END";

/// Name of the persisted raw input inside the run's csv directory.
const CSV_FILE_NAME: &str = "meta_file_list.csv";

/// Name of the persisted inter-stage product payload.
const PRODUCT_LIST_FILE_NAME: &str = "processed_products.json";

/// Error type for pipeline runs. The message of each variant is the
/// exact text carried by the failure completion event, prefixed by the
/// stage that broke.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Processing workflow failed: {0}")]
    Setup(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(#[source] StageError),

    #[error("PDF generation failed: {0}")]
    PdfGeneration(#[source] StageError),

    #[error("Catalog update failed: {0}")]
    CatalogUpdate(#[source] StageError),
}

/// Working-directory set for one run, all named by the run timestamp.
struct RunWorkspace {
    download_dir: PathBuf,
    output_dir: PathBuf,
    panels_output_dir: PathBuf,
    csv_dir: PathBuf,
    csv_path: PathBuf,
    timestamp: String,
}

impl RunWorkspace {
    fn run_paths(&self) -> RunPaths {
        RunPaths {
            download_dir: self.download_dir.clone(),
            output_dir: self.output_dir.clone(),
            printpanels_output_dir: self.panels_output_dir.clone(),
            csv_path: self.csv_path.clone(),
            timestamp: self.timestamp.clone(),
        }
    }
}

/// Sequences the pipeline stages for one subscriber.
///
/// Stages run strictly one after another; a failing stage short-circuits
/// everything after it. Exactly one `processComplete` event is emitted
/// per run, by this orchestrator, whatever the outcome.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    runner: StageRunner,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, spawner: Arc<dyn WorkerSpawner>) -> Self {
        Self {
            config,
            runner: StageRunner::new(spawner),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline over the given raw input.
    ///
    /// On failure the returned error's message matches the `error`
    /// field of the failure completion event already sent.
    pub async fn run(
        &self,
        csv_data: &str,
        emitter: &EventEmitter,
    ) -> Result<RunPaths, PipelineError> {
        emitter
            .emit_progress(0, "Initializing processing workflow...", Some("initialization"))
            .await;
        emitter.emit_log("Starting pipeline run", LogLevel::Info);

        emitter
            .emit_progress(5, "Creating output directories...", Some("initialization"))
            .await;

        let workspace = match self.prepare_workspace(csv_data).await {
            Ok(workspace) => workspace,
            Err(reason) => {
                return Err(self.fail(emitter, PipelineError::Setup(reason)).await);
            }
        };

        // Stage 1: image processing. The raw input is handed to the
        // worker directly, as well as persisted for the PDF stage.
        emitter
            .emit_progress(10, "Starting image processing script...", Some("image_processing"))
            .await;

        let image_invocation =
            self.worker_invocation(&self.config.image_script, &[csv_data.to_string()]);
        let image_output = match self
            .runner
            .run(image_invocation, emitter, "image_processing")
            .await
        {
            Ok(output) => output,
            Err(e) => {
                return Err(self.fail(emitter, PipelineError::ImageProcessing(e)).await);
            }
        };
        emitter.emit_log(
            "Image processing script completed successfully",
            LogLevel::Info,
        );

        emitter
            .emit_progress(67, "Processing output data...", Some("data_processing"))
            .await;
        let product_list_path = self
            .extract_product_list(&image_output.stdout, &workspace, emitter)
            .await;

        // Stage 2: PDF generation against the persisted CSV.
        emitter
            .emit_progress(70, "Starting PDF generation...", Some("pdf_generation"))
            .await;

        let pdf_invocation = self.worker_invocation(
            &self.config.pdf_script,
            &[workspace.csv_path.display().to_string()],
        );
        if let Err(e) = self
            .runner
            .run(pdf_invocation, emitter, "pdf_generation")
            .await
        {
            return Err(self.fail(emitter, PipelineError::PdfGeneration(e)).await);
        }
        emitter.emit_log("PDF generation completed successfully", LogLevel::Info);

        // Stage 3: catalog update, only when stage 1 produced a payload.
        // A missing payload degrades to a warning, not a failure.
        match product_list_path {
            Some(product_list_path) => {
                emitter
                    .emit_progress(95, "Starting catalog updates...", Some("catalog_update"))
                    .await;

                let catalog_invocation = self.worker_invocation(
                    &self.config.catalog_script,
                    &[product_list_path.display().to_string()],
                );
                if let Err(e) = self
                    .runner
                    .run(catalog_invocation, emitter, "catalog_update")
                    .await
                {
                    return Err(self.fail(emitter, PipelineError::CatalogUpdate(e)).await);
                }
                emitter.emit_log(
                    "Catalog update script completed successfully",
                    LogLevel::Info,
                );
            }
            None => {
                emitter.emit_log(
                    "Skipping catalog update - no product data available",
                    LogLevel::Warning,
                );
            }
        }

        emitter
            .emit_progress(100, "All processing completed successfully!", Some("completed"))
            .await;

        let paths = workspace.run_paths();
        emitter.emit_complete(true, None, Some(paths.clone())).await;
        Ok(paths)
    }

    /// Emit the single failure completion for this run and hand the
    /// error back for the caller's bookkeeping.
    async fn fail(&self, emitter: &EventEmitter, error: PipelineError) -> PipelineError {
        let message = error.to_string();
        emitter.emit_log(&message, LogLevel::Error);
        emitter.emit_complete(false, Some(&message), None).await;
        error
    }

    /// Create the timestamp-named directory set and persist the raw
    /// input. Creating an already-existing directory is not an error.
    async fn prepare_workspace(&self, csv_data: &str) -> Result<RunWorkspace, String> {
        let timestamp = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");

        let workspace = RunWorkspace {
            download_dir: self.config.download_root.join(&timestamp),
            output_dir: self.config.output_root.join(&timestamp),
            panels_output_dir: self.config.panels_root.join("output").join(&timestamp),
            csv_dir: self.config.panels_root.join("csv"),
            csv_path: self.config.panels_root.join("csv").join(CSV_FILE_NAME),
            timestamp,
        };

        for dir in [
            &workspace.download_dir,
            &workspace.output_dir,
            &workspace.panels_output_dir,
            &workspace.csv_dir,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;
        }

        tokio::fs::write(&workspace.csv_path, csv_data)
            .await
            .map_err(|e| {
                format!(
                    "Failed to write CSV to {}: {}",
                    workspace.csv_path.display(),
                    e
                )
            })?;

        Ok(workspace)
    }

    /// Pull the marker-framed product JSON out of the image worker's
    /// stdout and persist it for the catalog stage.
    ///
    /// Returns `None` — after a warning log — when the markers are
    /// absent, the JSON is malformed, or the file cannot be written.
    async fn extract_product_list(
        &self,
        stdout: &str,
        workspace: &RunWorkspace,
        emitter: &EventEmitter,
    ) -> Option<PathBuf> {
        let (start, end) = match (stdout.find(JSON_START_TAG), stdout.find(JSON_END_TAG)) {
            (Some(start), Some(end)) if end > start => (start, end),
            _ => {
                emitter.emit_log(
                    "Could not locate processed product JSON in image worker output",
                    LogLevel::Warning,
                );
                return None;
            }
        };

        let json = stdout[start + JSON_START_TAG.len()..end].trim();
        let products: Vec<serde_json::Value> = match serde_json::from_str(json) {
            Ok(products) => products,
            Err(e) => {
                emitter.emit_log(
                    &format!("Failed to parse product list: {}", e),
                    LogLevel::Warning,
                );
                return None;
            }
        };

        let path = workspace.csv_dir.join(PRODUCT_LIST_FILE_NAME);
        let pretty = match serde_json::to_string_pretty(&products) {
            Ok(pretty) => pretty,
            Err(e) => {
                emitter.emit_log(
                    &format!("Failed to serialize product list: {}", e),
                    LogLevel::Warning,
                );
                return None;
            }
        };

        if let Err(e) = tokio::fs::write(&path, pretty).await {
            emitter.emit_log(
                &format!("Failed to save product list to {}: {}", path.display(), e),
                LogLevel::Warning,
            );
            return None;
        }

        emitter.emit_log(
            &format!("Saved processed product list ({} products)", products.len()),
            LogLevel::Info,
        );
        debug!("Product list persisted to {}", path.display());
        Some(path)
    }

    /// Build the interpreter invocation for one worker script, with
    /// credential passthrough from the server's own environment.
    fn worker_invocation(&self, script: &Path, args: &[String]) -> WorkerInvocation {
        let mut invocation = WorkerInvocation::new(&self.config.interpreter)
            .arg(script.display().to_string())
            .label_from_script(script);

        for arg in args {
            invocation = invocation.arg(arg.clone());
        }

        for name in &self.config.env_passthrough {
            if let Ok(value) = std::env::var(name) {
                invocation = invocation.env(name.clone(), value);
            }
        }

        invocation
    }
}

use std::sync::Arc;

use printflow_core::{Config, JobRegistry, PipelineOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    registry: JobRegistry,
    orchestrator: Arc<PipelineOrchestrator>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: JobRegistry,
        orchestrator: Arc<PipelineOrchestrator>,
    ) -> Self {
        Self {
            config,
            registry,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn orchestrator(&self) -> Arc<PipelineOrchestrator> {
        Arc::clone(&self.orchestrator)
    }
}

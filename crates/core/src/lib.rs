pub mod classifier;
pub mod config;
pub mod events;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod testing;

pub use classifier::{classify_line, Classification};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ServerConfig,
};
pub use events::{ClientEvent, EventEmitter, LogLevel, ProcessStatus, RunPaths};
pub use pipeline::{parse_records, InputRecord, PipelineConfig, PipelineError, PipelineOrchestrator};
pub use registry::{Job, JobRegistry, JobStatus};
pub use runner::{
    OutputLine, ProcessSpawner, StageError, StageOutput, StageRunner, WorkerHandle,
    WorkerInvocation, WorkerSpawner,
};

//! Testing utilities and mock implementations.
//!
//! Provides a scripted [`MockWorkerSpawner`] so the stage runner and
//! the pipeline orchestrator can be exercised end to end without
//! spawning real worker processes.
//!
//! # Example
//!
//! ```rust,ignore
//! use printflow_core::testing::{MockWorkerSpawner, ScriptedWorker};
//!
//! let spawner = MockWorkerSpawner::new();
//! spawner
//!     .push_worker(ScriptedWorker::new(0).stdout_line("EDITOR_COMPLETE"))
//!     .await;
//!
//! // Each spawn consumes the next scripted worker in order.
//! ```

mod mock_spawner;

pub use mock_spawner::{MockWorkerSpawner, ScriptedWorker};

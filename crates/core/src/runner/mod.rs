//! External worker process execution.
//!
//! One worker process backs each pipeline stage. Workers communicate
//! solely through their exit code and stdout/stderr text; the
//! [`StageRunner`] streams that output through the log classifier and
//! emits progress and log events as lines arrive.

mod process;
mod stage;
mod types;

pub use process::ProcessSpawner;
pub use stage::{StageOutput, StageRunner};
pub use types::{OutputLine, StageError, WorkerHandle, WorkerInvocation, WorkerSpawner};

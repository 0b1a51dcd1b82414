//! clarity_pipeline — orchestration layer: the runner boundary process
//! harness, the sweep orchestrator, the counterfactual orchestrator, and
//! rich-generation metrics plumbing.
//!
//! Every blocking operation in this crate (subprocess wait, filesystem
//! I/O, cache lock polling) is bounded; nothing here spawns a thread or
//! depends on an async runtime (spec §5).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("runner timed out after {timeout:?}")]
    RunnerTimeout { timeout: std::time::Duration, stdout: String, stderr: String },
    #[error("runner invocation failed: exit={exit:?} stdout={stdout} stderr={stderr}")]
    InvocationFailed { exit: Option<i32>, stdout: String, stderr: String },
    #[error("output directory already exists: {0}")]
    OutputCollision(String),
    #[error("artifact absent: {0}")]
    ArtifactAbsent(String),
    #[error(transparent)]
    Io(#[from] clarity_io::IoError),
    #[error(transparent)]
    Algo(#[from] clarity_algo::AlgoError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    StdIo(#[from] std::io::Error),
    #[error("orchestrator error: {0}")]
    Orchestrator(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

pub mod counterfactual;
pub mod rich;
pub mod runner;
pub mod sweep;

pub mod prelude {
    pub use crate::counterfactual::*;
    pub use crate::rich::*;
    pub use crate::runner::*;
    pub use crate::sweep::*;
    pub use crate::{PipelineError, PipelineResult};
}

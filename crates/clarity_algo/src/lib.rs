//! clarity_algo — pure computation layer: metrics, surfaces, gradients,
//! counterfactual masking, and evidence overlay extraction.
//!
//! This crate has no filesystem or process dependencies; it depends only
//! on `clarity_core` for rounding/encoding primitives. Every function here
//! is a pure function of its inputs, which is what makes the testable
//! properties in spec §8 checkable without any I/O harness.

#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlgoError {
    #[error("metric computation error: {0}")]
    Metric(String),
    #[error("surface computation error: {0}")]
    Surface(String),
    #[error("gradient computation error: {0}")]
    Gradient(String),
    #[error("counterfactual computation error: {0}")]
    Counterfactual(String),
    #[error("evidence overlay error: {0}")]
    Evidence(String),
}

pub type AlgoResult<T> = Result<T, AlgoError>;

pub mod counterfactual;
pub mod evidence;
pub mod gradient;
pub mod metrics;
pub mod surface;

pub mod prelude {
    pub use crate::counterfactual::*;
    pub use crate::evidence::*;
    pub use crate::gradient::*;
    pub use crate::metrics::*;
    pub use crate::surface::*;
    pub use crate::{AlgoError, AlgoResult};
}

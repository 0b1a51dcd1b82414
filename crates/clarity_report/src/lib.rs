//! clarity_report — the report model, PNG rasterizer, and PDF renderer for
//! CLARITY evaluation reports (spec §4.12).
//!
//! Everything here is pure and offline: callers supply already-computed
//! metrics/surfaces/overlays/probes in memory, and every renderer is a
//! deterministic function of its input — same input, byte-identical
//! output.

#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("inconsistent report data: {0}")]
    Inconsistent(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error(transparent)]
    Io(#[from] clarity_io::IoError),
    #[error(transparent)]
    Algo(#[from] clarity_algo::AlgoError),
}

pub type ReportResult<T> = Result<T, ReportError>;

pub mod model;
pub mod pdf;
pub mod png;

pub mod prelude {
    pub use crate::model::*;
    pub use crate::pdf::render_pdf;
    pub use crate::png::{render_heatmap_png, render_probe_grid_png, render_surface_png};
    pub use crate::{ReportError, ReportResult};
}

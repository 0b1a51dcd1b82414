//! Command-line surface (spec §4.15, §6): four subcommands wired straight
//! onto the pipeline/report crates, each one a thin adapter between clap
//! and a JSON-shaped request file — no business logic lives here.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("malformed json in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Pipeline(#[from] clarity_pipeline::PipelineError),
    #[error(transparent)]
    Report(#[from] clarity_report::ReportError),
    #[error(transparent)]
    Algo(#[from] clarity_algo::AlgoError),
    #[error(transparent)]
    Io(#[from] clarity_io::IoError),
}

pub fn read_json_file(path: &PathBuf) -> Result<serde_json::Value, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Read { path: path.clone(), source })?;
    serde_json::from_slice(&bytes).map_err(|source| CliError::Json { path: path.clone(), source })
}

pub fn write_bytes_atomically(path: &PathBuf, bytes: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CliError::Write { path: path.clone(), source })?;
    }
    let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
    std::fs::write(&tmp, bytes).map_err(|source| CliError::Write { path: tmp.clone(), source })?;
    std::fs::rename(&tmp, path).map_err(|source| CliError::Write { path: path.clone(), source })
}

#[derive(Debug, Parser)]
#[command(name = "clarity", about = "Deterministic evaluation pipeline for clinical-AI adapters")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a cartesian-product sweep over declared axes and seeds.
    Sweep(SweepArgs),
    /// Run the counterfactual probe orchestrator against one baseline.
    Probe(ProbeArgs),
    /// Render a report's PNG/PDF artifacts from a precomputed report descriptor.
    Report(ReportArgs),
    /// Compute a report descriptor from a completed sweep's manifest and trace packs.
    BuildReport(BuildReportArgs),
    /// Inspect or clear the content-addressed cache.
    Cache(CacheArgs),
}

#[derive(Debug, Parser)]
pub struct SweepArgs {
    /// Path to a JSON sweep config: {"axes":{...},"seeds":[...],"command":"...","adapter_id":"...","timeout_secs":60}
    #[arg(long)]
    pub config: PathBuf,
    /// Directory sweep cell outputs and sweep_manifest.json are written to.
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Debug, Parser)]
pub struct ProbeArgs {
    /// Directory containing the baseline fixture registry.json.
    #[arg(long)]
    pub fixtures: PathBuf,
    /// Registered baseline id to probe.
    #[arg(long)]
    pub baseline_id: String,
    /// Grid size for the counterfactual masking sweep.
    #[arg(long, default_value_t = 3)]
    pub grid_size: usize,
    /// Sweep axis this probe run is associated with.
    #[arg(long)]
    pub axis: String,
    /// Axis value this probe run is associated with.
    #[arg(long)]
    pub value: f64,
    /// Where to write the resulting probe/overlay JSON.
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Debug, Parser)]
pub struct ReportArgs {
    /// Path to a JSON-serialized `ClarityReport` (spec §4.12 model).
    #[arg(long)]
    pub report: PathBuf,
    /// Path to a JSON row-major evidence heatmap (`Vec<Vec<f64>>`) for the PDF overlay page.
    #[arg(long)]
    pub heatmap: PathBuf,
    /// Directory PNG/PDF artifacts are written to.
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Debug, Parser)]
pub struct BuildReportArgs {
    /// Directory containing sweep_manifest.json and the per-cell run directories.
    #[arg(long)]
    pub sweep_dir: PathBuf,
    /// Optional JSON file written by the `probe` subcommand, merged in as the
    /// report's overlay/probe sections. Omit to leave them empty.
    #[arg(long)]
    pub probe: Option<PathBuf>,
    /// Case identifier for the report cover page.
    #[arg(long)]
    pub case_id: String,
    /// Report title.
    #[arg(long)]
    pub title: String,
    /// Adapter id under evaluation.
    #[arg(long)]
    pub adapter_id: String,
    /// Git SHA of the reasoning-to-language adapter revision being evaluated.
    #[arg(long)]
    pub r2l_sha: String,
    /// RFC 3339 timestamp recorded in the report metadata.
    #[arg(long)]
    pub generated_at: String,
    /// Where to write the resulting `ClarityReport` JSON. A sibling
    /// `gradients.json` is written alongside it.
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Debug, Parser)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Report whether an entry for `key` exists in the cache.
    Inspect {
        #[arg(long)]
        cache_dir: PathBuf,
        #[arg(long)]
        key: String,
        #[arg(long, default_value = ".json")]
        ext: String,
    },
    /// Remove every cache entry and lock file.
    Clear {
        #[arg(long)]
        cache_dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }
}

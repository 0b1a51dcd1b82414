//! Sweep orchestrator (spec §4.5): drives a cartesian-product sweep over
//! declared axes and seeds through the runner boundary, writing one
//! output directory per cell and a top-level `sweep_manifest.json`.
//!
//! Iteration order: axes sorted alphabetically (outer loop), axis values
//! in declared order, seeds in declared order (inner loop) — axis
//! combinations form the outer loop, seeds the inner loop.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value;

use clarity_algo::metrics::RunObservation;
use clarity_core::{encode_axis_value, format_axis_number, validate_axis_name};
use clarity_io::hasher::sha256_file;
use clarity_io::loader::{extract_answer, extract_justification, load_trace_pack};
use clarity_io::manifest::{load_sweep_manifest, SweepManifestFile, SweepRunRecord};

use crate::runner::{Runner, RunnerInvocation};
use crate::{PipelineError, PipelineResult};

/// A declared sweep axis and its ordered list of values.
#[derive(Debug, Clone)]
pub struct SweepAxis {
    pub name: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub axes: Vec<SweepAxis>,
    pub seeds: Vec<i64>,
    pub command: String,
    pub adapter_id: Option<String>,
    pub output_root: PathBuf,
    pub timeout: std::time::Duration,
}

/// Explicit state machine for one sweep cell's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Pending,
    Spawned,
    ArtifactsVerified,
    Hashed,
    Recorded,
}

fn validate_config(config: &SweepConfig) -> PipelineResult<()> {
    if config.axes.is_empty() {
        return Err(PipelineError::InvalidInput("sweep requires at least one axis".into()));
    }
    if config.seeds.is_empty() {
        return Err(PipelineError::InvalidInput("sweep requires at least one seed".into()));
    }
    let mut seen_names = std::collections::BTreeSet::new();
    for axis in &config.axes {
        validate_axis_name(&axis.name)
            .map_err(|e| PipelineError::InvalidInput(format!("{e}")))?;
        if !seen_names.insert(axis.name.clone()) {
            return Err(PipelineError::InvalidInput(format!("duplicate axis name: {}", axis.name)));
        }
        if axis.values.is_empty() {
            return Err(PipelineError::InvalidInput(format!("axis {} has no values", axis.name)));
        }
    }
    Ok(())
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                format_axis_number(f)
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the deterministic run directory name for one cell: axes sorted
/// alphabetically, each rendered `<axis>=<encoded value>`, joined by `_`,
/// with a trailing `_seed=<seed>`.
pub fn build_run_directory_name(axis_values: &BTreeMap<String, Value>, seed: i64) -> String {
    let mut parts: Vec<String> = axis_values
        .iter()
        .map(|(name, v)| format!("{name}={}", encode_axis_value(&value_to_string(v))))
        .collect();
    parts.sort();
    parts.push(format!("seed={seed}"));
    parts.join("_")
}

/// Cartesian product of axis combinations, axes sorted alphabetically,
/// values in declared order.
fn axis_combinations(axes: &[SweepAxis]) -> Vec<BTreeMap<String, Value>> {
    let mut sorted_axes = axes.to_vec();
    sorted_axes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut combos: Vec<BTreeMap<String, Value>> = vec![BTreeMap::new()];
    for axis in &sorted_axes {
        let mut next = Vec::with_capacity(combos.len() * axis.values.len());
        for combo in &combos {
            for value in &axis.values {
                let mut c = combo.clone();
                c.insert(axis.name.clone(), value.clone());
                next.push(c);
            }
        }
        combos = next;
    }
    combos
}

/// Execute the sweep: for every axis-value combination (outer) and every
/// seed (inner), invoke the runner into a freshly created, non-overwriting
/// output directory, then append a `SweepRunRecord` to the manifest. The
/// manifest is written once, atomically, at the end.
pub fn execute_sweep<R: Runner>(config: &SweepConfig, runner: &R) -> PipelineResult<SweepManifestFile> {
    validate_config(config)?;
    fs::create_dir_all(&config.output_root)?;

    let mut runs = Vec::new();
    for axis_values in axis_combinations(&config.axes) {
        for &seed in &config.seeds {
            let mut state = CellState::Pending;
            let dirname = build_run_directory_name(&axis_values, seed);
            let cell_dir = config.output_root.join(&dirname);
            if cell_dir.exists() {
                return Err(PipelineError::OutputCollision(cell_dir.display().to_string()));
            }
            fs::create_dir_all(&cell_dir)?;

            let spec_value = serde_json::json!({
                "axis_values": axis_values,
                "seed": seed,
            });
            let spec_path = cell_dir.join("spec.json");
            fs::write(&spec_path, serde_json::to_vec_pretty(&spec_value)?)?;

            state = CellState::Spawned;
            debug!("sweep cell {dirname}: {state:?}");
            runner.run(&RunnerInvocation {
                command: config.command.clone(),
                config_path: spec_path.clone(),
                output_dir: cell_dir.clone(),
                adapter_id: config.adapter_id.clone(),
                seed: Some(seed),
                timeout: config.timeout,
            })?;

            state = CellState::ArtifactsVerified;
            debug!("sweep cell {dirname}: {state:?}");

            let manifest_path = cell_dir.join("manifest.json");
            let manifest_hash = sha256_file(&manifest_path)?;
            state = CellState::Hashed;
            debug!("sweep cell {dirname}: {state:?}");

            runs.push(SweepRunRecord { axis_values: axis_values.clone(), seed, manifest_hash });
            state = CellState::Recorded;
            debug!("sweep cell {dirname}: {state:?}");
        }
    }

    let mut axes_map = BTreeMap::new();
    for axis in &config.axes {
        axes_map.insert(axis.name.clone(), axis.values.clone());
    }

    let manifest = SweepManifestFile { axes: axes_map, seeds: config.seeds.clone(), runs };

    let manifest_path = config.output_root.join("sweep_manifest.json");
    clarity_io::canonical_json::write_canonical_file(&manifest_path, &manifest.to_value()?)?;
    info!("sweep complete: {} cells written to {}", manifest.runs.len(), config.output_root.display());

    Ok(manifest)
}

/// Per-axis observations extracted from a completed sweep, ready for
/// `clarity_algo::metrics::compute_metrics`: the baseline run is the first
/// entry in the manifest's run schedule (spec §4.6), and each axis's
/// bucket is built from every run's value of that one axis.
pub struct SweepObservations {
    pub baseline_answer: String,
    pub baseline_justification: String,
    pub per_axis: BTreeMap<String, Vec<RunObservation>>,
}

/// Load `sweep_manifest.json` from `sweep_dir` and, for every run cell it
/// names, read that cell's `trace_pack.jsonl` to extract the answer and
/// justification the metrics engine needs.
pub fn load_sweep_observations(sweep_dir: &Path) -> PipelineResult<SweepObservations> {
    let manifest = load_sweep_manifest(&sweep_dir.join("sweep_manifest.json"))?;
    if manifest.runs.is_empty() {
        return Err(PipelineError::InvalidInput("sweep manifest has no runs".into()));
    }

    let mut answers = Vec::with_capacity(manifest.runs.len());
    let mut justifications = Vec::with_capacity(manifest.runs.len());
    for record in &manifest.runs {
        let dirname = build_run_directory_name(&record.axis_values, record.seed);
        let trace_path = sweep_dir.join(&dirname).join("trace_pack.jsonl");
        let records = load_trace_pack(&trace_path)?;
        answers.push(extract_answer(&records)?);
        justifications.push(extract_justification(&records)?);
    }

    let baseline_answer = answers[0].clone();
    let baseline_justification = justifications[0].clone();

    let mut per_axis: BTreeMap<String, Vec<RunObservation>> = BTreeMap::new();
    for axis_name in manifest.axes.keys() {
        let mut observations = Vec::with_capacity(manifest.runs.len());
        for (i, record) in manifest.runs.iter().enumerate() {
            let value = record.axis_values.get(axis_name).ok_or_else(|| {
                PipelineError::InvalidInput(format!("run missing value for axis {axis_name}"))
            })?;
            observations.push(RunObservation {
                axis_value_key: encode_axis_value(&value_to_string(value)),
                answer: answers[i].clone(),
                justification: justifications[i].clone(),
            });
        }
        per_axis.insert(axis_name.clone(), observations);
    }

    Ok(SweepObservations { baseline_answer, baseline_justification, per_axis })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn axis_combinations_are_alphabetical_outer_declared_inner() {
        let axes = vec![
            SweepAxis { name: "contrast".into(), values: vec![json!(1), json!(2)] },
            SweepAxis { name: "brightness".into(), values: vec![json!(0.8), json!(1.0)] },
        ];
        let combos = axis_combinations(&axes);
        assert_eq!(combos.len(), 4);
        // brightness sorts before contrast alphabetically.
        assert_eq!(combos[0]["brightness"], json!(0.8));
        assert_eq!(combos[0]["contrast"], json!(1));
    }

    // Scenario A from spec §8.
    #[test]
    fn scenario_a_run_directory_names() {
        let mut a = BTreeMap::new();
        a.insert("brightness".to_string(), json!(0.8));
        assert_eq!(build_run_directory_name(&a, 42), "brightness=0p8_seed=42");

        let mut b = BTreeMap::new();
        b.insert("brightness".to_string(), json!(1.0));
        assert_eq!(build_run_directory_name(&b, 42), "brightness=1p0_seed=42");
    }

    fn write_cell(dir: &Path, axis_values: &BTreeMap<String, Value>, seed: i64, answer: &str, justification: &str) {
        let cell_dir = dir.join(build_run_directory_name(axis_values, seed));
        fs::create_dir_all(&cell_dir).unwrap();
        fs::write(
            cell_dir.join("trace_pack.jsonl"),
            format!(r#"{{"output":"{answer}","justification":"{justification}"}}"#),
        )
        .unwrap();
    }

    #[test]
    fn load_sweep_observations_buckets_by_axis_value() {
        let dir = tempfile::tempdir().unwrap();

        let mut v0p8 = BTreeMap::new();
        v0p8.insert("brightness".to_string(), json!(0.8));
        write_cell(dir.path(), &v0p8, 1, "A", "x");

        let mut v1p0 = BTreeMap::new();
        v1p0.insert("brightness".to_string(), json!(1.0));
        write_cell(dir.path(), &v1p0, 1, "A", "x");

        let mut v1p2 = BTreeMap::new();
        v1p2.insert("brightness".to_string(), json!(1.2));
        write_cell(dir.path(), &v1p2, 1, "B", "xy");

        let mut axes = BTreeMap::new();
        axes.insert("brightness".to_string(), vec![json!(0.8), json!(1.0), json!(1.2)]);
        let manifest = SweepManifestFile {
            axes,
            seeds: vec![1],
            runs: vec![
                SweepRunRecord { axis_values: v0p8, seed: 1, manifest_hash: String::new() },
                SweepRunRecord { axis_values: v1p0, seed: 1, manifest_hash: String::new() },
                SweepRunRecord { axis_values: v1p2, seed: 1, manifest_hash: String::new() },
            ],
        };
        clarity_io::canonical_json::write_canonical_file(
            &dir.path().join("sweep_manifest.json"),
            &manifest.to_value().unwrap(),
        )
        .unwrap();

        let observations = load_sweep_observations(dir.path()).unwrap();
        assert_eq!(observations.baseline_answer, "A");
        assert_eq!(observations.baseline_justification, "x");
        let brightness = observations.per_axis.get("brightness").unwrap();
        assert_eq!(brightness.len(), 3);
        assert_eq!(brightness[2].axis_value_key, "1p2");
        assert_eq!(brightness[2].answer, "B");
    }
}

//! Counterfactual orchestrator (spec §4.11): drives a baseline inference
//! plus one masked inference per grid cell through a [`Runner`], building
//! a `ProbeSurface` and an `OverlayBundle`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use clarity_algo::counterfactual::{
    apply_mask, compute_probe_result, compute_probe_surface, generate_grid_masks, ProbeSurface, RgbImage,
};
use clarity_algo::evidence::{extract_regions_from_heatmap, normalize_evidence_to_heatmap, OverlayBundle};

use crate::{PipelineError, PipelineResult};

/// A registered baseline fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSpec {
    pub baseline_id: String,
    pub image_path: PathBuf,
    pub prompt: String,
    pub axis: String,
    pub values: Vec<f64>,
    pub expected_answer: String,
    pub expected_justification: String,
    pub seed: i64,
}

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    spec_file: String,
    #[allow(dead_code)]
    image_file: String,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    baselines: BTreeMap<String, RegistryEntry>,
}

/// List the baseline IDs registered under `fixtures_dir/registry.json`.
pub fn list_available_baselines(fixtures_dir: &Path) -> PipelineResult<Vec<String>> {
    let registry = load_baseline_registry(fixtures_dir)?;
    Ok(registry.baselines.into_keys().collect())
}

fn load_baseline_registry(fixtures_dir: &Path) -> PipelineResult<RegistryFile> {
    let registry_path = fixtures_dir.join("registry.json");
    let bytes = fs::read(&registry_path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Load one baseline's full spec from the fixture registry.
pub fn load_baseline_spec(fixtures_dir: &Path, baseline_id: &str) -> PipelineResult<BaselineSpec> {
    let registry = load_baseline_registry(fixtures_dir)?;
    let entry = registry
        .baselines
        .get(baseline_id)
        .ok_or_else(|| PipelineError::InvalidInput(format!("unknown baseline: {baseline_id}")))?;
    let spec_path = fixtures_dir.join(&entry.spec_file);
    let bytes = fs::read(&spec_path)?;
    let mut spec: BaselineSpec = serde_json::from_slice(&bytes)?;
    spec.baseline_id = baseline_id.to_string();
    Ok(spec)
}

/// The runner's output for one inference call.
#[derive(Debug, Clone, Default)]
pub struct RunnerOutcome {
    pub answer: String,
    pub justification: String,
    pub esi: f64,
    pub drift: f64,
    pub evidence_map: Option<Vec<f64>>,
}

/// A capability that can run one masked or unmasked inference directly
/// (used by the counterfactual orchestrator, distinct from the sweep's
/// process-boundary [`Runner`] since here the image itself is mutated
/// per call rather than passed as a config file).
pub trait InferenceRunner {
    fn run(&self, image: &RgbImage, prompt: &str, axis: &str, value: f64, seed: i64) -> PipelineResult<RunnerOutcome>;
}

/// Deterministic test/offline double: detects masking by sampling a 5x5
/// window at the image center for the mask's gray fill value, simulates
/// degradation as a function of an internal call counter, and generates a
/// synthetic evidence map seeded by `seed + call_count`. This behavior is
/// test-only and is never part of the `InferenceRunner` trait's production
/// contract (spec §9 Open Question 4).
pub struct StubbedRunner {
    call_count: std::cell::Cell<u64>,
}

impl Default for StubbedRunner {
    fn default() -> Self {
        Self { call_count: std::cell::Cell::new(0) }
    }
}

impl StubbedRunner {
    fn is_masked(&self, image: &RgbImage) -> bool {
        let cx = image.width / 2;
        let cy = image.height / 2;
        let half = 2usize;
        let x0 = cx.saturating_sub(half);
        let y0 = cy.saturating_sub(half);
        let x1 = (cx + half).min(image.width.saturating_sub(1));
        let y1 = (cy + half).min(image.height.saturating_sub(1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                let i = (y * image.width + x) * 3;
                if image.pixels[i] == clarity_algo::counterfactual::MASK_FILL_VALUE
                    && image.pixels[i + 1] == clarity_algo::counterfactual::MASK_FILL_VALUE
                    && image.pixels[i + 2] == clarity_algo::counterfactual::MASK_FILL_VALUE
                {
                    return true;
                }
            }
        }
        false
    }

    fn synthetic_evidence_map(&self, width: usize, height: usize, seed: i64) -> Vec<f64> {
        let combined_seed = seed as u64 + self.call_count.get();
        let cx = (combined_seed % width as u64) as f64;
        let cy = ((combined_seed / 7) % height as u64) as f64;
        let mut out = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                let dist_sq = dx * dx + dy * dy;
                out.push((-dist_sq / (2.0 * 25.0)).exp());
            }
        }
        out
    }
}

impl InferenceRunner for StubbedRunner {
    fn run(&self, image: &RgbImage, _prompt: &str, _axis: &str, _value: f64, seed: i64) -> PipelineResult<RunnerOutcome> {
        let count = self.call_count.get();
        self.call_count.set(count + 1);

        let masked = self.is_masked(image);
        let degradation = clarity_core::round8(0.1 * (count % 10) as f64);
        let (esi, drift) = if masked { (1.0 - degradation, degradation) } else { (1.0, 0.0) };

        Ok(RunnerOutcome {
            answer: "A".to_string(),
            justification: "stub".to_string(),
            esi,
            drift,
            evidence_map: Some(self.synthetic_evidence_map(image.width, image.height, seed)),
        })
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub grid_size: usize,
    pub axis: String,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct OrchestratorResult {
    pub baseline_id: String,
    pub config: OrchestratorConfig,
    pub baseline_esi: f64,
    pub baseline_drift: f64,
    pub probe_surface: ProbeSurface,
    pub overlay_bundle: OverlayBundle,
}

const EVIDENCE_THRESHOLD: f64 = 0.7;

/// Run the full counterfactual orchestration for one baseline: a baseline
/// inference, then one masked inference per grid cell (`grid_size^2 + 1`
/// total runner invocations), producing a probe surface and an overlay
/// bundle derived from the baseline's evidence map (falling back to a
/// synthetic map seeded by the baseline's seed when the runner returns
/// none).
pub fn run_counterfactual<R: InferenceRunner>(
    runner: &R,
    baseline: &BaselineSpec,
    image: &RgbImage,
    config: OrchestratorConfig,
) -> PipelineResult<OrchestratorResult> {
    if config.grid_size < 1 {
        return Err(PipelineError::InvalidInput("grid_size must be >= 1".into()));
    }
    if baseline.prompt.is_empty() {
        return Err(PipelineError::InvalidInput("baseline prompt must not be empty".into()));
    }

    let baseline_outcome = runner.run(image, &baseline.prompt, &config.axis, config.value, baseline.seed)?;

    let masks = generate_grid_masks(config.grid_size)?;
    let mut probes = Vec::with_capacity(masks.len());
    for mask in &masks {
        let masked_image = apply_mask(image, mask);
        let outcome = runner.run(&masked_image, &baseline.prompt, &config.axis, config.value, baseline.seed)?;
        probes.push(compute_probe_result(
            mask.row,
            mask.col,
            baseline_outcome.esi,
            baseline_outcome.drift,
            outcome.esi,
            outcome.drift,
        ));
    }
    let probe_surface = compute_probe_surface(config.grid_size, probes)?;

    let evidence_map = baseline_outcome
        .evidence_map
        .clone()
        .unwrap_or_else(|| synthetic_fallback(image.width, image.height, baseline.seed));
    let heatmap = normalize_evidence_to_heatmap(image.width, image.height, &evidence_map)?;
    let overlay_bundle = extract_regions_from_heatmap(&heatmap, EVIDENCE_THRESHOLD);

    info!(
        "counterfactual run complete for baseline {}: {} probes, {} regions",
        baseline.baseline_id,
        probe_surface.total_probes,
        overlay_bundle.regions.len()
    );

    Ok(OrchestratorResult {
        baseline_id: baseline.baseline_id.clone(),
        config,
        baseline_esi: baseline_outcome.esi,
        baseline_drift: baseline_outcome.drift,
        probe_surface,
        overlay_bundle,
    })
}

fn synthetic_fallback(width: usize, height: usize, seed: i64) -> Vec<f64> {
    let cx = (seed.unsigned_abs() as usize % width) as f64;
    let cy = ((seed.unsigned_abs() as usize / 7) % height) as f64;
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            out.push((-(dx * dx + dy * dy) / 50.0).exp());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Scenario E from spec §8: stubbed runner + 3x3 grid, run twice ->
    // byte-equal ProbeSurface.
    #[test]
    fn scenario_e_stubbed_runner_is_deterministic_per_instance() {
        let baseline = BaselineSpec {
            baseline_id: "b1".into(),
            image_path: PathBuf::from("unused.png"),
            prompt: "describe".into(),
            axis: "brightness".into(),
            values: vec![0.8, 1.0],
            expected_answer: "A".into(),
            expected_justification: "x".into(),
            seed: 7,
        };
        let image = RgbImage::new(30, 30);
        let config = OrchestratorConfig { grid_size: 3, axis: "brightness".into(), value: 1.0 };

        let runner_a = StubbedRunner::default();
        let result_a = run_counterfactual(&runner_a, &baseline, &image, config.clone()).unwrap();

        let runner_b = StubbedRunner::default();
        let result_b = run_counterfactual(&runner_b, &baseline, &image, config).unwrap();

        assert_eq!(result_a.probe_surface.probes.len(), 9);
        assert_eq!(result_a.probe_surface.probes, result_b.probe_surface.probes);
    }

    #[test]
    fn zero_grid_size_is_rejected() {
        let baseline = BaselineSpec {
            baseline_id: "b1".into(),
            image_path: PathBuf::from("x.png"),
            prompt: "describe".into(),
            axis: "brightness".into(),
            values: vec![1.0],
            expected_answer: "A".into(),
            expected_justification: "x".into(),
            seed: 1,
        };
        let image = RgbImage::new(10, 10);
        let runner = StubbedRunner::default();
        let config = OrchestratorConfig { grid_size: 0, axis: "brightness".into(), value: 1.0 };
        assert!(run_counterfactual(&runner, &baseline, &image, config).is_err());
    }
}

//! CLI entrypoint (spec §4.15, §7): parses one of four subcommands, builds
//! a [`Config`] once from the environment, and dispatches into
//! `clarity_pipeline`/`clarity_report`. Strictly offline: no network, no OS
//! RNG in the pipeline itself.

mod args;
mod config;

use std::process::ExitCode;

use clap::Parser;
use log::info;
use serde_json::{json, Value};

use args::{
    read_json_file, write_bytes_atomically, BuildReportArgs, CacheAction, CacheArgs, Cli, CliError, Command, ProbeArgs,
    ReportArgs, SweepArgs,
};
use config::Config;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::from_env();

    match dispatch(cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("clarity: error: {e}");
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(err: &CliError) -> ExitCode {
    use clarity_pipeline::PipelineError;
    match err {
        CliError::Pipeline(PipelineError::RunnerTimeout { .. }) | CliError::Pipeline(PipelineError::InvocationFailed { .. }) => {
            ExitCode::from(2)
        }
        CliError::Io(clarity_io::IoError::CacheInProgress(_)) => ExitCode::from(3),
        CliError::Pipeline(PipelineError::OutputCollision(_)) => ExitCode::from(4),
        CliError::InvalidInput(_)
        | CliError::Pipeline(PipelineError::InvalidInput(_))
        | CliError::Pipeline(PipelineError::ArtifactAbsent(_)) => ExitCode::from(1),
        _ => ExitCode::from(1),
    }
}

fn dispatch(cli: Cli, config: &Config) -> Result<ExitCode, CliError> {
    match cli.command {
        Command::Sweep(args) => run_sweep(args, config),
        Command::Probe(args) => run_probe(args, config),
        Command::Report(args) => run_report(args, config),
        Command::BuildReport(args) => run_build_report(args, config),
        Command::Cache(args) => run_cache(args, config),
    }
}

fn run_sweep(args: SweepArgs, _config: &Config) -> Result<ExitCode, CliError> {
    use clarity_pipeline::runner::ProcessRunner;
    use clarity_pipeline::sweep::{execute_sweep, SweepAxis, SweepConfig};

    let raw = read_json_file(&args.config)?;
    let axes_obj = raw
        .get("axes")
        .and_then(Value::as_object)
        .ok_or_else(|| CliError::InvalidInput("sweep config missing \"axes\" object".into()))?;
    let axes = axes_obj
        .iter()
        .map(|(name, values)| {
            let values = values.as_array().cloned().unwrap_or_default();
            SweepAxis { name: name.clone(), values }
        })
        .collect();

    let seeds = raw
        .get("seeds")
        .and_then(Value::as_array)
        .ok_or_else(|| CliError::InvalidInput("sweep config missing \"seeds\" array".into()))?
        .iter()
        .map(|v| v.as_i64().ok_or_else(|| CliError::InvalidInput("seed is not an integer".into())))
        .collect::<Result<Vec<i64>, CliError>>()?;

    let command = raw
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| CliError::InvalidInput("sweep config missing \"command\" string".into()))?
        .to_string();
    let adapter_id = raw.get("adapter_id").and_then(Value::as_str).map(str::to_string);
    let timeout_secs = raw.get("timeout_secs").and_then(Value::as_u64).unwrap_or(60);

    let sweep_config = SweepConfig {
        axes,
        seeds,
        command,
        adapter_id,
        output_root: args.output.clone(),
        timeout: std::time::Duration::from_secs(timeout_secs),
    };

    let manifest = execute_sweep(&sweep_config, &ProcessRunner)?;
    info!("sweep wrote {} cells to {}", manifest.runs.len(), args.output.display());
    println!("clarity: sweep complete — {} cells written to {}", manifest.runs.len(), args.output.display());
    Ok(ExitCode::from(0))
}

fn run_probe(args: ProbeArgs, config: &Config) -> Result<ExitCode, CliError> {
    use clarity_algo::counterfactual::RgbImage;
    use clarity_pipeline::counterfactual::{load_baseline_spec, run_counterfactual, OrchestratorConfig, StubbedRunner};

    if config.real_model {
        return Err(CliError::InvalidInput(
            "CLARITY_REAL_MODEL=1 requires an external runner; the CLI's probe command only drives the offline stub".into(),
        ));
    }

    let baseline = load_baseline_spec(&args.fixtures, &args.baseline_id)?;
    let dynamic = image::open(&baseline.image_path)
        .map_err(|e| CliError::InvalidInput(format!("cannot decode baseline image {}: {e}", baseline.image_path.display())))?
        .into_rgb8();
    let image = RgbImage { width: dynamic.width() as usize, height: dynamic.height() as usize, pixels: dynamic.into_raw() };

    let orchestrator_config = OrchestratorConfig { grid_size: args.grid_size, axis: args.axis.clone(), value: args.value };
    let runner = StubbedRunner::default();
    let result = run_counterfactual(&runner, &baseline, &image, orchestrator_config)?;

    let probes_json: Vec<Value> = result
        .probe_surface
        .probes
        .iter()
        .map(|p| {
            json!({
                "col": p.col,
                "delta_drift": p.delta_drift,
                "delta_esi": p.delta_esi,
                "masked_drift": p.masked_drift,
                "masked_esi": p.masked_esi,
                "row": p.row,
            })
        })
        .collect();
    let regions_json: Vec<Value> = result
        .overlay_bundle
        .regions
        .iter()
        .map(|r| {
            json!({
                "area": r.area,
                "region_id": r.region_id,
                "x_max": r.x_max,
                "x_min": r.x_min,
                "y_max": r.y_max,
                "y_min": r.y_min,
            })
        })
        .collect();

    let output = json!({
        "baseline_drift": result.baseline_drift,
        "baseline_esi": result.baseline_esi,
        "baseline_id": result.baseline_id,
        "overlay": {
            "image_height": result.overlay_bundle.image_height,
            "image_width": result.overlay_bundle.image_width,
            "regions": regions_json,
            "total_evidence_area": result.overlay_bundle.total_evidence_area,
        },
        "probe_surface": {
            "grid_size": result.probe_surface.grid_size,
            "mean_delta_drift": result.probe_surface.mean_delta_drift,
            "mean_delta_esi": result.probe_surface.mean_delta_esi,
            "probes": probes_json,
            "total_probes": result.probe_surface.total_probes,
            "variance_delta_drift": result.probe_surface.variance_delta_drift,
            "variance_delta_esi": result.probe_surface.variance_delta_esi,
        },
    });

    write_bytes_atomically(&args.output, clarity_io::canonical_json::to_canonical_json_bytes(&output).as_slice())?;
    println!("clarity: probe complete — {} probes written to {}", result.probe_surface.total_probes, args.output.display());
    Ok(ExitCode::from(0))
}

fn run_report(args: ReportArgs, _config: &Config) -> Result<ExitCode, CliError> {
    use clarity_report::model::ClarityReport;
    use clarity_report::pdf::render_pdf;
    use clarity_report::png::{render_heatmap_png, render_probe_grid_png, render_surface_png};

    let report_value = read_json_file(&args.report)?;
    let report: ClarityReport = serde_json::from_value(report_value)
        .map_err(|source| CliError::Json { path: args.report.clone(), source })?;

    let heatmap_value = read_json_file(&args.heatmap)?;
    let heatmap: Vec<Vec<f64>> = serde_json::from_value(heatmap_value)
        .map_err(|source| CliError::Json { path: args.heatmap.clone(), source })?;

    std::fs::create_dir_all(&args.output).map_err(|source| CliError::Write { path: args.output.clone(), source })?;

    let heatmap_png = render_heatmap_png(&heatmap, 200, 200)?;
    write_bytes_atomically(&args.output.join("heatmap.png"), &heatmap_png)?;

    if !report.robustness_surfaces.is_empty() {
        let surfaces_png = render_surface_png(&report.robustness_surfaces, 400, 200)?;
        write_bytes_atomically(&args.output.join("surfaces.png"), &surfaces_png)?;
    }

    if !report.probe_surface.probes.is_empty() {
        let probes_png = render_probe_grid_png(&report.probe_surface.probes, report.probe_surface.grid_size, 300, 300)?;
        write_bytes_atomically(&args.output.join("probes.png"), &probes_png)?;
    }

    let pdf_bytes = render_pdf(&report, &heatmap, &report.metadata.generated_at)?;
    write_bytes_atomically(&args.output.join("report.pdf"), &pdf_bytes)?;

    let report_json = clarity_io::canonical_json::to_canonical_json_bytes(&report.to_value());
    write_bytes_atomically(&args.output.join("report.json"), &report_json)?;

    println!("clarity: report rendered to {}", args.output.display());
    Ok(ExitCode::from(0))
}

/// Compute a `ClarityReport` from a completed sweep, the way `run_probe`
/// drives `run_counterfactual` end-to-end: loads the sweep's manifest and
/// per-cell trace packs, runs them through the metrics/surface/gradient
/// engines, and writes out `report.json` plus a sibling `gradients.json`
/// (the report model itself has no gradient section, spec §4.12).
fn run_build_report(args: BuildReportArgs, _config: &Config) -> Result<ExitCode, CliError> {
    use std::collections::BTreeMap;

    use clarity_algo::gradient::compute_gradient;
    use clarity_algo::metrics::compute_metrics;
    use clarity_algo::surface::build_surface;
    use clarity_pipeline::sweep::load_sweep_observations;
    use clarity_report::model::{
        ClarityReport, ReportMetadata, ReportMetrics, ReportOverlaySection, ReportProbeSurface, ReportRobustnessSurface,
        ReportSection, SurfacePoint,
    };

    let observations = load_sweep_observations(&args.sweep_dir)?;

    // Baseline run is the first in schedule order (spec §4.6); each axis's
    // own bucket for that run's value is its trivial self-comparison score.
    let mut axis_metrics = Vec::with_capacity(observations.per_axis.len());
    let mut baseline_esi_scores = Vec::new();
    let mut baseline_drift_scores = Vec::new();
    for (axis, runs) in &observations.per_axis {
        let baseline_key = runs[0].axis_value_key.clone();
        let result = compute_metrics(axis, &observations.baseline_answer, &observations.baseline_justification, runs)?;
        if let Some(score) = result.esi.value_scores.get(&baseline_key) {
            baseline_esi_scores.push(*score);
        }
        if let Some(score) = result.drift.value_scores.get(&baseline_key) {
            baseline_drift_scores.push(*score);
        }
        axis_metrics.push((axis.clone(), result));
    }

    let surface_axes: Vec<(String, BTreeMap<String, f64>, BTreeMap<String, f64>)> = axis_metrics
        .iter()
        .map(|(axis, result)| (axis.clone(), result.esi.value_scores.clone(), result.drift.value_scores.clone()))
        .collect();
    let surface = build_surface(&surface_axes)?;

    let robustness_surfaces: Vec<ReportRobustnessSurface> = surface
        .axes
        .iter()
        .map(|axis_surface| {
            let points = axis_surface
                .points
                .iter()
                .map(|p| SurfacePoint::new(&axis_surface.axis, &p.value_key, p.esi, p.drift))
                .collect();
            ReportRobustnessSurface::new(
                &axis_surface.axis,
                axis_surface.mean_esi,
                axis_surface.mean_drift,
                axis_surface.variance_esi,
                axis_surface.variance_drift,
                points,
            )
        })
        .collect();

    let mut gradients = serde_json::Map::new();
    for (axis, result) in &axis_metrics {
        let value_keys: Vec<String> = result.esi.value_scores.keys().cloned().collect();
        let esi_scores: Vec<f64> = result.esi.value_scores.values().copied().collect();
        let drift_scores: Vec<f64> = result.drift.value_scores.values().copied().collect();
        let esi_gradient = compute_gradient(axis, &value_keys, &esi_scores)?;
        let drift_gradient = compute_gradient(axis, &value_keys, &drift_scores)?;
        let point_to_json = |p: &clarity_algo::gradient::GradientPoint| json!({"value": p.value_key, "gradient": p.gradient});
        gradients.insert(
            axis.clone(),
            json!({
                "esi": esi_gradient.points.iter().map(point_to_json).collect::<Vec<_>>(),
                "drift": drift_gradient.points.iter().map(point_to_json).collect::<Vec<_>>(),
            }),
        );
    }

    let baseline_esi = mean_or_zero(&baseline_esi_scores);
    let baseline_drift = mean_or_zero(&baseline_drift_scores);

    let metrics = ReportMetrics::new(
        baseline_esi,
        baseline_drift,
        surface.global_mean_esi,
        surface.global_mean_drift,
        surface.global_variance_esi,
        surface.global_variance_drift,
        false,
        None,
    );

    let (overlay_section, probe_surface) = match &args.probe {
        Some(probe_path) => load_probe_sections(probe_path)?,
        None => (ReportOverlaySection::new(0, 0, vec![], 0.0), ReportProbeSurface::new(0, 0, 0.0, 0.0, 0.0, 0.0, vec![])),
    };

    let sweep_manifest_hash = clarity_io::hasher::sha256_file(&args.sweep_dir.join("sweep_manifest.json"))?;

    let report = ClarityReport {
        metadata: ReportMetadata::new(
            &args.case_id,
            &args.title,
            &args.generated_at,
            env!("CARGO_PKG_VERSION"),
            &args.r2l_sha,
            &args.adapter_id,
            false,
            sweep_manifest_hash,
        ),
        metrics,
        robustness_surfaces,
        overlay_section,
        probe_surface,
        reproducibility: ReportSection::new("repro", "Reproducibility", vec![]),
    };

    write_bytes_atomically(&args.output, clarity_io::canonical_json::to_canonical_json_bytes(&report.to_value()).as_slice())?;

    let gradients_path = args.output.with_file_name("gradients.json");
    write_bytes_atomically(&gradients_path, clarity_io::canonical_json::to_canonical_json_bytes(&Value::Object(gradients)).as_slice())?;

    println!(
        "clarity: report built from sweep {} — {} robustness surfaces written to {}",
        args.sweep_dir.display(),
        report.robustness_surfaces.len(),
        args.output.display()
    );
    Ok(ExitCode::from(0))
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Parse the overlay/probe sections out of the JSON a `probe` subcommand run
/// wrote (see `run_probe`'s output shape above). Missing fields default to
/// their zero value rather than failing the whole report.
fn load_probe_sections(
    probe_path: &std::path::Path,
) -> Result<(clarity_report::model::ReportOverlaySection, clarity_report::model::ReportProbeSurface), CliError> {
    use clarity_report::model::{OverlayRegion, ProbeResult, ReportOverlaySection, ReportProbeSurface};

    let probe_value = read_json_file(&probe_path.to_path_buf())?;

    let overlay = probe_value.get("overlay").cloned().unwrap_or(Value::Null);
    let regions: Vec<OverlayRegion> = overlay
        .get("regions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| {
            Some(OverlayRegion::new(
                r.get("region_id")?.as_str()?.to_string(),
                r.get("x_min")?.as_f64()?,
                r.get("y_min")?.as_f64()?,
                r.get("x_max")?.as_f64()?,
                r.get("y_max")?.as_f64()?,
                r.get("area")?.as_f64()?,
                0.0,
            ))
        })
        .collect();
    let overlay_section = ReportOverlaySection::new(
        overlay.get("image_width").and_then(Value::as_u64).unwrap_or(0) as usize,
        overlay.get("image_height").and_then(Value::as_u64).unwrap_or(0) as usize,
        regions,
        overlay.get("total_evidence_area").and_then(Value::as_f64).unwrap_or(0.0),
    );

    let probe_surface_value = probe_value.get("probe_surface").cloned().unwrap_or(Value::Null);
    let probes: Vec<ProbeResult> = probe_surface_value
        .get("probes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|p| {
            Some(ProbeResult::new(
                p.get("row")?.as_u64()? as usize,
                p.get("col")?.as_u64()? as usize,
                p.get("delta_esi")?.as_f64()?,
                p.get("delta_drift")?.as_f64()?,
                p.get("masked_esi")?.as_f64()?,
                p.get("masked_drift")?.as_f64()?,
            ))
        })
        .collect();
    let probe_surface = ReportProbeSurface::new(
        probe_surface_value.get("grid_size").and_then(Value::as_u64).unwrap_or(0) as usize,
        probe_surface_value.get("total_probes").and_then(Value::as_u64).unwrap_or(0) as usize,
        probe_surface_value.get("mean_delta_esi").and_then(Value::as_f64).unwrap_or(0.0),
        probe_surface_value.get("mean_delta_drift").and_then(Value::as_f64).unwrap_or(0.0),
        probe_surface_value.get("variance_delta_esi").and_then(Value::as_f64).unwrap_or(0.0),
        probe_surface_value.get("variance_delta_drift").and_then(Value::as_f64).unwrap_or(0.0),
        probes,
    );

    Ok((overlay_section, probe_surface))
}

fn run_cache(args: CacheArgs, _config: &Config) -> Result<ExitCode, CliError> {
    use clarity_io::cache::CacheManager;

    match args.action {
        CacheAction::Inspect { cache_dir, key, ext } => {
            let cache = CacheManager::new(cache_dir.clone());
            let present = cache.exists(&key, &ext);
            println!("clarity: cache[{key}{ext}] present={present} (dir={})", cache_dir.display());
            Ok(ExitCode::from(0))
        }
        CacheAction::Clear { cache_dir } => {
            let cache = CacheManager::new(cache_dir.clone());
            cache.clear()?;
            println!("clarity: cache cleared at {}", cache_dir.display());
            Ok(ExitCode::from(0))
        }
    }
}

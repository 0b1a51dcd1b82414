//! Report model (spec §4.12, §3 supplements): the frozen, alphabetically
//! keyed data model behind a CLARITY report's cover page, metrics summary,
//! robustness surfaces, evidence overlay, probe surface, and
//! reproducibility block.
//!
//! Every constructor runs its float fields through [`clarity_core::round8`]
//! so the model can never carry unrounded values into serialization.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const SERIALIZATION_VERSION: &str = "M11_v1";

fn r8(v: f64) -> f64 {
    clarity_core::round8(v)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub case_id: String,
    pub title: String,
    pub generated_at: String,
    pub clarity_version: String,
    pub r2l_sha: String,
    pub adapter_id: String,
    pub rich_mode: bool,
    pub sweep_manifest_hash: String,
    pub serialization_version: String,
}

impl ReportMetadata {
    pub fn new(
        case_id: impl Into<String>,
        title: impl Into<String>,
        generated_at: impl Into<String>,
        clarity_version: impl Into<String>,
        r2l_sha: impl Into<String>,
        adapter_id: impl Into<String>,
        rich_mode: bool,
        sweep_manifest_hash: impl Into<String>,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            title: title.into(),
            generated_at: generated_at.into(),
            clarity_version: clarity_version.into(),
            r2l_sha: r2l_sha.into(),
            adapter_id: adapter_id.into(),
            rich_mode,
            sweep_manifest_hash: sweep_manifest_hash.into(),
            serialization_version: SERIALIZATION_VERSION.to_string(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "adapter_id": self.adapter_id,
            "case_id": self.case_id,
            "clarity_version": self.clarity_version,
            "generated_at": self.generated_at,
            "r2l_sha": self.r2l_sha,
            "rich_mode": self.rich_mode,
            "serialization_version": self.serialization_version,
            "sweep_manifest_hash": self.sweep_manifest_hash,
            "title": self.title,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub baseline_esi: f64,
    pub baseline_drift: f64,
    pub global_mean_esi: f64,
    pub global_mean_drift: f64,
    pub global_variance_esi: f64,
    pub global_variance_drift: f64,
    pub monte_carlo_present: bool,
    pub monte_carlo_entropy: Option<f64>,
}

impl ReportMetrics {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        baseline_esi: f64,
        baseline_drift: f64,
        global_mean_esi: f64,
        global_mean_drift: f64,
        global_variance_esi: f64,
        global_variance_drift: f64,
        monte_carlo_present: bool,
        monte_carlo_entropy: Option<f64>,
    ) -> Self {
        Self {
            baseline_esi: r8(baseline_esi),
            baseline_drift: r8(baseline_drift),
            global_mean_esi: r8(global_mean_esi),
            global_mean_drift: r8(global_mean_drift),
            global_variance_esi: r8(global_variance_esi),
            global_variance_drift: r8(global_variance_drift),
            monte_carlo_present,
            monte_carlo_entropy: monte_carlo_entropy.map(r8),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("baseline_drift".into(), json!(self.baseline_drift));
        map.insert("baseline_esi".into(), json!(self.baseline_esi));
        map.insert("global_mean_drift".into(), json!(self.global_mean_drift));
        map.insert("global_mean_esi".into(), json!(self.global_mean_esi));
        map.insert("global_variance_drift".into(), json!(self.global_variance_drift));
        map.insert("global_variance_esi".into(), json!(self.global_variance_esi));
        map.insert("monte_carlo_present".into(), json!(self.monte_carlo_present));
        if let Some(entropy) = self.monte_carlo_entropy {
            map.insert("monte_carlo_entropy".into(), json!(entropy));
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoint {
    pub axis: String,
    pub value: String,
    pub esi: f64,
    pub drift: f64,
}

impl SurfacePoint {
    pub fn new(axis: impl Into<String>, value: impl Into<String>, esi: f64, drift: f64) -> Self {
        Self { axis: axis.into(), value: value.into(), esi: r8(esi), drift: r8(drift) }
    }

    pub fn to_value(&self) -> Value {
        json!({ "axis": self.axis, "drift": self.drift, "esi": self.esi, "value": self.value })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRobustnessSurface {
    pub axis: String,
    pub mean_esi: f64,
    pub mean_drift: f64,
    pub variance_esi: f64,
    pub variance_drift: f64,
    pub points: Vec<SurfacePoint>,
}

impl ReportRobustnessSurface {
    pub fn new(
        axis: impl Into<String>,
        mean_esi: f64,
        mean_drift: f64,
        variance_esi: f64,
        variance_drift: f64,
        points: Vec<SurfacePoint>,
    ) -> Self {
        Self {
            axis: axis.into(),
            mean_esi: r8(mean_esi),
            mean_drift: r8(mean_drift),
            variance_esi: r8(variance_esi),
            variance_drift: r8(variance_drift),
            points,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "axis": self.axis,
            "mean_drift": self.mean_drift,
            "mean_esi": self.mean_esi,
            "points": self.points.iter().map(SurfacePoint::to_value).collect::<Vec<_>>(),
            "variance_drift": self.variance_drift,
            "variance_esi": self.variance_esi,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRegion {
    pub region_id: String,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub area: f64,
    pub mean_evidence: f64,
}

impl OverlayRegion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        region_id: impl Into<String>,
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
        area: f64,
        mean_evidence: f64,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            x_min: r8(x_min),
            y_min: r8(y_min),
            x_max: r8(x_max),
            y_max: r8(y_max),
            area: r8(area),
            mean_evidence: r8(mean_evidence),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "area": self.area,
            "mean_evidence": self.mean_evidence,
            "region_id": self.region_id,
            "x_max": self.x_max,
            "x_min": self.x_min,
            "y_max": self.y_max,
            "y_min": self.y_min,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOverlaySection {
    pub image_width: usize,
    pub image_height: usize,
    pub regions: Vec<OverlayRegion>,
    pub total_evidence_area: f64,
}

impl ReportOverlaySection {
    pub fn new(image_width: usize, image_height: usize, regions: Vec<OverlayRegion>, total_evidence_area: f64) -> Self {
        Self { image_width, image_height, regions, total_evidence_area: r8(total_evidence_area) }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "image_height": self.image_height,
            "image_width": self.image_width,
            "regions": self.regions.iter().map(OverlayRegion::to_value).collect::<Vec<_>>(),
            "total_evidence_area": self.total_evidence_area,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub row: usize,
    pub col: usize,
    pub delta_esi: f64,
    pub delta_drift: f64,
    pub masked_esi: f64,
    pub masked_drift: f64,
}

impl ProbeResult {
    pub fn new(row: usize, col: usize, delta_esi: f64, delta_drift: f64, masked_esi: f64, masked_drift: f64) -> Self {
        Self {
            row,
            col,
            delta_esi: r8(delta_esi),
            delta_drift: r8(delta_drift),
            masked_esi: r8(masked_esi),
            masked_drift: r8(masked_drift),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "col": self.col,
            "delta_drift": self.delta_drift,
            "delta_esi": self.delta_esi,
            "masked_drift": self.masked_drift,
            "masked_esi": self.masked_esi,
            "row": self.row,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProbeSurface {
    pub grid_size: usize,
    pub total_probes: usize,
    pub mean_delta_esi: f64,
    pub mean_delta_drift: f64,
    pub variance_delta_esi: f64,
    pub variance_delta_drift: f64,
    pub probes: Vec<ProbeResult>,
}

impl ReportProbeSurface {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid_size: usize,
        total_probes: usize,
        mean_delta_esi: f64,
        mean_delta_drift: f64,
        variance_delta_esi: f64,
        variance_delta_drift: f64,
        probes: Vec<ProbeResult>,
    ) -> Self {
        Self {
            grid_size,
            total_probes,
            mean_delta_esi: r8(mean_delta_esi),
            mean_delta_drift: r8(mean_delta_drift),
            variance_delta_esi: r8(variance_delta_esi),
            variance_delta_drift: r8(variance_delta_drift),
            probes,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "grid_size": self.grid_size,
            "mean_delta_drift": self.mean_delta_drift,
            "mean_delta_esi": self.mean_delta_esi,
            "probes": self.probes.iter().map(ProbeResult::to_value).collect::<Vec<_>>(),
            "total_probes": self.total_probes,
            "variance_delta_drift": self.variance_delta_drift,
            "variance_delta_esi": self.variance_delta_esi,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub section_id: String,
    pub title: String,
    pub content: Vec<(String, String)>,
}

impl ReportSection {
    pub fn new(section_id: impl Into<String>, title: impl Into<String>, content: Vec<(String, String)>) -> Self {
        Self { section_id: section_id.into(), title: title.into(), content }
    }

    pub fn to_value(&self) -> Value {
        let mut content_map = Map::new();
        for (k, v) in &self.content {
            content_map.insert(k.clone(), json!(v));
        }
        json!({ "content": Value::Object(content_map), "section_id": self.section_id, "title": self.title })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarityReport {
    pub metadata: ReportMetadata,
    pub metrics: ReportMetrics,
    pub robustness_surfaces: Vec<ReportRobustnessSurface>,
    pub overlay_section: ReportOverlaySection,
    pub probe_surface: ReportProbeSurface,
    pub reproducibility: ReportSection,
}

impl ClarityReport {
    /// Serialize to the report's canonical dictionary shape (alphabetical
    /// top-level keys, matching every sub-section's own `to_value`).
    pub fn to_value(&self) -> Value {
        json!({
            "metadata": self.metadata.to_value(),
            "metrics": self.metrics.to_value(),
            "overlay_section": self.overlay_section.to_value(),
            "probe_surface": self.probe_surface.to_value(),
            "reproducibility": self.reproducibility.to_value(),
            "robustness_surfaces": self.robustness_surfaces.iter().map(ReportRobustnessSurface::to_value).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_rounds_all_float_fields() {
        let metrics = ReportMetrics::new(0.123456789, 0.1, 0.2, 0.3, 0.4, 0.5, false, None);
        assert_eq!(metrics.baseline_esi, 0.12345679);
    }

    #[test]
    fn metrics_omits_monte_carlo_entropy_when_absent() {
        let metrics = ReportMetrics::new(1.0, 0.0, 1.0, 0.0, 0.0, 0.0, false, None);
        let value = metrics.to_value();
        assert!(value.get("monte_carlo_entropy").is_none());
    }

    #[test]
    fn top_level_keys_are_alphabetical() {
        let report = ClarityReport {
            metadata: ReportMetadata::new("case1", "t", "2025-01-01T00:00:00Z", "1.0", "deadbeef", "adapter", false, "hash"),
            metrics: ReportMetrics::new(1.0, 0.0, 1.0, 0.0, 0.0, 0.0, false, None),
            robustness_surfaces: vec![],
            overlay_section: ReportOverlaySection::new(10, 10, vec![], 0.0),
            probe_surface: ReportProbeSurface::new(1, 1, 0.0, 0.0, 0.0, 0.0, vec![]),
            reproducibility: ReportSection::new("repro", "Reproducibility", vec![]),
        };
        let value = report.to_value();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        let mut sorted_keys = keys.clone();
        sorted_keys.sort();
        assert_eq!(keys, sorted_keys);
    }
}

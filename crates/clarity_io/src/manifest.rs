//! Sweep manifest and per-run manifest parsing.
//!
//! - `SweepManifestFile` mirrors `sweep_manifest.json` (spec §6): axes,
//!   seeds, and the run index built by the sweep orchestrator.
//! - `RunManifest` mirrors a per-cell `manifest.json`: a typed envelope
//!   (`run_id`, `timestamp`, `seed`, `artifacts`, `extras`) that preserves
//!   unknown fields in `extras` without trusting them (spec §9's redesign
//!   guidance for the original's dynamic/duck-typed artifact record).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::IoError;

/// One declared sweep axis: name plus its ordered list of values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepAxis {
    pub name: String,
    pub values: Vec<Value>,
}

/// A single row of the sweep's run index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRunRecord {
    pub axis_values: BTreeMap<String, Value>,
    pub seed: i64,
    pub manifest_hash: String,
}

/// The top-level `sweep_manifest.json` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepManifestFile {
    pub axes: BTreeMap<String, Vec<Value>>,
    pub seeds: Vec<i64>,
    pub runs: Vec<SweepRunRecord>,
}

impl SweepManifestFile {
    pub fn to_value(&self) -> Result<Value, IoError> {
        serde_json::to_value(self).map_err(IoError::from)
    }
}

/// Typed envelope for a per-cell `manifest.json`. Unknown fields land in
/// `extras` and are preserved verbatim on round-trip but never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub seed: i64,
    pub artifacts: Vec<String>,
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

/// Required top-level keys for a per-cell `manifest.json`.
const REQUIRED_MANIFEST_KEYS: &[&str] = &["run_id", "timestamp", "seed", "artifacts"];

/// Validate that a raw JSON object carries at least the required manifest
/// keys (a subset check — unknown extra keys are fine and preserved).
pub fn validate_manifest_shape(value: &Value) -> Result<(), IoError> {
    let obj = value.as_object().ok_or_else(|| IoError::Invalid("manifest is not a JSON object".into()))?;
    for key in REQUIRED_MANIFEST_KEYS {
        if !obj.contains_key(*key) {
            return Err(IoError::MissingField {
                context: "manifest.json".into(),
                field: (*key).into(),
            });
        }
    }
    Ok(())
}

/// Load and validate a per-cell `manifest.json` from disk.
pub fn load_run_manifest(path: &Path) -> Result<RunManifest, IoError> {
    let bytes = fs::read(path).map_err(IoError::from)?;
    let value: Value = serde_json::from_slice(&bytes)?;
    validate_manifest_shape(&value)?;
    serde_json::from_value(value).map_err(IoError::from)
}

/// Load the top-level `sweep_manifest.json`.
pub fn load_sweep_manifest(path: &Path) -> Result<SweepManifestFile, IoError> {
    let bytes = fs::read(path).map_err(IoError::from)?;
    serde_json::from_slice(&bytes).map_err(IoError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_manifest_shape_requires_all_keys() {
        let v = json!({"run_id": "x", "timestamp": "t", "seed": 1});
        assert!(validate_manifest_shape(&v).is_err());

        let v = json!({"run_id": "x", "timestamp": "t", "seed": 1, "artifacts": []});
        assert!(validate_manifest_shape(&v).is_ok());
    }

    #[test]
    fn run_manifest_preserves_unknown_fields() {
        let v = json!({
            "run_id": "r1", "timestamp": "2024-01-01T00:00:00Z", "seed": 42,
            "artifacts": ["spec.json"], "custom_field": "kept"
        });
        let rm: RunManifest = serde_json::from_value(v).unwrap();
        assert_eq!(rm.extras.get("custom_field").unwrap(), "kept");
    }
}

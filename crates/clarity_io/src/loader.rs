//! Artifact loader: reads a run's `manifest.json` and `trace_pack.jsonl`,
//! validates required keys, and extracts the fields the metrics engine
//! needs (answer, justification, confidence score, output entropy).
//!
//! No network I/O; every path is local.

#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::hasher::sha256_file;
use crate::manifest::{self, RunManifest};
use crate::IoError;

/// One parsed line of a `trace_pack.jsonl` file.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub value: Value,
}

/// Load and validate a per-cell `manifest.json`.
pub fn load_manifest(path: &Path) -> Result<RunManifest, IoError> {
    manifest::load_run_manifest(path)
}

/// Load a `trace_pack.jsonl` file, validating that every non-empty line is
/// well-formed JSON. Blank lines are skipped.
pub fn load_trace_pack(path: &Path) -> Result<Vec<TraceRecord>, IoError> {
    let f = File::open(path).map_err(IoError::from)?;
    let reader = BufReader::new(f);
    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(IoError::from)?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(trimmed).map_err(|e| IoError::Json {
            pointer: format!("trace_pack.jsonl:{}", lineno + 1),
            msg: e.to_string(),
        })?;
        out.push(TraceRecord { value });
    }
    Ok(out)
}

/// SHA-256 of the raw bytes of an artifact file on disk (8 KiB streamed chunks).
pub fn hash_artifact(path: &Path) -> Result<String, IoError> {
    if !path.is_file() {
        return Err(IoError::ArtifactAbsent(path.display().to_string()));
    }
    sha256_file(path)
}

/// Extract the model's answer from the last trace record only: `output`
/// takes precedence over `answer`; both must be non-empty strings. Fails
/// if there are no records or neither field is a usable string.
pub fn extract_answer(records: &[TraceRecord]) -> Result<String, IoError> {
    let last = records.last().ok_or_else(|| IoError::MissingField {
        context: "trace_pack.jsonl".into(),
        field: "<no records>".into(),
    })?;

    if let Some(output) = last.value.get("output").and_then(Value::as_str) {
        if !output.is_empty() {
            return Ok(output.to_string());
        }
    }
    if let Some(answer) = last.value.get("answer").and_then(Value::as_str) {
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
    }
    Err(IoError::MissingField { context: "trace_pack.jsonl last record".into(), field: "output/answer".into() })
}

/// Extract the model's justification from the last trace record only.
/// Missing → `""`. Present but non-string → coerced via its JSON
/// rendering. Never falls back to `output`.
pub fn extract_justification(records: &[TraceRecord]) -> Result<String, IoError> {
    let last = records.last().ok_or_else(|| IoError::MissingField {
        context: "trace_pack.jsonl".into(),
        field: "<no records>".into(),
    })?;

    Ok(match last.value.get("justification") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    })
}

/// Extract a rich-mode confidence score from the last trace record only,
/// preferring a nested `rich_summary.confidence_score` over a top-level
/// `confidence_score`.
pub fn extract_confidence_score(records: &[TraceRecord]) -> Option<f64> {
    let last = records.last()?;
    last.value
        .get("rich_summary")
        .and_then(|rs| rs.get("confidence_score"))
        .and_then(Value::as_f64)
        .or_else(|| last.value.get("confidence_score").and_then(Value::as_f64))
}

/// Extract a rich-mode output entropy from the last trace record only,
/// preferring a nested `rich_summary.output_entropy` over a top-level
/// `output_entropy`.
pub fn extract_output_entropy(records: &[TraceRecord]) -> Option<f64> {
    let last = records.last()?;
    last.value
        .get("rich_summary")
        .and_then(|rs| rs.get("output_entropy"))
        .and_then(Value::as_f64)
        .or_else(|| last.value.get("output_entropy").and_then(Value::as_f64))
}

/// Verify that every artifact named in a manifest exists as a file
/// relative to `run_dir`; returns the first missing artifact's name as an
/// error.
pub fn verify_artifacts_present(run_dir: &Path, manifest: &RunManifest) -> Result<(), IoError> {
    for artifact in &manifest.artifacts {
        let path = run_dir.join(artifact);
        if !path.is_file() {
            return Err(IoError::ArtifactAbsent(path.display().to_string()));
        }
    }
    Ok(())
}

/// CRLF→LF normalization used only by the demo-artifact checksum path
/// (spec §9 Open Question 2). Kept behind this single helper rather than
/// scattered ad hoc normalization.
pub fn normalize_line_endings(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' {
            if iter.peek() == Some(&&b'\n') {
                continue;
            }
            out.push(b'\n');
        } else {
            out.push(b);
        }
    }
    out
}

/// Compute the UPPERCASE hex SHA-256 checksums of every file directly
/// under `dir`, used to build a demo artifact's `checksums.json`.
pub fn compute_checksums(dir: &Path) -> Result<std::collections::BTreeMap<String, String>, IoError> {
    let mut out = std::collections::BTreeMap::new();
    for entry in fs::read_dir(dir).map_err(IoError::from)? {
        let entry = entry.map_err(IoError::from)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IoError::Invalid("non-utf8 filename".into()))?
            .to_string();
        let bytes = normalize_line_endings(&fs::read(&path).map_err(IoError::from)?);
        let hex = crate::hasher::sha256_hex(&bytes).to_uppercase();
        out.insert(name, hex);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> TraceRecord {
        TraceRecord { value: v }
    }

    #[test]
    fn extract_answer_uses_last_record_only() {
        let records = vec![
            rec(json!({"answer": "A"})),
            rec(json!({"answer": "B"})),
        ];
        assert_eq!(extract_answer(&records).unwrap(), "B");
    }

    #[test]
    fn extract_answer_prefers_output_over_answer() {
        let records = vec![rec(json!({"answer": "A"})), rec(json!({"output": "B"}))];
        assert_eq!(extract_answer(&records).unwrap(), "B");
    }

    #[test]
    fn extract_answer_fails_when_last_record_has_neither_field() {
        let records = vec![rec(json!({"answer": "A"})), rec(json!({"other": "x"}))];
        assert!(extract_answer(&records).is_err());
    }

    #[test]
    fn extract_justification_missing_is_empty_string() {
        let records = vec![rec(json!({"answer": "A"}))];
        assert_eq!(extract_justification(&records).unwrap(), "");
    }

    #[test]
    fn extract_justification_coerces_non_string() {
        let records = vec![rec(json!({"justification": 42}))];
        assert_eq!(extract_justification(&records).unwrap(), "42");
    }

    #[test]
    fn extract_confidence_score_prefers_rich_summary() {
        let records = vec![rec(json!({
            "confidence_score": 0.1,
            "rich_summary": {"confidence_score": 0.9}
        }))];
        assert_eq!(extract_confidence_score(&records), Some(0.9));
    }

    #[test]
    fn normalize_line_endings_collapses_crlf() {
        assert_eq!(normalize_line_endings(b"a\r\nb\rc\n"), b"a\nb\nc\n");
    }
}

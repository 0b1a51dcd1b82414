use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn cache_clear_on_empty_dir_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("clarity")
        .unwrap()
        .args(["cache", "clear", "--cache-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("cache cleared"));
}

#[test]
fn cache_inspect_reports_absent_entry() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("clarity")
        .unwrap()
        .args(["cache", "inspect", "--cache-dir"])
        .arg(dir.path())
        .args(["--key", "nope"])
        .assert()
        .success()
        .stdout(predicate::str::contains("present=false"));
}

#[test]
fn sweep_rejects_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("clarity")
        .unwrap()
        .args(["sweep", "--config", "does-not-exist.json", "--output"])
        .arg(dir.path())
        .assert()
        .failure()
        .code(1);
}

#[test]
fn probe_rejects_unknown_baseline() {
    let fixtures = tempfile::tempdir().unwrap();
    std::fs::write(fixtures.path().join("registry.json"), r#"{"baselines":{}}"#).unwrap();
    let output = fixtures.path().join("out.json");
    Command::cargo_bin("clarity")
        .unwrap()
        .args(["probe", "--fixtures"])
        .arg(fixtures.path())
        .args(["--baseline-id", "missing", "--axis", "brightness", "--value", "1.0", "--output"])
        .arg(&output)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn build_report_rejects_missing_sweep_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.json");
    Command::cargo_bin("clarity")
        .unwrap()
        .args(["build-report", "--sweep-dir"])
        .arg(dir.path())
        .args([
            "--case-id",
            "c1",
            "--title",
            "t",
            "--adapter-id",
            "a1",
            "--r2l-sha",
            "deadbeef",
            "--generated-at",
            "2025-01-01T00:00:00Z",
            "--output",
        ])
        .arg(&output)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn build_report_computes_report_from_sweep() {
    use std::collections::BTreeMap;

    use clarity_io::manifest::{SweepManifestFile, SweepRunRecord};
    use clarity_pipeline::sweep::build_run_directory_name;
    use serde_json::json;

    let sweep_dir = tempfile::tempdir().unwrap();

    let mut v0p8 = BTreeMap::new();
    v0p8.insert("brightness".to_string(), json!(0.8));
    let cell0 = sweep_dir.path().join(build_run_directory_name(&v0p8, 1));
    std::fs::create_dir_all(&cell0).unwrap();
    std::fs::write(cell0.join("trace_pack.jsonl"), r#"{"output":"A","justification":"x"}"#).unwrap();

    let mut v1p0 = BTreeMap::new();
    v1p0.insert("brightness".to_string(), json!(1.0));
    let cell1 = sweep_dir.path().join(build_run_directory_name(&v1p0, 1));
    std::fs::create_dir_all(&cell1).unwrap();
    std::fs::write(cell1.join("trace_pack.jsonl"), r#"{"output":"B","justification":"xy"}"#).unwrap();

    let mut axes = BTreeMap::new();
    axes.insert("brightness".to_string(), vec![json!(0.8), json!(1.0)]);
    let manifest = SweepManifestFile {
        axes,
        seeds: vec![1],
        runs: vec![
            SweepRunRecord { axis_values: v0p8, seed: 1, manifest_hash: String::new() },
            SweepRunRecord { axis_values: v1p0, seed: 1, manifest_hash: String::new() },
        ],
    };
    std::fs::write(
        sweep_dir.path().join("sweep_manifest.json"),
        serde_json::to_vec(&manifest.to_value().unwrap()).unwrap(),
    )
    .unwrap();

    let output = sweep_dir.path().join("report.json");
    Command::cargo_bin("clarity")
        .unwrap()
        .args(["build-report", "--sweep-dir"])
        .arg(sweep_dir.path())
        .args([
            "--case-id",
            "c1",
            "--title",
            "t",
            "--adapter-id",
            "a1",
            "--r2l-sha",
            "deadbeef",
            "--generated-at",
            "2025-01-01T00:00:00Z",
            "--output",
        ])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("robustness surfaces"));

    let report: serde_json::Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(report["robustness_surfaces"][0]["axis"], "brightness");
    assert!(output.with_file_name("gradients.json").is_file());
}

#[test]
fn report_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");
    let heatmap_path = dir.path().join("heatmap.json");
    std::fs::write(&report_path, "{not json").unwrap();
    std::fs::write(&heatmap_path, "[[0.0]]").unwrap();
    Command::cargo_bin("clarity")
        .unwrap()
        .args(["report", "--report"])
        .arg(&report_path)
        .args(["--heatmap"])
        .arg(&heatmap_path)
        .args(["--output"])
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .code(1);
}

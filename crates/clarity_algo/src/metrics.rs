//! ESI (Exact Stability Index) and Drift metrics (spec §4.6), plus the
//! rich-mode CSI (Confidence Stability Index) and EDM (Entropy Drift
//! Metric) variants.

use std::collections::BTreeMap;

use clarity_core::{population_variance, round8};

use crate::{AlgoError, AlgoResult};

/// Unicode-scalar-based Levenshtein distance between two strings.
/// Single-row dynamic-programming implementation.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Levenshtein distance normalized to `[0, 1]`: `distance / max(len_a, len_b)`.
/// Both-empty strings normalize to `0.0`.
pub fn normalized_levenshtein(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    levenshtein(a, b) as f64 / max_len as f64
}

/// One perturbed run's observed answer/justification, keyed by its axis
/// value bucket.
#[derive(Debug, Clone)]
pub struct RunObservation {
    pub axis_value_key: String,
    pub answer: String,
    pub justification: String,
}

/// ESI for one axis: exact-match stability, bucketed per axis value.
#[derive(Debug, Clone, PartialEq)]
pub struct ESIMetric {
    pub axis: String,
    pub value_scores: BTreeMap<String, f64>,
    pub overall_score: f64,
}

/// Drift for one axis: normalized-edit-distance instability, bucketed per
/// axis value.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftMetric {
    pub axis: String,
    pub value_scores: BTreeMap<String, f64>,
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsResult {
    pub esi: ESIMetric,
    pub drift: DriftMetric,
}

/// Compute ESI and Drift for one axis's sweep runs against the axis
/// baseline (the run whose `axis_value_key` equals `baseline_key`).
///
/// Per axis-value bucket: ESI is the fraction of runs whose `answer`
/// exactly matches the baseline answer; Drift is the mean normalized
/// Levenshtein distance between each run's justification and the
/// baseline justification. `overall_score` is the unweighted mean across
/// bucket scores.
pub fn compute_metrics(
    axis: &str,
    baseline_answer: &str,
    baseline_justification: &str,
    runs: &[RunObservation],
) -> AlgoResult<MetricsResult> {
    if runs.is_empty() {
        return Err(AlgoError::Metric(format!("axis {axis} has no runs")));
    }

    let mut buckets: BTreeMap<String, Vec<&RunObservation>> = BTreeMap::new();
    for run in runs {
        buckets.entry(run.axis_value_key.clone()).or_default().push(run);
    }

    let mut esi_scores = BTreeMap::new();
    let mut drift_scores = BTreeMap::new();
    for (key, bucket_runs) in &buckets {
        let n = bucket_runs.len() as f64;
        let exact_matches = bucket_runs
            .iter()
            .filter(|r| r.answer == baseline_answer)
            .count() as f64;
        esi_scores.insert(key.clone(), round8(exact_matches / n));

        let mean_distance = bucket_runs
            .iter()
            .map(|r| normalized_levenshtein(&r.justification, baseline_justification))
            .sum::<f64>()
            / n;
        drift_scores.insert(key.clone(), round8(mean_distance));
    }

    let esi_overall = round8(mean_of(esi_scores.values().copied()));
    let drift_overall = round8(mean_of(drift_scores.values().copied()));

    Ok(MetricsResult {
        esi: ESIMetric {
            axis: axis.to_string(),
            value_scores: esi_scores,
            overall_score: esi_overall,
        },
        drift: DriftMetric {
            axis: axis.to_string(),
            value_scores: drift_scores,
            overall_score: drift_overall,
        },
    })
}

fn mean_of<I: Iterator<Item = f64>>(values: I) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// CSI: Confidence Stability Index, the rich-mode analogue of ESI that
/// measures bucketed stability of the model's self-reported confidence
/// score rather than its answer text.
#[derive(Debug, Clone, PartialEq)]
pub struct CSIMetric {
    pub axis: String,
    pub value_scores: BTreeMap<String, f64>,
    pub overall_score: f64,
    pub mean_confidence: Option<f64>,
}

/// EDM: Entropy Drift Metric, the rich-mode analogue of Drift that
/// measures bucketed instability of the model's output entropy.
#[derive(Debug, Clone, PartialEq)]
pub struct EDMMetric {
    pub axis: String,
    pub value_scores: BTreeMap<String, f64>,
    pub overall_score: f64,
    pub baseline_entropy: Option<f64>,
}

/// Maximum possible population variance for values confined to `[0, 1]`
/// (achieved when half the values are 0 and half are 1).
const MAX_CONFIDENCE_VARIANCE: f64 = 0.25;

/// Compute CSI from per-bucket confidence scores: bucket score is
/// `1 - min(1, variance(confidences) / 0.25)`, i.e. the population
/// variance of the bucket's own confidences normalized against the
/// maximum variance attainable in `[0, 1]`. A bucket with fewer than two
/// observations is perfectly stable by definition and scores `1.0`.
pub fn compute_csi(
    axis: &str,
    baseline_confidence: f64,
    buckets: &BTreeMap<String, Vec<f64>>,
) -> CSIMetric {
    let mut value_scores = BTreeMap::new();
    for (key, confidences) in buckets {
        let score = if confidences.len() < 2 {
            1.0
        } else {
            let variance = population_variance(confidences);
            1.0 - (variance / MAX_CONFIDENCE_VARIANCE).min(1.0)
        };
        value_scores.insert(key.clone(), round8(score));
    }
    let overall = round8(mean_of(value_scores.values().copied()));
    CSIMetric {
        axis: axis.to_string(),
        value_scores,
        overall_score: overall,
        mean_confidence: Some(round8(baseline_confidence)),
    }
}

/// Compute EDM from per-bucket output entropies relative to a baseline
/// entropy: bucket score is the mean absolute entropy delta.
pub fn compute_edm(
    axis: &str,
    baseline_entropy: f64,
    buckets: &BTreeMap<String, Vec<f64>>,
) -> EDMMetric {
    let mut value_scores = BTreeMap::new();
    for (key, entropies) in buckets {
        let mean_delta = mean_of(entropies.iter().map(|e| (e - baseline_entropy).abs()));
        value_scores.insert(key.clone(), round8(mean_delta));
    }
    let overall = round8(mean_of(value_scores.values().copied()));
    EDMMetric {
        axis: axis.to_string(),
        value_scores,
        overall_score: overall,
        baseline_entropy: Some(round8(baseline_entropy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_of_equal_strings_is_zero() {
        assert_eq!(levenshtein("abc", "abc"), 0);
    }

    #[test]
    fn normalized_levenshtein_both_empty_is_zero() {
        assert_eq!(normalized_levenshtein("", ""), 0.0);
    }

    // Scenario B from spec §8: three runs answers ["A","A","B"] vs baseline
    // "A", justifications ["x","x","xy"].
    #[test]
    fn scenario_b_esi_and_drift() {
        let runs = vec![
            RunObservation { axis_value_key: "0p8".into(), answer: "A".into(), justification: "x".into() },
            RunObservation { axis_value_key: "1p0".into(), answer: "A".into(), justification: "x".into() },
            RunObservation { axis_value_key: "1p2".into(), answer: "B".into(), justification: "xy".into() },
        ];
        let result = compute_metrics("brightness", "A", "x", &runs).unwrap();
        assert_eq!(result.esi.value_scores.get("0p8"), Some(&1.0));
        assert_eq!(result.esi.value_scores.get("1p0"), Some(&1.0));
        assert_eq!(result.esi.value_scores.get("1p2"), Some(&0.0));
        assert!((result.esi.overall_score - 0.66666667).abs() < 1e-6);

        assert_eq!(result.drift.value_scores.get("0p8"), Some(&0.0));
        assert_eq!(result.drift.value_scores.get("1p0"), Some(&0.0));
        assert_eq!(result.drift.value_scores.get("1p2"), Some(&0.5));
        assert!((result.drift.overall_score - 0.16666667).abs() < 1e-6);
    }

    #[test]
    fn csi_normalizes_variance_against_quarter() {
        let mut buckets = BTreeMap::new();
        buckets.insert("1p0".to_string(), vec![0.9, 0.1]);
        let metric = compute_csi("brightness", 0.5, &buckets);
        assert_eq!(metric.value_scores.get("1p0"), Some(&0.36));
    }

    #[test]
    fn csi_single_observation_is_perfectly_stable() {
        let mut buckets = BTreeMap::new();
        buckets.insert("1p0".to_string(), vec![0.7]);
        let metric = compute_csi("brightness", 0.7, &buckets);
        assert_eq!(metric.value_scores.get("1p0"), Some(&1.0));
    }
}

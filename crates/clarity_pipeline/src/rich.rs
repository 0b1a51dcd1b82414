//! Rich-generation metrics plumbing (spec §4.14): optional logits-derived
//! metrics, gated behind environment-variable flags so that the default
//! pipeline never depends on a model's raw logits being available.

use std::env;

use clarity_io::hasher::sha256_stream_floats;

const RICH_MODE_VAR: &str = "CLARITY_RICH_MODE";
const RICH_LOGITS_HASH_VAR: &str = "CLARITY_RICH_LOGITS_HASH";

fn env_flag_enabled(var: &str) -> bool {
    match env::var(var) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => false,
    }
}

/// Whether rich-generation metrics (entropy, mean logprob, confidence
/// score) should be computed at all.
pub fn is_rich_mode_enabled() -> bool {
    env_flag_enabled(RICH_MODE_VAR)
}

/// Whether the raw logits tensor should additionally be hashed into the
/// summary (expensive; off unless both rich mode and this flag are set).
pub fn is_rich_logits_hash_enabled() -> bool {
    is_rich_mode_enabled() && env_flag_enabled(RICH_LOGITS_HASH_VAR)
}

/// Shannon entropy (natural log, nats) of a per-token probability
/// distribution. Zero-probability tokens are skipped (0 * ln(0) := 0).
pub fn compute_entropy(token_probs: &[f64]) -> f64 {
    -token_probs
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.ln())
        .sum::<f64>()
}

/// Mean log-probability of the selected tokens across a generation.
pub fn compute_mean_logprob(token_logprobs: &[f64]) -> f64 {
    if token_logprobs.is_empty() {
        return 0.0;
    }
    token_logprobs.iter().sum::<f64>() / token_logprobs.len() as f64
}

/// Confidence score derived from mean log-probability: `exp(mean_logprob)`,
/// clamped to `[0, 1]` since floating drift can push it a hair past 1.0.
pub fn compute_confidence_score(mean_logprob: f64) -> f64 {
    mean_logprob.exp().clamp(0.0, 1.0)
}

/// A deterministic content hash of a rich-generation logits tensor, using
/// the stable float representation so it matches across architectures
/// (spec §4.2).
pub fn compute_summary_hash<I: IntoIterator<Item = f64>>(logits: I) -> String {
    sha256_stream_floats(logits)
}

/// Rich-generation metrics actually computed for one run. Fields are
/// `Option` so a run with rich mode off serializes with all of them
/// omitted rather than null.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct RichMetricsSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entropy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_logprob: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logits_hash: Option<String>,
}

/// The full rich-generation result for one run: the summary plus whatever
/// raw inputs were available, gated by the environment flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RichGenerationResult {
    pub summary: RichMetricsSummary,
}

/// Build a `RichGenerationResult` from a run's token probabilities,
/// logprobs, and (optionally) its raw logits tensor, honoring the
/// environment-variable gates.
pub fn build_rich_generation_result(
    token_probs: &[f64],
    token_logprobs: &[f64],
    raw_logits: Option<&[f64]>,
) -> RichGenerationResult {
    if !is_rich_mode_enabled() {
        return RichGenerationResult::default();
    }

    let entropy = clarity_core::round8(compute_entropy(token_probs));
    let mean_logprob = clarity_core::round8(compute_mean_logprob(token_logprobs));
    let confidence_score = clarity_core::round8(compute_confidence_score(mean_logprob));

    let logits_hash = if is_rich_logits_hash_enabled() {
        raw_logits.map(|logits| compute_summary_hash(logits.iter().copied()))
    } else {
        None
    };

    RichGenerationResult {
        summary: RichMetricsSummary {
            entropy: Some(entropy),
            mean_logprob: Some(mean_logprob),
            confidence_score: Some(confidence_score),
            logits_hash,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn entropy_of_uniform_distribution() {
        let probs = vec![0.25, 0.25, 0.25, 0.25];
        let entropy = compute_entropy(&probs);
        assert!((entropy - (4.0f64).ln()).abs() < 1e-9);
    }

    #[test]
    fn confidence_score_clamps_to_one() {
        assert_eq!(compute_confidence_score(1.0), 1.0);
    }

    #[test]
    #[serial]
    fn rich_mode_off_by_default() {
        env::remove_var(RICH_MODE_VAR);
        let result = build_rich_generation_result(&[0.5, 0.5], &[-0.1, -0.2], None);
        assert_eq!(result, RichGenerationResult::default());
    }

    #[test]
    #[serial]
    fn rich_mode_on_populates_summary() {
        env::set_var(RICH_MODE_VAR, "true");
        let result = build_rich_generation_result(&[0.5, 0.5], &[-0.1, -0.2], None);
        assert!(result.summary.entropy.is_some());
        assert!(result.summary.logits_hash.is_none());
        env::remove_var(RICH_MODE_VAR);
    }
}

//! Gradient engine (spec §4.8): finite-difference gradients of a metric
//! across an axis's ordered values.
//!
//! Rule varies by axis length:
//! - `n == 1`: gradient is zero.
//! - `n == 2`: both endpoints receive the *same* forward-difference delta
//!   (not independently computed forward/backward values).
//! - `n >= 3`: forward difference at the first point, central difference
//!   for interior points, backward difference at the last point.

use clarity_core::round8;

use crate::{AlgoError, AlgoResult};

#[derive(Debug, Clone, PartialEq)]
pub struct GradientPoint {
    pub value_key: String,
    pub gradient: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisGradient {
    pub axis: String,
    pub points: Vec<GradientPoint>,
    pub mean_abs_gradient: f64,
    pub max_abs_gradient: f64,
}

/// Compute the index-based gradient of `scores` (axis-ordered, one score
/// per declared axis value). The axis's actual numeric values play no
/// part in the formula — only their order does.
pub fn compute_gradient(axis: &str, value_keys: &[String], scores: &[f64]) -> AlgoResult<AxisGradient> {
    if value_keys.len() != scores.len() {
        return Err(AlgoError::Gradient(format!("axis {axis}: value_keys/scores length mismatch")));
    }
    let n = scores.len();
    if n == 0 {
        return Err(AlgoError::Gradient(format!("axis {axis} has no points")));
    }

    let gradients: Vec<f64> = match n {
        1 => vec![0.0],
        2 => {
            let d = scores[1] - scores[0];
            vec![d, d]
        }
        _ => {
            let mut out = Vec::with_capacity(n);
            // forward at first point
            out.push(scores[1] - scores[0]);
            // central differences for interior points
            for i in 1..n - 1 {
                out.push((scores[i + 1] - scores[i - 1]) / 2.0);
            }
            // backward at last point
            out.push(scores[n - 1] - scores[n - 2]);
            out
        }
    };

    let points: Vec<GradientPoint> = value_keys
        .iter()
        .zip(gradients.iter())
        .map(|(k, g)| GradientPoint { value_key: k.clone(), gradient: round8(*g) })
        .collect();

    let abs_vals: Vec<f64> = points.iter().map(|p| p.gradient.abs()).collect();
    let mean_abs = round8(abs_vals.iter().sum::<f64>() / abs_vals.len() as f64);
    let max_abs = round8(abs_vals.iter().cloned().fold(0.0, f64::max));

    Ok(AxisGradient {
        axis: axis.to_string(),
        points,
        mean_abs_gradient: mean_abs,
        max_abs_gradient: max_abs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_on_constant_scores_is_zero() {
        let keys = vec!["a".into(), "b".into(), "c".into()];
        let scores = vec![0.5, 0.5, 0.5];
        let g = compute_gradient("x", &keys, &scores).unwrap();
        assert!(g.points.iter().all(|p| p.gradient == 0.0));
    }

    #[test]
    fn gradient_on_linear_scores_is_constant_step() {
        let keys = vec!["a".into(), "b".into(), "c".into()];
        let scores = vec![0.0, 1.0, 2.0];
        let g = compute_gradient("x", &keys, &scores).unwrap();
        assert!(g.points.iter().all(|p| (p.gradient - 1.0).abs() < 1e-9));
    }

    // Scenario C from spec §8.
    #[test]
    fn scenario_c_four_point_gradient() {
        let keys: Vec<String> = (0..4).map(|i| i.to_string()).collect();
        let scores = vec![0.0, 0.25, 0.75, 1.0];
        let g = compute_gradient("x", &keys, &scores).unwrap();
        let expected = [0.25, 0.375, 0.375, 0.25];
        for (p, e) in g.points.iter().zip(expected.iter()) {
            assert!((p.gradient - e).abs() < 1e-8, "{} vs {}", p.gradient, e);
        }
        assert!((g.mean_abs_gradient - 0.3125).abs() < 1e-8);
        assert!((g.max_abs_gradient - 0.375).abs() < 1e-8);
    }

    #[test]
    fn n_equals_two_shares_one_delta() {
        let keys = vec!["a".into(), "b".into()];
        let scores = vec![0.0, 1.0];
        let g = compute_gradient("x", &keys, &scores).unwrap();
        assert_eq!(g.points[0].gradient, g.points[1].gradient);
        assert!((g.points[0].gradient - 1.0).abs() < 1e-9);
    }
}

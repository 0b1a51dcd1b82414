//! Robustness surface engine (spec §4.7): joins per-axis metric results
//! into a `RobustnessSurface`, with per-axis and global population
//! statistics (mean/variance, not sample statistics, and the global
//! figures are computed over the flattened value set — never as a
//! mean-of-per-axis-means).

use std::collections::BTreeMap;

use clarity_core::{population_mean, population_variance, round8};

use crate::{AlgoError, AlgoResult};

#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePoint {
    pub value_key: String,
    pub esi: f64,
    pub drift: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisSurface {
    pub axis: String,
    pub points: Vec<SurfacePoint>,
    pub mean_esi: f64,
    pub variance_esi: f64,
    pub mean_drift: f64,
    pub variance_drift: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RobustnessSurface {
    pub axes: Vec<AxisSurface>,
    pub global_mean_esi: f64,
    pub global_variance_esi: f64,
    pub global_mean_drift: f64,
    pub global_variance_drift: f64,
}

/// Build a `RobustnessSurface` from, for each axis, the axis name and its
/// ESI/Drift value-score maps (as produced by
/// `clarity_algo::metrics::compute_metrics`). Every axis's value-score map
/// must share exactly the same set of keys (its declared axis values);
/// violating this is a join error.
pub fn build_surface(
    axes: &[(String, BTreeMap<String, f64>, BTreeMap<String, f64>)],
) -> AlgoResult<RobustnessSurface> {
    if axes.is_empty() {
        return Err(AlgoError::Surface("no axes supplied".into()));
    }

    let mut axis_surfaces = Vec::with_capacity(axes.len());
    let mut all_esi = Vec::new();
    let mut all_drift = Vec::new();

    for (axis, esi_scores, drift_scores) in axes {
        let esi_keys: Vec<&String> = esi_scores.keys().collect();
        let drift_keys: Vec<&String> = drift_scores.keys().collect();
        if esi_keys != drift_keys {
            return Err(AlgoError::Surface(format!(
                "axis {axis}: esi and drift value-score keys do not match"
            )));
        }

        let mut points = Vec::with_capacity(esi_scores.len());
        let mut esi_vals = Vec::with_capacity(esi_scores.len());
        let mut drift_vals = Vec::with_capacity(drift_scores.len());
        for (key, esi) in esi_scores {
            let drift = *drift_scores.get(key).expect("keys validated equal above");
            points.push(SurfacePoint {
                value_key: key.clone(),
                esi: *esi,
                drift,
            });
            esi_vals.push(*esi);
            drift_vals.push(drift);
            all_esi.push(*esi);
            all_drift.push(drift);
        }

        axis_surfaces.push(AxisSurface {
            axis: axis.clone(),
            points,
            mean_esi: round8(population_mean(&esi_vals)),
            variance_esi: round8(population_variance(&esi_vals)),
            mean_drift: round8(population_mean(&drift_vals)),
            variance_drift: round8(population_variance(&drift_vals)),
        });
    }

    Ok(RobustnessSurface {
        axes: axis_surfaces,
        global_mean_esi: round8(population_mean(&all_esi)),
        global_variance_esi: round8(population_variance(&all_esi)),
        global_mean_drift: round8(population_mean(&all_drift)),
        global_variance_drift: round8(population_variance(&all_drift)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_variance_is_not_mean_of_axis_variances() {
        let mut a = BTreeMap::new();
        a.insert("0p8".to_string(), 1.0);
        a.insert("1p0".to_string(), 0.0);
        let mut b = BTreeMap::new();
        b.insert("0p8".to_string(), 0.0);
        b.insert("1p0".to_string(), 0.0);

        let surface = build_surface(&[
            ("brightness".to_string(), a.clone(), a.clone()),
            ("contrast".to_string(), b.clone(), b.clone()),
        ])
        .unwrap();

        // global esi values flattened: [1,0,0,0] -> mean 0.25, var 0.1875
        assert!((surface.global_mean_esi - 0.25).abs() < 1e-9);
        assert!((surface.global_variance_esi - 0.1875).abs() < 1e-9);
    }

    #[test]
    fn mismatched_keys_is_an_error() {
        let mut a = BTreeMap::new();
        a.insert("0p8".to_string(), 1.0);
        let mut b = BTreeMap::new();
        b.insert("1p0".to_string(), 1.0);
        assert!(build_surface(&[("brightness".to_string(), a, b)]).is_err());
    }
}

//! clarity_core — Core types and determinism primitives shared across the
//! CLARITY workspace.
//!
//! This crate is I/O-free. It defines the `round8` rounding rule, the
//! filesystem-safe axis-value encoder, and the error type shared by layers
//! that have no need for a richer, I/O-aware error (see `clarity_io::IoError`
//! for that).
//!
//! Serialization derives are gated behind the `serde` feature.

use thiserror::Error;

/// Minimal error set for core-domain validation.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum CoreError {
    #[error("value is not finite: {0}")]
    NotFinite(&'static str),
    #[error("invalid axis name: {0}")]
    InvalidAxisName(String),
    #[error("empty axis values")]
    EmptyAxisValues,
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Half-even ("banker's") rounding to 8 fractional decimal digits.
///
/// This is the single rounding rule used everywhere a float crosses a
/// serialization or comparison boundary in CLARITY. It replaces the nine
/// independent `_round8` re-definitions found in the original Python
/// implementation with one shared function.
pub fn round8(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    const SCALE: f64 = 1e8;
    let scaled = value * SCALE;
    let floor = scaled.floor();
    let diff = scaled - floor;
    let rounded = if (diff - 0.5).abs() < f64::EPSILON {
        // Exactly halfway: round to even.
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / SCALE
}

/// Round every value of an iterator via [`round8`], collecting into a `Vec`.
pub fn round8_all<I: IntoIterator<Item = f64>>(values: I) -> Vec<f64> {
    values.into_iter().map(round8).collect()
}

/// Filesystem-safe encoding of a sweep axis value for directory names.
///
/// Rule (applied in order): stringify the value (integers without a
/// trailing `.0`, floats via their natural `Display`), replace `.` with
/// `p`, replace `-` with `m`, drop whitespace, then keep only
/// `[A-Za-z0-9_]` characters. This is a best-effort, collision-tolerant
/// encoding — callers are responsible for ensuring the axis's declared
/// values don't collide after encoding (the sweep orchestrator enforces
/// this, see `clarity_pipeline::sweep`).
pub fn encode_axis_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_whitespace() {
            continue;
        }
        let mapped = match ch {
            '.' => 'p',
            '-' => 'm',
            other => other,
        };
        if mapped.is_ascii_alphanumeric() || mapped == '_' {
            out.push(mapped);
        }
    }
    out
}

/// Format an f64 the way sweep axis values are stringified before encoding:
/// integral values print without a trailing `.0`, everything else prints
/// via the natural `f64` `Display` implementation.
pub fn format_axis_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Validate a sweep axis name: non-empty, starts with a letter, and
/// contains only `[A-Za-z0-9_]` afterwards.
pub fn validate_axis_name(name: &str) -> CoreResult<()> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(CoreError::InvalidAxisName(name.to_string())),
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(CoreError::InvalidAxisName(name.to_string()))
    }
}

/// Population mean of a non-empty slice (not sample mean / not Bessel-corrected).
pub fn population_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance of a non-empty slice (divide by `n`, not `n - 1`).
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = population_mean(values);
    let sum_sq = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    sum_sq / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round8_is_a_fixed_point() {
        let v = round8(0.123456785);
        assert_eq!(round8(v), v);
    }

    #[test]
    fn round8_handles_non_finite() {
        assert!(round8(f64::NAN).is_nan());
        assert_eq!(round8(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn encode_axis_value_maps_dots_and_dashes() {
        assert_eq!(encode_axis_value("0.8"), "0p8");
        assert_eq!(encode_axis_value("-1.2"), "m1p2");
        assert_eq!(encode_axis_value("1.0"), "1p0");
    }

    #[test]
    fn format_axis_number_strips_trailing_zero() {
        assert_eq!(format_axis_number(1.0), "1");
        assert_eq!(format_axis_number(0.8), "0.8");
    }

    #[test]
    fn validate_axis_name_rejects_leading_digit() {
        assert!(validate_axis_name("brightness").is_ok());
        assert!(validate_axis_name("0brightness").is_err());
        assert!(validate_axis_name("bright ness").is_err());
    }

    #[test]
    fn population_variance_is_not_mean_of_means() {
        let a = population_variance(&[1.0, 2.0, 3.0]);
        assert!((a - 2.0 / 3.0).abs() < 1e-9);
    }
}

//! Counterfactual engine (spec §4.9): grid mask generation, mask
//! application over RGB pixel buffers, and probe-result/probe-surface
//! aggregation.

use clarity_core::{population_mean, population_variance, round8};

use crate::{AlgoError, AlgoResult};

/// Gray fill value used to mask a grid cell, matching the original's
/// `MASK_FILL_VALUE`.
pub const MASK_FILL_VALUE: u8 = 128;

/// A single grid cell mask: normalized `[0,1]` bounding box, with the grid
/// row/column it was generated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMask {
    pub row: usize,
    pub col: usize,
    pub grid_size: usize,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl RegionMask {
    pub fn region_id(&self) -> String {
        format!("grid_r{}_c{}_k{}", self.row, self.col, self.grid_size)
    }
}

/// Generate the `grid_size × grid_size` row-major masks covering `[0,1]^2`,
/// with boundaries snapped exactly to `0.0`/`1.0` at the grid edges.
pub fn generate_grid_masks(grid_size: usize) -> AlgoResult<Vec<RegionMask>> {
    if grid_size == 0 {
        return Err(AlgoError::Counterfactual("grid_size must be >= 1".into()));
    }
    let step = 1.0 / grid_size as f64;
    let mut out = Vec::with_capacity(grid_size * grid_size);
    for row in 0..grid_size {
        for col in 0..grid_size {
            let x_min = if col == 0 { 0.0 } else { col as f64 * step };
            let y_min = if row == 0 { 0.0 } else { row as f64 * step };
            let x_max = if col + 1 == grid_size { 1.0 } else { (col + 1) as f64 * step };
            let y_max = if row + 1 == grid_size { 1.0 } else { (row + 1) as f64 * step };
            out.push(RegionMask { row, col, grid_size, x_min, y_min, x_max, y_max });
        }
    }
    Ok(out)
}

/// An RGB image buffer, row-major, `width * height * 3` bytes.
#[derive(Debug, Clone)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u8; width * height * 3] }
    }

    fn idx(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * 3
    }
}

/// Apply a normalized-coordinate mask to `image`, filling the
/// corresponding pixel rectangle with [`MASK_FILL_VALUE`] in all three
/// channels. Pixel bounds are computed by truncating (not rounding) the
/// normalized bounds scaled by the image dimensions, then clamped to the
/// image extent.
pub fn apply_mask(image: &RgbImage, mask: &RegionMask) -> RgbImage {
    let mut out = image.clone();
    let px_x_min = ((mask.x_min * image.width as f64) as usize).min(image.width);
    let px_x_max = ((mask.x_max * image.width as f64) as usize).min(image.width);
    let px_y_min = ((mask.y_min * image.height as f64) as usize).min(image.height);
    let px_y_max = ((mask.y_max * image.height as f64) as usize).min(image.height);

    for y in px_y_min..px_y_max {
        for x in px_x_min..px_x_max {
            let i = out.idx(x, y);
            out.pixels[i] = MASK_FILL_VALUE;
            out.pixels[i + 1] = MASK_FILL_VALUE;
            out.pixels[i + 2] = MASK_FILL_VALUE;
        }
    }
    out
}

/// Result of probing a single masked cell against the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub row: usize,
    pub col: usize,
    pub delta_esi: f64,
    pub delta_drift: f64,
    pub masked_esi: f64,
    pub masked_drift: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSurface {
    pub grid_size: usize,
    pub total_probes: usize,
    pub mean_delta_esi: f64,
    pub mean_delta_drift: f64,
    pub variance_delta_esi: f64,
    pub variance_delta_drift: f64,
    pub probes: Vec<ProbeResult>,
}

/// Compute one probe's deltas against a baseline ESI/Drift pair.
pub fn compute_probe_result(
    row: usize,
    col: usize,
    baseline_esi: f64,
    baseline_drift: f64,
    masked_esi: f64,
    masked_drift: f64,
) -> ProbeResult {
    ProbeResult {
        row,
        col,
        delta_esi: round8(masked_esi - baseline_esi),
        delta_drift: round8(masked_drift - baseline_drift),
        masked_esi: round8(masked_esi),
        masked_drift: round8(masked_drift),
    }
}

/// Aggregate a set of probes (assumed row-major, one per grid cell) into a
/// `ProbeSurface`, computing population statistics over the deltas.
pub fn compute_probe_surface(grid_size: usize, probes: Vec<ProbeResult>) -> AlgoResult<ProbeSurface> {
    if probes.is_empty() {
        return Err(AlgoError::Counterfactual("no probes supplied".into()));
    }
    let delta_esi: Vec<f64> = probes.iter().map(|p| p.delta_esi).collect();
    let delta_drift: Vec<f64> = probes.iter().map(|p| p.delta_drift).collect();

    Ok(ProbeSurface {
        grid_size,
        total_probes: probes.len(),
        mean_delta_esi: round8(population_mean(&delta_esi)),
        mean_delta_drift: round8(population_mean(&delta_drift)),
        variance_delta_esi: round8(population_variance(&delta_esi)),
        variance_delta_drift: round8(population_variance(&delta_drift)),
        probes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_masks_snap_boundaries_exactly() {
        let masks = generate_grid_masks(3).unwrap();
        assert_eq!(masks.len(), 9);
        assert_eq!(masks[0].x_min, 0.0);
        assert_eq!(masks[0].y_min, 0.0);
        let last = masks.last().unwrap();
        assert_eq!(last.x_max, 1.0);
        assert_eq!(last.y_max, 1.0);
    }

    #[test]
    fn region_id_format() {
        let masks = generate_grid_masks(3).unwrap();
        assert_eq!(masks[0].region_id(), "grid_r0_c0_k3");
    }

    #[test]
    fn apply_mask_fills_rectangle() {
        let image = RgbImage::new(10, 10);
        let mask = RegionMask { row: 0, col: 0, grid_size: 2, x_min: 0.0, y_min: 0.0, x_max: 0.5, y_max: 0.5 };
        let masked = apply_mask(&image, &mask);
        let i = masked.idx(2, 2);
        assert_eq!(masked.pixels[i], MASK_FILL_VALUE);
        let i_outside = masked.idx(9, 9);
        assert_eq!(masked.pixels[i_outside], 0);
    }

    #[test]
    fn zero_grid_size_is_rejected() {
        assert!(generate_grid_masks(0).is_err());
    }
}

//! PNG rasterizer (spec §4.12): fixed-dimension, fixed-colormap, nearest
//! neighbor heatmap / surface-grid / probe-grid rendering. Identical input
//! always yields byte-identical PNG bytes: no antialiasing, no metadata
//! chunks, a fixed compression level.

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{ColorType, ImageEncoder, RgbImage};

use crate::{ReportError, ReportResult};
use crate::model::{ProbeResult, ReportRobustnessSurface};

pub const DEFAULT_HEATMAP_WIDTH: u32 = 200;
pub const DEFAULT_HEATMAP_HEIGHT: u32 = 200;
pub const DEFAULT_SURFACE_WIDTH: u32 = 400;
pub const DEFAULT_SURFACE_HEIGHT: u32 = 200;

const GRID_LINE_COLOR: [u8; 3] = [100, 100, 100];

fn value_to_color(value: f64) -> [u8; 3] {
    let value = value.clamp(0.0, 1.0);
    let r = (240.0 - (60.0 * value)) as u8;
    let g = (240.0 * (1.0 - value)) as u8;
    let b = (240.0 * (1.0 - value)) as u8;
    [r, g, b]
}

fn value_to_blue_red(value: f64) -> [u8; 3] {
    let value = value.clamp(-1.0, 1.0);
    if value < 0.0 {
        let t = -value;
        [
            (255.0 - 255.0 * t) as u8,
            (255.0 - 155.0 * t) as u8,
            (255.0 - 55.0 * t) as u8,
        ]
    } else {
        let t = value;
        [
            (255.0 - 55.0 * t) as u8,
            (255.0 - 205.0 * t) as u8,
            (255.0 - 205.0 * t) as u8,
        ]
    }
}

fn save_png_deterministic(img: &RgbImage) -> ReportResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut bytes, CompressionType::Default, PngFilterType::NoFilter);
    encoder
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)
        .map_err(|e| ReportError::Render(format!("png encode failed: {e}")))?;
    Ok(bytes)
}

/// Render a row-major `[0,1]` heatmap as PNG, nearest-neighbor scaled to
/// `width x height`.
pub fn render_heatmap_png(values: &[Vec<f64>], width: u32, height: u32) -> ReportResult<Vec<u8>> {
    if values.is_empty() || values[0].is_empty() {
        return Err(ReportError::Render("heatmap values array is empty".into()));
    }
    let input_height = values.len();
    let input_width = values[0].len();
    for (i, row) in values.iter().enumerate() {
        if row.len() != input_width {
            return Err(ReportError::Render(format!("row {i} has inconsistent width")));
        }
    }

    let mut img = RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    let x_scale = input_width as f64 / width as f64;
    let y_scale = input_height as f64 / height as f64;

    for py in 0..height {
        let src_y = ((py as f64 * y_scale) as usize).min(input_height - 1);
        for px in 0..width {
            let src_x = ((px as f64 * x_scale) as usize).min(input_width - 1);
            let value = clarity_core::round8(values[src_y][src_x]);
            img.put_pixel(px, py, image::Rgb(value_to_color(value)));
        }
    }

    save_png_deterministic(&img)
}

/// Render a robustness surface (alphabetically sorted axes, value-sorted
/// points) as a grid of ESI-colored cells with grid lines.
pub fn render_surface_png(surfaces: &[ReportRobustnessSurface], width: u32, height: u32) -> ReportResult<Vec<u8>> {
    if surfaces.is_empty() {
        return Err(ReportError::Render("axes list is empty".into()));
    }
    let mut sorted: Vec<&ReportRobustnessSurface> = surfaces.iter().collect();
    sorted.sort_by(|a, b| a.axis.cmp(&b.axis));

    let max_points = sorted.iter().map(|a| a.points.len()).max().unwrap_or(0);
    if max_points == 0 {
        return Err(ReportError::Render("no points in any axis".into()));
    }
    let num_axes = sorted.len() as u32;

    let cell_width = width / max_points as u32;
    let cell_height = height / num_axes;

    let mut img = RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));

    for (axis_idx, axis) in sorted.iter().enumerate() {
        let mut points = axis.points.clone();
        points.sort_by(|a, b| a.value.cmp(&b.value));

        for (point_idx, point) in points.iter().enumerate() {
            let esi = clarity_core::round8(point.esi);
            let color = value_to_color(esi);
            let x_start = point_idx as u32 * cell_width;
            let x_end = (x_start + cell_width).min(width);
            let y_start = axis_idx as u32 * cell_height;
            let y_end = (y_start + cell_height).min(height);
            for py in y_start..y_end {
                for px in x_start..x_end {
                    img.put_pixel(px, py, image::Rgb(color));
                }
            }
        }
    }

    for i in 0..=max_points as u32 {
        let x = (i * cell_width).min(width - 1);
        for py in 0..height {
            img.put_pixel(x, py, image::Rgb(GRID_LINE_COLOR));
        }
    }
    for i in 0..=num_axes {
        let y = (i * cell_height).min(height - 1);
        for px in 0..width {
            img.put_pixel(px, y, image::Rgb(GRID_LINE_COLOR));
        }
    }

    save_png_deterministic(&img)
}

/// Render a counterfactual probe grid as a diverging blue-white-red PNG,
/// normalized by the global `max(|delta_esi|)`.
pub fn render_probe_grid_png(probes: &[ProbeResult], grid_size: usize, width: u32, height: u32) -> ReportResult<Vec<u8>> {
    if grid_size < 1 {
        return Err(ReportError::Render(format!("invalid grid size: {grid_size}")));
    }
    if probes.is_empty() {
        return Err(ReportError::Render("probes list is empty".into()));
    }

    let mut grid = vec![vec![0.0f64; grid_size]; grid_size];
    for probe in probes {
        if probe.row < grid_size && probe.col < grid_size {
            grid[probe.row][probe.col] = clarity_core::round8(probe.delta_esi);
        }
    }

    let cell_width = width / grid_size as u32;
    let cell_height = height / grid_size as u32;

    let mut img = RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));

    let mut max_abs = 0.0f64;
    for row in &grid {
        for &v in row {
            if v.abs() > max_abs {
                max_abs = v.abs();
            }
        }
    }
    if max_abs < 1e-10 {
        max_abs = 1.0;
    }

    for row_idx in 0..grid_size {
        for col_idx in 0..grid_size {
            let normalized = grid[row_idx][col_idx] / max_abs;
            let color = value_to_blue_red(normalized);
            let x_start = col_idx as u32 * cell_width;
            let x_end = (x_start + cell_width).min(width);
            let y_start = row_idx as u32 * cell_height;
            let y_end = (y_start + cell_height).min(height);
            for py in y_start..y_end {
                for px in x_start..x_end {
                    img.put_pixel(px, py, image::Rgb(color));
                }
            }
        }
    }

    for i in 0..=grid_size as u32 {
        let x = (i * cell_width).min(width - 1);
        for py in 0..height {
            img.put_pixel(x, py, image::Rgb(GRID_LINE_COLOR));
        }
    }
    for i in 0..=grid_size as u32 {
        let y = (i * cell_height).min(height - 1);
        for px in 0..width {
            img.put_pixel(px, y, image::Rgb(GRID_LINE_COLOR));
        }
    }

    save_png_deterministic(&img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heatmap_rejects_empty_values() {
        assert!(render_heatmap_png(&[], 10, 10).is_err());
    }

    #[test]
    fn heatmap_produces_nonempty_png_bytes() {
        let values = vec![vec![0.0, 1.0], vec![0.5, 0.25]];
        let bytes = render_heatmap_png(&values, 20, 20).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[0..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn identical_input_yields_identical_bytes() {
        let values = vec![vec![0.1, 0.9], vec![0.4, 0.6]];
        let a = render_heatmap_png(&values, 40, 40).unwrap();
        let b = render_heatmap_png(&values, 40, 40).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn probe_grid_rejects_invalid_grid_size() {
        assert!(render_probe_grid_png(&[], 0, 10, 10).is_err());
    }
}

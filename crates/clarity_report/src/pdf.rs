//! PDF renderer (spec §4.12): a fixed six-section layout (cover, metrics,
//! robustness surfaces, evidence overlay, counterfactual results,
//! reproducibility), followed by a post-serialization byte patch that
//! overwrites the nondeterministic `CreationDate`/`ModDate`/`/ID` fields
//! `printpdf` stamps into every document with values derived from the
//! report's own manifest timestamp.

use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocumentReference};
use regex::bytes::Regex;

use crate::model::ClarityReport;
use crate::png::{render_heatmap_png, render_probe_grid_png, render_surface_png, DEFAULT_HEATMAP_HEIGHT, DEFAULT_HEATMAP_WIDTH, DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH};
use crate::{ReportError, ReportResult};

const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const MARGIN_MM: f64 = 20.0;
const LINE_HEIGHT_MM: f64 = 6.0;
const BODY_FONT_SIZE: f64 = 11.0;
const HEADING_FONT_SIZE: f64 = 16.0;

const PDF_TITLE: &str = "CLARITY Report";
const PDF_PRODUCER: &str = "CLARITY M11 Report Generator";

/// Render a full report as a fixed-layout PDF. `evidence_heatmap` is the
/// row-major `[0,1]` overlay heatmap; `timestamp` is the ISO-8601 string
/// used to derive `CreationDate`/`ModDate`/`/ID` deterministically.
pub fn render_pdf(report: &ClarityReport, evidence_heatmap: &[Vec<f64>], timestamp: &str) -> ReportResult<Vec<u8>> {
    let (doc, page1, layer1) = printpdf::PdfDocument::new(PDF_TITLE, Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "cover");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Render(format!("cannot load built-in font: {e}")))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Render(format!("cannot load built-in font: {e}")))?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;

    write_heading(&layer, &font_bold, "CLARITY Report", &mut cursor_mm);
    write_kv_table(
        &layer,
        &font,
        &mut cursor_mm,
        &[
            ("Case ID", report.metadata.case_id.clone()),
            ("Title", report.metadata.title.clone()),
            ("Generated At", report.metadata.generated_at.clone()),
            ("CLARITY Version", report.metadata.clarity_version.clone()),
            ("R2L SHA", report.metadata.r2l_sha.clone()),
            ("Adapter ID", report.metadata.adapter_id.clone()),
            ("Rich Mode", report.metadata.rich_mode.to_string()),
            ("Sweep Manifest Hash", report.metadata.sweep_manifest_hash.clone()),
        ],
    );

    write_heading(&layer, &font_bold, "Metrics Summary", &mut cursor_mm);
    write_kv_table(
        &layer,
        &font,
        &mut cursor_mm,
        &[
            ("Baseline ESI", format!("{:.8}", report.metrics.baseline_esi)),
            ("Baseline Drift", format!("{:.8}", report.metrics.baseline_drift)),
            ("Global Mean ESI", format!("{:.8}", report.metrics.global_mean_esi)),
            ("Global Mean Drift", format!("{:.8}", report.metrics.global_mean_drift)),
            ("Global Variance ESI", format!("{:.8}", report.metrics.global_variance_esi)),
            ("Global Variance Drift", format!("{:.8}", report.metrics.global_variance_drift)),
        ],
    );

    let (page2, layer2) = doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "robustness");
    layer = doc.get_page(page2).get_layer(layer2);
    cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
    write_heading(&layer, &font_bold, "Robustness Surfaces", &mut cursor_mm);
    if !report.robustness_surfaces.is_empty() {
        let surface_png = render_surface_png(&report.robustness_surfaces, DEFAULT_SURFACE_WIDTH, DEFAULT_SURFACE_HEIGHT)
            .map_err(|e| ReportError::Render(format!("surface render failed: {e}")))?;
        place_png(&doc, &layer, &surface_png, &mut cursor_mm)?;
        for surface in &report.robustness_surfaces {
            write_kv_table(
                &layer,
                &font,
                &mut cursor_mm,
                &[
                    (surface.axis.as_str(), String::new()),
                    ("  mean esi", format!("{:.8}", surface.mean_esi)),
                    ("  mean drift", format!("{:.8}", surface.mean_drift)),
                    ("  variance esi", format!("{:.8}", surface.variance_esi)),
                    ("  variance drift", format!("{:.8}", surface.variance_drift)),
                ],
            );
        }
    }

    let (page3, layer3) = doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "overlay");
    layer = doc.get_page(page3).get_layer(layer3);
    cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
    write_heading(&layer, &font_bold, "Evidence Overlay", &mut cursor_mm);
    if !evidence_heatmap.is_empty() {
        let heatmap_png = render_heatmap_png(evidence_heatmap, DEFAULT_HEATMAP_WIDTH, DEFAULT_HEATMAP_HEIGHT)
            .map_err(|e| ReportError::Render(format!("heatmap render failed: {e}")))?;
        place_png(&doc, &layer, &heatmap_png, &mut cursor_mm)?;
    }
    for region in &report.overlay_section.regions {
        write_kv_table(
            &layer,
            &font,
            &mut cursor_mm,
            &[(
                region.region_id.as_str(),
                format!(
                    "area={:.8} mean_evidence={:.8} bbox=[{:.4},{:.4},{:.4},{:.4}]",
                    region.area, region.mean_evidence, region.x_min, region.y_min, region.x_max, region.y_max
                ),
            )],
        );
    }

    let (page4, layer4) = doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "counterfactual");
    layer = doc.get_page(page4).get_layer(layer4);
    cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
    write_heading(&layer, &font_bold, "Counterfactual Results", &mut cursor_mm);
    if !report.probe_surface.probes.is_empty() {
        let probe_png = render_probe_grid_png(
            &report.probe_surface.probes,
            report.probe_surface.grid_size,
            DEFAULT_HEATMAP_WIDTH,
            DEFAULT_HEATMAP_HEIGHT,
        )
        .map_err(|e| ReportError::Render(format!("probe grid render failed: {e}")))?;
        place_png(&doc, &layer, &probe_png, &mut cursor_mm)?;
    }
    write_kv_table(
        &layer,
        &font,
        &mut cursor_mm,
        &[
            ("Grid Size", report.probe_surface.grid_size.to_string()),
            ("Total Probes", report.probe_surface.total_probes.to_string()),
            ("Mean Delta ESI", format!("{:.8}", report.probe_surface.mean_delta_esi)),
            ("Mean Delta Drift", format!("{:.8}", report.probe_surface.mean_delta_drift)),
            ("Variance Delta ESI", format!("{:.8}", report.probe_surface.variance_delta_esi)),
            ("Variance Delta Drift", format!("{:.8}", report.probe_surface.variance_delta_drift)),
        ],
    );

    let (page5, layer5) = doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "reproducibility");
    layer = doc.get_page(page5).get_layer(layer5);
    cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
    write_heading(&layer, &font_bold, &report.reproducibility.title, &mut cursor_mm);
    let repro_kv: Vec<(&str, String)> = report.reproducibility.content.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    write_kv_table(&layer, &font, &mut cursor_mm, &repro_kv);

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| ReportError::Render(format!("pdf serialization failed: {e}")))?;

    Ok(patch_pdf_metadata(bytes, timestamp))
}

fn write_heading(layer: &printpdf::PdfLayerReference, font: &printpdf::IndirectFontRef, text: &str, cursor_mm: &mut f64) {
    layer.use_text(text, HEADING_FONT_SIZE as f32, Mm(MARGIN_MM as f32), Mm(*cursor_mm as f32), font);
    *cursor_mm -= LINE_HEIGHT_MM * 1.5;
}

fn write_kv_table(layer: &printpdf::PdfLayerReference, font: &printpdf::IndirectFontRef, cursor_mm: &mut f64, rows: &[(&str, String)]) {
    for (key, value) in rows {
        let line = if value.is_empty() { key.to_string() } else { format!("{key}: {value}") };
        layer.use_text(line, BODY_FONT_SIZE as f32, Mm(MARGIN_MM as f32), Mm(*cursor_mm as f32), font);
        *cursor_mm -= LINE_HEIGHT_MM;
    }
    *cursor_mm -= LINE_HEIGHT_MM;
}

fn place_png(doc: &PdfDocumentReference, layer: &printpdf::PdfLayerReference, png_bytes: &[u8], cursor_mm: &mut f64) -> ReportResult<()> {
    let dynamic = image::load_from_memory(png_bytes).map_err(|e| ReportError::Render(format!("cannot decode rendered png: {e}")))?;
    let image = Image::from_dynamic_image(&dynamic);
    let _ = doc;
    let height_mm = 60.0;
    *cursor_mm -= height_mm;
    image.add_to_layer(
        layer.clone(),
        ImageTransform { translate_x: Some(Mm(MARGIN_MM as f32)), translate_y: Some(Mm(*cursor_mm as f32)), ..Default::default() },
    );
    *cursor_mm -= LINE_HEIGHT_MM;
    Ok(())
}

/// Parse an ISO-8601 UTC timestamp (`YYYY-MM-DDTHH:MM:SSZ`) into the
/// fourteen-digit `YYYYMMDDHHMMSS` block a PDF date string embeds. Falls
/// back to the Unix epoch when the input does not match that exact shape.
fn pdf_date_digits(timestamp: &str) -> String {
    let bytes = timestamp.as_bytes();
    let is_well_formed = bytes.len() >= 19
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && (bytes[10] == b'T' || bytes[10] == b' ')
        && bytes[13] == b':'
        && bytes[16] == b':';
    if !is_well_formed {
        return "19700101000000".to_string();
    }
    let mut digits = String::with_capacity(14);
    digits.push_str(&timestamp[0..4]);
    digits.push_str(&timestamp[5..7]);
    digits.push_str(&timestamp[8..10]);
    digits.push_str(&timestamp[11..13]);
    digits.push_str(&timestamp[14..16]);
    digits.push_str(&timestamp[17..19]);
    if digits.len() == 14 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits
    } else {
        "19700101000000".to_string()
    }
}

/// Overwrite `CreationDate`, `ModDate`, and the trailer `/ID` pair in a
/// serialized PDF byte stream with values derived deterministically from
/// `timestamp`, per spec §4.12/§6.
fn patch_pdf_metadata(mut bytes: Vec<u8>, timestamp: &str) -> Vec<u8> {
    let digits = pdf_date_digits(timestamp);
    let id_hex = clarity_io::hasher::sha256_hex(digits.as_bytes());

    let date_re = Regex::new(r"/(CreationDate|ModDate)\s*\(D:[^)]*\)").unwrap();
    let replaced = date_re.replace_all(&bytes, |caps: &regex::bytes::Captures| {
        let field = std::str::from_utf8(&caps[1]).unwrap();
        format!("/{field} (D:{digits}Z)").into_bytes()
    });
    bytes = replaced.into_owned();

    let id_re = Regex::new(r"/ID\s*\[\s*<[0-9A-Fa-f]*>\s*<[0-9A-Fa-f]*>\s*\]").unwrap();
    let id_value = format!("/ID [<{id_hex}><{id_hex}>]");
    let replaced = id_re.replace_all(&bytes, |_: &regex::bytes::Captures| id_value.clone().into_bytes());
    bytes = replaced.into_owned();

    let producer_re = Regex::new(r"/Producer\s*\([^)]*\)").unwrap();
    let replaced = producer_re.replace_all(&bytes, format!("/Producer ({PDF_PRODUCER})").into_bytes().as_slice());
    bytes = replaced.into_owned();

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_date_digits_falls_back_to_epoch_on_garbage() {
        assert_eq!(pdf_date_digits("not-a-timestamp"), "19700101000000");
    }

    #[test]
    fn pdf_date_digits_parses_well_formed_iso8601() {
        assert_eq!(pdf_date_digits("2025-03-04T05:06:07Z"), "20250304050607");
    }

    #[test]
    fn patch_is_idempotent_on_digit_derivation() {
        let digits_a = pdf_date_digits("2025-03-04T05:06:07Z");
        let digits_b = pdf_date_digits("2025-03-04T05:06:07Z");
        assert_eq!(digits_a, digits_b);
    }
}

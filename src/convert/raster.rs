//! PDF → PNG rasterisation via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so Tokio workers never stall during rendering.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 300 DPI would be a
//! 10,000 × 14,000 px image. The longest edge is capped regardless of DPI,
//! keeping memory bounded and staying near the image-size sweet spot for
//! vision models.

use crate::state::{ConversionKind, ConversionResult};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Longest allowed edge of a rendered page, in pixels.
const MAX_EDGE_PX: i32 = 4000;

/// Rasterise every page of a PDF, writing
/// `{output_dir}/png_files/{stem}_page_{n}.png` in page order.
pub async fn convert_pdf_to_png(pdf_path: &str, output_dir: &str, dpi: u32) -> ConversionResult {
    let pdf = pdf_path.to_string();
    let out = output_dir.to_string();

    let joined = tokio::task::spawn_blocking(move || render_blocking(&pdf, &out, dpi)).await;
    match joined {
        Ok(Ok(outputs)) => {
            info!(pdf = pdf_path, pages = outputs.len(), "pdf rasterised");
            ConversionResult::ok(ConversionKind::PdfToPng, outputs)
        }
        Ok(Err(detail)) => ConversionResult::failed(ConversionKind::PdfToPng, detail),
        Err(e) => {
            ConversionResult::failed(ConversionKind::PdfToPng, format!("render task panicked: {e}"))
        }
    }
}

fn render_blocking(pdf_path: &str, output_dir: &str, dpi: u32) -> Result<Vec<String>, String> {
    let input = Path::new(pdf_path);
    if !input.exists() {
        return Err(format!("input file not found: {pdf_path}"));
    }

    let png_dir = PathBuf::from(output_dir).join("png_files");
    std::fs::create_dir_all(&png_dir)
        .map_err(|e| format!("failed to create {}: {e}", png_dir.display()))?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(input, None)
        .map_err(|e| format!("failed to open {pdf_path}: {e:?}"))?;

    let pages = document.pages();
    let mut outputs = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        // Scale from PDF points (1/72 in) to the requested DPI, then cap.
        let width_px = (page.width().value * dpi as f32 / 72.0).round() as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px.min(MAX_EDGE_PX))
            .set_maximum_height(MAX_EDGE_PX);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| format!("rasterisation failed for page {}: {e:?}", idx + 1))?;
        let image = bitmap.as_image();

        let png_path = png_dir.join(format!("{stem}_page_{}.png", idx + 1));
        image
            .save(&png_path)
            .map_err(|e| format!("failed to write {}: {e}", png_path.display()))?;

        debug!(
            page = idx + 1,
            width = image.width(),
            height = image.height(),
            "page rendered"
        );
        outputs.push(png_path.to_string_lossy().into_owned());
    }

    if outputs.is_empty() {
        return Err(format!("{pdf_path} contains no pages"));
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_input_is_a_failed_result_not_a_fault() {
        let result = convert_pdf_to_png("/definitely/not/here.pdf", "/tmp", 300).await;
        assert!(!result.success);
        assert_eq!(result.kind, ConversionKind::PdfToPng);
        assert!(result.error.contains("not found"), "got: {}", result.error);
    }
}

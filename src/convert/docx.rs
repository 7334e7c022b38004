//! DOCX → PDF conversion via a headless LibreOffice subprocess.
//!
//! LibreOffice is the one widely deployed renderer that handles real-world
//! DOCX faithfully, so this collaborator shells out to `soffice` rather than
//! attempting to re-implement OOXML layout. The binary is looked up as
//! `soffice` on `PATH`, overridable through `DOCGRAPH_SOFFICE`.
//!
//! Like every collaborator, this never raises past its boundary: any failure
//! (missing input, missing binary, non-zero exit, missing output) is
//! reported inside the returned [`ConversionResult`].

use crate::state::{ConversionKind, ConversionResult};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Environment variable naming the LibreOffice binary to invoke.
pub const SOFFICE_ENV: &str = "DOCGRAPH_SOFFICE";

/// Convert a DOCX file to PDF, writing `{output_dir}/pdf_files/{stem}.pdf`.
pub async fn convert_docx_to_pdf(docx_path: &str, output_dir: &str) -> ConversionResult {
    match convert_inner(docx_path, output_dir).await {
        Ok(pdf_path) => {
            info!(docx = docx_path, pdf = %pdf_path, "docx converted to pdf");
            ConversionResult::ok(ConversionKind::DocxToPdf, vec![pdf_path])
        }
        Err(detail) => ConversionResult::failed(ConversionKind::DocxToPdf, detail),
    }
}

async fn convert_inner(docx_path: &str, output_dir: &str) -> Result<String, String> {
    let input = Path::new(docx_path);
    if !input.exists() {
        return Err(format!("input file not found: {docx_path}"));
    }

    let pdf_dir = Path::new(output_dir).join("pdf_files");
    tokio::fs::create_dir_all(&pdf_dir)
        .await
        .map_err(|e| format!("failed to create {}: {e}", pdf_dir.display()))?;

    let soffice = std::env::var(SOFFICE_ENV).unwrap_or_else(|_| "soffice".to_string());
    debug!(binary = %soffice, "invoking LibreOffice");

    let output = Command::new(&soffice)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(&pdf_dir)
        .arg(input)
        .output()
        .await
        .map_err(|e| format!("failed to launch '{soffice}': {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "'{soffice}' exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| format!("cannot derive document name from {docx_path}"))?;
    let pdf_path = pdf_dir.join(format!("{stem}.pdf"));
    if !pdf_path.exists() {
        return Err(format!(
            "conversion reported success but {} was not produced",
            pdf_path.display()
        ));
    }

    Ok(pdf_path.to_string_lossy().into_owned())
}

//! PNG → Markdown transcription via a vision model.
//!
//! Each page image goes through one vision chat call; outputs are
//! concatenated in input order, separated by a blank line, cleaned up, and
//! written to `{output_dir}/markdown_files/{stem}.md`.
//!
//! PNG is passed as a base64 attachment with `detail: "high"` — lossless
//! encoding and the full image-tile budget both matter for reading small
//! fonts and table borders accurately.
//!
//! The output file is named after the page stem (minus its `_page_N`
//! suffix), so the original and updated branches of a comparison run never
//! collide inside the shared `markdown_files/` directory.

use crate::convert::llm::ChatFn;
use crate::convert::postprocess::clean_markdown;
use crate::prompts::TRANSCRIBE_SYSTEM_PROMPT;
use crate::state::{ConversionKind, ConversionResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, ImageData};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static RE_PAGE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_page_\d+$").unwrap());

/// Transcribe rendered page images to one Markdown document.
///
/// `png_paths` must be in page order; the concatenation order follows it.
pub async fn convert_png_to_markdown(
    png_paths: &[String],
    output_dir: &str,
    chat: &ChatFn,
) -> ConversionResult {
    match transcribe_inner(png_paths, output_dir, chat).await {
        Ok(markdown_path) => {
            info!(pages = png_paths.len(), markdown = %markdown_path, "pages transcribed");
            ConversionResult::ok(ConversionKind::PngToMarkdown, vec![markdown_path])
        }
        Err(detail) => ConversionResult::failed(ConversionKind::PngToMarkdown, detail),
    }
}

async fn transcribe_inner(
    png_paths: &[String],
    output_dir: &str,
    chat: &ChatFn,
) -> Result<String, String> {
    if png_paths.is_empty() {
        return Err("no page images supplied".to_string());
    }

    let markdown_dir = PathBuf::from(output_dir).join("markdown_files");
    tokio::fs::create_dir_all(&markdown_dir)
        .await
        .map_err(|e| format!("failed to create {}: {e}", markdown_dir.display()))?;

    let mut sections = Vec::with_capacity(png_paths.len());
    for (idx, png_path) in png_paths.iter().enumerate() {
        let bytes = tokio::fs::read(png_path)
            .await
            .map_err(|e| format!("failed to read {png_path}: {e}"))?;
        let image = ImageData::new(STANDARD.encode(&bytes), "image/png").with_detail("high");

        let messages = vec![
            ChatMessage::system(TRANSCRIBE_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let content = chat(messages)
            .await
            .map_err(|e| format!("transcription failed for page {}: {e}", idx + 1))?;

        debug!(page = idx + 1, chars = content.len(), "page transcribed");
        sections.push(clean_markdown(&content));
    }

    let markdown_path = markdown_dir.join(format!("{}.md", doc_stem(&png_paths[0])));
    let document = sections.join("\n\n") + "\n";
    tokio::fs::write(&markdown_path, document)
        .await
        .map_err(|e| format!("failed to write {}: {e}", markdown_path.display()))?;

    Ok(markdown_path.to_string_lossy().into_owned())
}

/// Derive the document stem from a page image path:
/// `report_original_page_3.png` → `report_original`.
fn doc_stem(png_path: &str) -> String {
    let stem = Path::new(png_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    RE_PAGE_SUFFIX.replace(&stem, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;

    fn scripted_chat(reply: &'static str) -> ChatFn {
        Arc::new(move |_messages| async move { Ok(reply.to_string()) }.boxed())
    }

    #[test]
    fn doc_stem_strips_page_suffix() {
        assert_eq!(doc_stem("/x/report_original_page_12.png"), "report_original");
        assert_eq!(doc_stem("plain.png"), "plain");
    }

    #[tokio::test]
    async fn joins_pages_in_order_with_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut pngs = Vec::new();
        for n in 1..=2 {
            let p = dir.path().join(format!("doc_page_{n}.png"));
            std::fs::write(&p, b"fake png").unwrap();
            pngs.push(p.to_string_lossy().into_owned());
        }

        let result = convert_png_to_markdown(
            &pngs,
            dir.path().to_str().unwrap(),
            &scripted_chat("# Page"),
        )
        .await;
        assert!(result.success, "error: {}", result.error);

        let written = std::fs::read_to_string(result.first_output().unwrap()).unwrap();
        assert_eq!(written, "# Page\n\n# Page\n");
        assert!(result.first_output().unwrap().ends_with("doc.md"));
    }

    #[tokio::test]
    async fn chat_failure_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("doc_page_1.png");
        std::fs::write(&p, b"fake png").unwrap();

        let chat: ChatFn =
            Arc::new(|_| async { Err("rate limited".to_string()) }.boxed());
        let result = convert_png_to_markdown(
            &[p.to_string_lossy().into_owned()],
            dir.path().to_str().unwrap(),
            &chat,
        )
        .await;
        assert!(!result.success);
        assert!(result.error.contains("rate limited"));
    }
}

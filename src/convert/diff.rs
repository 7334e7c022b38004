//! Diff generation and LLM diff explanation.
//!
//! `generate_diff` is pure text work: a line-based unified diff of the two
//! transcribed Markdown files. `explain_diff` is a single chat call that
//! turns the raw diff into prose. Both contain their failures: the diff
//! reports them inside [`DiffResult`], the explanation through its
//! `Result`'s error string (which the calling node encodes as an `Error`
//! payload).

use crate::convert::llm::ChatFn;
use crate::prompts::explain_diff_prompt;
use crate::state::DiffResult;
use edgequake_llm::ChatMessage;
use similar::TextDiff;
use tracing::{debug, info};

/// Unified-diff context lines, matching the conventional `diff -u` default.
const CONTEXT_LINES: usize = 3;

/// Generate a line-based unified diff between two Markdown files.
pub async fn generate_diff(original_md_path: &str, updated_md_path: &str) -> DiffResult {
    match diff_inner(original_md_path, updated_md_path).await {
        Ok(diff_text) => {
            info!(
                original = original_md_path,
                updated = updated_md_path,
                bytes = diff_text.len(),
                "diff generated"
            );
            DiffResult {
                diff_text,
                success: true,
                error: String::new(),
            }
        }
        Err(detail) => DiffResult {
            diff_text: String::new(),
            success: false,
            error: detail,
        },
    }
}

async fn diff_inner(original_path: &str, updated_path: &str) -> Result<String, String> {
    let original = tokio::fs::read_to_string(original_path)
        .await
        .map_err(|e| format!("failed to read {original_path}: {e}"))?;
    let updated = tokio::fs::read_to_string(updated_path)
        .await
        .map_err(|e| format!("failed to read {updated_path}: {e}"))?;

    let diff = TextDiff::from_lines(&original, &updated);
    let text = diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(original_path, updated_path)
        .to_string();

    debug!(changes = diff.ops().len(), "diff computed");
    Ok(text)
}

/// Explain a unified diff in prose via a single LLM call.
///
/// An empty diff short-circuits without spending a chat call.
pub async fn explain_diff(diff_text: &str, chat: &ChatFn) -> Result<String, String> {
    if diff_text.trim().is_empty() {
        return Ok("The two documents are identical; no changes to explain.".to_string());
    }
    let messages = vec![ChatMessage::user(explain_diff_prompt(diff_text))];
    chat(messages).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn diff_of_changed_files_marks_lines() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        std::fs::write(&a, "one\ntwo\nthree\n").unwrap();
        std::fs::write(&b, "one\n2\nthree\n").unwrap();

        let result = generate_diff(a.to_str().unwrap(), b.to_str().unwrap()).await;
        assert!(result.success);
        assert!(result.diff_text.contains("-two"), "got: {}", result.diff_text);
        assert!(result.diff_text.contains("+2"), "got: {}", result.diff_text);
    }

    #[tokio::test]
    async fn diff_of_missing_file_is_a_failed_result() {
        let result = generate_diff("/no/such/a.md", "/no/such/b.md").await;
        assert!(!result.success);
        assert!(result.error.contains("failed to read"));
        assert!(result.diff_text.is_empty());
    }

    #[tokio::test]
    async fn empty_diff_skips_the_llm() {
        let chat: ChatFn = Arc::new(|_| {
            async { panic!("chat must not be called for an empty diff") }.boxed()
        });
        let explanation = explain_diff("  \n", &chat).await.unwrap();
        assert!(explanation.contains("identical"));
    }
}

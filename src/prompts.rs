//! Prompts for the LLM-facing steps: page transcription, workflow
//! coordination, and diff explanation.
//!
//! Centralising every prompt here keeps behaviour changes in one place and
//! lets unit tests inspect prompts without spinning up a provider.

/// System prompt for converting a rendered page image to Markdown.
pub const TRANSCRIBE_SYSTEM_PROMPT: &str = r#"You are an expert document converter. Convert this page image to clean, well-structured Markdown.

Rules:
1. Preserve ALL text content completely and accurately, in reading order.
2. Use #/##/### headings, - for unordered lists, 1. 2. 3. for ordered lists.
3. Convert tables to GFM pipe format.
4. Extract any mathematical formulas as LaTeX: $inline$ and $$display$$.
5. Ignore page numbers and repeated headers/footers.
6. Output ONLY the Markdown content. Do NOT wrap it in ```markdown fences and do NOT add commentary."#;

/// System prompt template for the coordinator node.
///
/// The coordinator replies either with a single JSON object requesting a
/// tool, or with plain text once the document is fully converted. The JSON
/// protocol keeps tool dispatch provider-agnostic: it needs nothing beyond
/// plain chat completion.
const COORDINATOR_SYSTEM_TEMPLATE: &str = r#"You are an expert at document processing. Convert the supplied document from .docx to Markdown using the tools at your disposal, in this order:

1. Convert the DOCX file to PDF using docx_to_pdf_converter
2. Convert the PDF to PNG files using pdf_to_png_converter
3. Convert the PNG files to Markdown using png_to_markdown_converter

Check the success status of each result before proceeding to the next step.

Available tools:
{tool_catalogue}
To call a tool, reply with ONLY a JSON object, no other text:
{"tool_name": "<name>", "arguments": {"<arg>": <value>}}

When the Markdown file has been produced (or a step has failed and cannot be retried), reply with a plain-text summary instead of a tool call.

Progress so far:
{progress}"#;

/// Render the coordinator system prompt with the tool catalogue and the
/// progress summary derived from the run history.
pub fn coordinator_prompt(tool_catalogue: &str, progress: &str) -> String {
    COORDINATOR_SYSTEM_TEMPLATE
        .replace("{tool_catalogue}", tool_catalogue)
        .replace("{progress}", progress)
}

/// Build the user prompt asking the LLM to explain a unified diff.
pub fn explain_diff_prompt(diff_text: &str) -> String {
    format!(
        "Analyze the following unified diff between two versions of a document \
and provide a clear, concise explanation of the changes:\n\n{diff_text}\n\n\
Focus on:\n\
1. What content was added or removed\n\
2. Any significant formatting changes\n\
3. The overall impact of these changes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_prompt_substitutes_placeholders() {
        let prompt = coordinator_prompt("- docx_to_pdf_converter: converts\n", "None yet.");
        assert!(prompt.contains("docx_to_pdf_converter: converts"));
        assert!(prompt.contains("None yet."));
        assert!(!prompt.contains("{tool_catalogue}"));
        assert!(!prompt.contains("{progress}"));
        // the JSON protocol example must survive substitution untouched
        assert!(prompt.contains(r#"{"tool_name": "<name>""#));
    }

    #[test]
    fn explain_prompt_embeds_diff() {
        let prompt = explain_diff_prompt("--- a\n+++ b\n");
        assert!(prompt.contains("+++ b"));
        assert!(prompt.contains("added or removed"));
    }
}

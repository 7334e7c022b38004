//! Deterministic cleanup of VLM-generated Markdown.
//!
//! Even well-prompted vision models occasionally wrap their output in
//! ```` ```markdown ```` fences, emit CRLF line endings, or pad the text
//! with runs of blank lines. These rules fix model quirks without touching
//! content, so the prompt can stay focused on what to extract.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page's raw VLM output.
///
/// Rules, in order:
/// 1. Strip outer markdown fences (models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Trim leading/trailing blank lines
pub fn clean_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = s
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let s = RE_BLANK_LINES.replace_all(&s, "\n\n\n").to_string();
    s.trim_matches('\n').to_string()
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown)?\n(.*)\n```\s*$").unwrap());

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_outer_fences() {
        let input = "```markdown\n# Title\n\nBody\n```";
        assert_eq!(clean_markdown(input), "# Title\n\nBody");
    }

    #[test]
    fn keeps_inner_fences() {
        let input = "# Title\n\n```rust\nfn main() {}\n```";
        assert_eq!(clean_markdown(input), input);
    }

    #[test]
    fn normalises_line_endings_and_blank_runs() {
        let input = "a\r\n\n\n\n\n\nb  \n";
        assert_eq!(clean_markdown(input), "a\n\n\nb");
    }
}

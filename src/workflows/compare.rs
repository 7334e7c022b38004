//! The comparison workflow: transcribe two versions of a document, diff
//! them, and explain the diff.
//!
//! ```text
//! parse_request
//!   └─▶ original: docx→pdf → pdf→png → png→markdown
//!         └─▶ updated: docx→pdf → pdf→png → png→markdown
//!               └─▶ generate_diff ─▶ explain_diff (finish node)
//! ```
//!
//! Every conversion node is followed by the same success-gated router:
//! a failed result terminates the run, a successful one advances the branch
//! named by the result's `DocBranch` tag. The two sub-flows are logically
//! independent but execute sequentially, original before updated, within
//! one run.
//!
//! This workflow ends via a designated finish node (`explain_diff`); the
//! coordinator workflow shows the sentinel-only style.

use crate::config::WorkflowConfig;
use crate::convert::llm::{provider_chat, ChatFn};
use crate::convert::{convert_docx_to_pdf, convert_pdf_to_png, convert_png_to_markdown};
use crate::convert::{explain_diff, generate_diff};
use crate::engine::{run as engine_run, RunReport};
use crate::error::{CompileError, WorkflowError};
use crate::graph::{fallible_node, CompiledGraph, FinishCriterion, GraphBuilder, Next, NodeFn};
use crate::state::{
    ConversionKind, DocBranch, ExecutionState, Message, PathSet, Payload,
};
use crate::workflows::run_options;

pub const PARSE_REQUEST: &str = "parse_request";
pub const ORIGINAL_DOCX_TO_PDF: &str = "original_docx_to_pdf";
pub const ORIGINAL_PDF_TO_PNG: &str = "original_pdf_to_png";
pub const ORIGINAL_PNG_TO_MARKDOWN: &str = "original_png_to_markdown";
pub const UPDATED_DOCX_TO_PDF: &str = "updated_docx_to_pdf";
pub const UPDATED_PDF_TO_PNG: &str = "updated_pdf_to_png";
pub const UPDATED_PNG_TO_MARKDOWN: &str = "updated_png_to_markdown";
pub const GENERATE_DIFF: &str = "generate_diff";
pub const EXPLAIN_DIFF: &str = "explain_diff";

/// Seed state for a comparison run: the base path as the user's message.
pub fn seed(base: &str) -> ExecutionState {
    ExecutionState::seeded(Message::user(Payload::text(base)))
}

/// Run the comparison workflow end to end, resolving the provider from
/// `config` / the environment.
pub async fn run(base: &str, config: &WorkflowConfig) -> Result<RunReport, WorkflowError> {
    let provider = config.resolve_provider()?;
    let chat = provider_chat(provider, config);
    let graph = build_graph(chat, config)?;
    Ok(engine_run(&graph, seed(base), run_options(config)).await?)
}

/// Build and compile the comparison graph against the given chat function.
pub fn build_graph(chat: ChatFn, config: &WorkflowConfig) -> Result<CompiledGraph, CompileError> {
    let dpi = config.dpi;

    GraphBuilder::new()
        .add_node_fn(PARSE_REQUEST, parse_request_node())
        .add_node_fn(ORIGINAL_DOCX_TO_PDF, docx_node(DocBranch::Original))
        .add_node_fn(ORIGINAL_PDF_TO_PNG, png_node(DocBranch::Original, dpi))
        .add_node_fn(
            ORIGINAL_PNG_TO_MARKDOWN,
            markdown_node(DocBranch::Original, chat.clone()),
        )
        .add_node_fn(UPDATED_DOCX_TO_PDF, docx_node(DocBranch::Updated))
        .add_node_fn(UPDATED_PDF_TO_PNG, png_node(DocBranch::Updated, dpi))
        .add_node_fn(
            UPDATED_PNG_TO_MARKDOWN,
            markdown_node(DocBranch::Updated, chat.clone()),
        )
        .add_node_fn(GENERATE_DIFF, generate_diff_node())
        .add_node_fn(EXPLAIN_DIFF, explain_diff_node(chat))
        .add_conditional_edge(PARSE_REQUEST, route_after_parse)
        .add_conditional_edge(ORIGINAL_DOCX_TO_PDF, route_after_conversion)
        .add_conditional_edge(ORIGINAL_PDF_TO_PNG, route_after_conversion)
        .add_conditional_edge(ORIGINAL_PNG_TO_MARKDOWN, route_after_conversion)
        .add_conditional_edge(UPDATED_DOCX_TO_PDF, route_after_conversion)
        .add_conditional_edge(UPDATED_PDF_TO_PNG, route_after_conversion)
        .add_conditional_edge(UPDATED_PNG_TO_MARKDOWN, route_after_conversion)
        .add_conditional_edge(GENERATE_DIFF, route_after_diff)
        .set_entry(PARSE_REQUEST)
        .set_finish(FinishCriterion::Node(EXPLAIN_DIFF.to_string()))
        .compile()
}

// ── Routers ──────────────────────────────────────────────────────────────

/// Valid paths enter the original sub-flow; anything else terminates.
pub fn route_after_parse(state: &ExecutionState) -> Next {
    match state.last().map(|m| &m.payload) {
        Some(Payload::Paths(_)) => Next::node(ORIGINAL_DOCX_TO_PDF),
        _ => Next::End,
    }
}

/// Success-gated branch router shared by all six conversion nodes.
///
/// A failed conversion terminates the run; a successful one advances the
/// sub-flow identified by the result's branch tag.
pub fn route_after_conversion(state: &ExecutionState) -> Next {
    let Some(Payload::Conversion(result)) = state.last().map(|m| &m.payload) else {
        return Next::End;
    };
    if !result.success {
        return Next::End;
    }
    match (result.kind, result.branch) {
        (ConversionKind::DocxToPdf, Some(DocBranch::Original)) => Next::node(ORIGINAL_PDF_TO_PNG),
        (ConversionKind::PdfToPng, Some(DocBranch::Original)) => {
            Next::node(ORIGINAL_PNG_TO_MARKDOWN)
        }
        (ConversionKind::PngToMarkdown, Some(DocBranch::Original)) => {
            Next::node(UPDATED_DOCX_TO_PDF)
        }
        (ConversionKind::DocxToPdf, Some(DocBranch::Updated)) => Next::node(UPDATED_PDF_TO_PNG),
        (ConversionKind::PdfToPng, Some(DocBranch::Updated)) => {
            Next::node(UPDATED_PNG_TO_MARKDOWN)
        }
        (ConversionKind::PngToMarkdown, Some(DocBranch::Updated)) => Next::node(GENERATE_DIFF),
        _ => Next::End,
    }
}

/// A successful diff proceeds to explanation; a failed one terminates.
pub fn route_after_diff(state: &ExecutionState) -> Next {
    match state.last().map(|m| &m.payload) {
        Some(Payload::Diff(d)) if d.success => Next::node(EXPLAIN_DIFF),
        _ => Next::End,
    }
}

// ── Nodes ────────────────────────────────────────────────────────────────

fn parse_request_node() -> NodeFn {
    fallible_node(PARSE_REQUEST, |state: ExecutionState| async move {
        let base = state
            .first()
            .and_then(|m| m.payload.as_text())
            .ok_or("seed message does not carry an input path")?
            .trim()
            .to_string();
        let paths = PathSet::from_base(&base)?;
        Ok(Payload::Paths(paths))
    })
}

fn docx_node(branch: DocBranch) -> NodeFn {
    let stage = match branch {
        DocBranch::Original => ORIGINAL_DOCX_TO_PDF,
        DocBranch::Updated => UPDATED_DOCX_TO_PDF,
    };
    fallible_node(stage, move |state: ExecutionState| async move {
        let paths = state
            .latest_paths()
            .cloned()
            .ok_or("no document paths in history")?;
        let result = convert_docx_to_pdf(paths.docx_for(branch), &paths.base_dir).await;
        Ok(Payload::Conversion(result.with_branch(branch)))
    })
}

fn png_node(branch: DocBranch, dpi: u32) -> NodeFn {
    let stage = match branch {
        DocBranch::Original => ORIGINAL_PDF_TO_PNG,
        DocBranch::Updated => UPDATED_PDF_TO_PNG,
    };
    fallible_node(stage, move |state: ExecutionState| async move {
        let paths = state
            .latest_paths()
            .cloned()
            .ok_or("no document paths in history")?;
        let pdf_path = state
            .latest_conversion(ConversionKind::DocxToPdf, branch)
            .and_then(|c| c.first_output())
            .ok_or("no PDF output in history for this branch")?
            .to_string();
        let result = convert_pdf_to_png(&pdf_path, &paths.base_dir, dpi).await;
        Ok(Payload::Conversion(result.with_branch(branch)))
    })
}

fn markdown_node(branch: DocBranch, chat: ChatFn) -> NodeFn {
    let stage = match branch {
        DocBranch::Original => ORIGINAL_PNG_TO_MARKDOWN,
        DocBranch::Updated => UPDATED_PNG_TO_MARKDOWN,
    };
    fallible_node(stage, move |state: ExecutionState| {
        let chat = chat.clone();
        async move {
            let paths = state
                .latest_paths()
                .cloned()
                .ok_or("no document paths in history")?;
            let png_paths = state
                .latest_conversion(ConversionKind::PdfToPng, branch)
                .map(|c| c.outputs.clone())
                .ok_or("no PNG outputs in history for this branch")?;
            let result = convert_png_to_markdown(&png_paths, &paths.base_dir, &chat).await;
            Ok(Payload::Conversion(result.with_branch(branch)))
        }
    })
}

fn generate_diff_node() -> NodeFn {
    fallible_node(GENERATE_DIFF, |state: ExecutionState| async move {
        let (original, updated) = state.branch_pair(ConversionKind::PngToMarkdown);
        let original_md = original
            .and_then(|c| c.first_output())
            .ok_or("no original markdown in history")?
            .to_string();
        let updated_md = updated
            .and_then(|c| c.first_output())
            .ok_or("no updated markdown in history")?
            .to_string();
        let result = generate_diff(&original_md, &updated_md).await;
        Ok(Payload::Diff(result))
    })
}

fn explain_diff_node(chat: ChatFn) -> NodeFn {
    fallible_node(EXPLAIN_DIFF, move |state: ExecutionState| {
        let chat = chat.clone();
        async move {
            let diff = match state.last().map(|m| &m.payload) {
                Some(Payload::Diff(d)) if d.success => d.diff_text.clone(),
                _ => return Err("no successful diff to explain".to_string()),
            };
            let explanation = explain_diff(&diff, &chat).await?;
            Ok(Payload::text(explanation))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConversionResult, DiffResult};

    fn with_last(payload: Payload) -> ExecutionState {
        ExecutionState::seeded(Message::user(Payload::text("seed")))
            .appended(Message::assistant(payload))
    }

    #[test]
    fn failed_conversion_terminates() {
        let state = with_last(Payload::Conversion(
            ConversionResult::failed(ConversionKind::DocxToPdf, "soffice missing")
                .with_branch(DocBranch::Original),
        ));
        assert_eq!(route_after_conversion(&state), Next::End);
    }

    #[test]
    fn branch_tag_selects_successor() {
        let original = with_last(Payload::Conversion(
            ConversionResult::ok(ConversionKind::DocxToPdf, vec!["a.pdf".into()])
                .with_branch(DocBranch::Original),
        ));
        assert_eq!(
            route_after_conversion(&original),
            Next::node(ORIGINAL_PDF_TO_PNG)
        );

        let updated = with_last(Payload::Conversion(
            ConversionResult::ok(ConversionKind::PngToMarkdown, vec!["u.md".into()])
                .with_branch(DocBranch::Updated),
        ));
        assert_eq!(route_after_conversion(&updated), Next::node(GENERATE_DIFF));
    }

    #[test]
    fn untagged_result_terminates() {
        let state = with_last(Payload::Conversion(ConversionResult::ok(
            ConversionKind::DocxToPdf,
            vec!["a.pdf".into()],
        )));
        assert_eq!(route_after_conversion(&state), Next::End);
    }

    #[test]
    fn unexpected_payload_terminates_instead_of_crashing() {
        let state = with_last(Payload::text("not a conversion"));
        assert_eq!(route_after_conversion(&state), Next::End);
        assert_eq!(route_after_parse(&state), Next::End);
        assert_eq!(route_after_diff(&state), Next::End);
    }

    #[test]
    fn error_payload_short_circuits_parse_routing() {
        let state = with_last(Payload::error(PARSE_REQUEST, "updated file not found"));
        assert_eq!(route_after_parse(&state), Next::End);
    }

    #[test]
    fn failed_diff_terminates() {
        let state = with_last(Payload::Diff(DiffResult {
            diff_text: String::new(),
            success: false,
            error: "read failed".into(),
        }));
        assert_eq!(route_after_diff(&state), Next::End);
    }
}

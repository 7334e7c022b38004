//! The coordinator workflow: a single .docx converted to Markdown, with an
//! LLM deciding which tool to call next.
//!
//! ```text
//!        ┌───────────────┐   tool call    ┌──────────┐
//!        │  coordinator  │ ─────────────▶ │ dispatch │
//!        └───────────────┘                └──────────┘
//!                ▲       ◀─────────────────────┘
//!                │            (direct edge)
//!           free text ─▶ End
//! ```
//!
//! The cycle is deliberate and terminates three ways: the model replies with
//! free text instead of a tool call, the run's step bound trips, or the run
//! deadline elapses. Progress lives only in the run history — the
//! coordinator re-derives its "what happened so far" summary from the
//! `ToolResult` payloads on every turn.
//!
//! Tool calls travel as plain JSON inside ordinary chat completions, so any
//! chat-capable provider works; no function-calling API is required.

use crate::config::WorkflowConfig;
use crate::convert::llm::{provider_chat, ChatFn};
use crate::convert::{convert_docx_to_pdf, convert_pdf_to_png, convert_png_to_markdown};
use crate::engine::{run as engine_run, RunReport};
use crate::error::{CompileError, WorkflowError};
use crate::graph::{CompiledGraph, FinishCriterion, GraphBuilder, Next, NodeFn};
use crate::prompts::coordinator_prompt;
use crate::state::{
    ConversionKind, ConversionResult, ExecutionState, JsonMap, Message, Payload, ToolCallRequest,
};
use crate::tools::{ArgSpec, DispatchDefaults, ToolRegistry, ToolSpec};
use crate::workflows::run_options;
use edgequake_llm::ChatMessage;
use futures::FutureExt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub const COORDINATOR: &str = "coordinator";
pub const DISPATCH: &str = "dispatch";

/// Seed state for a conversion run: the document path as the user's message.
pub fn seed(docx_path: &str) -> ExecutionState {
    ExecutionState::seeded(Message::user(Payload::text(docx_path)))
}

/// Run the coordinator workflow end to end with the standard converter
/// tools, resolving the provider from `config` / the environment.
pub async fn convert_document(
    docx_path: &str,
    config: &WorkflowConfig,
) -> Result<RunReport, WorkflowError> {
    let provider = config.resolve_provider()?;
    let chat = provider_chat(provider, config);
    let registry = Arc::new(default_registry(chat.clone(), config));
    let graph = build_graph(chat, registry)?;
    Ok(engine_run(&graph, seed(docx_path), run_options(config)).await?)
}

/// Build and compile the coordinator graph.
///
/// The finish criterion is the terminal sentinel alone: the run ends when
/// the coordinator's router sees anything other than a tool call.
pub fn build_graph(
    chat: ChatFn,
    registry: Arc<ToolRegistry>,
) -> Result<CompiledGraph, CompileError> {
    GraphBuilder::new()
        .add_node_fn(COORDINATOR, coordinator_node(chat, Arc::clone(&registry)))
        .add_node_fn(DISPATCH, dispatch_node(registry))
        .add_conditional_edge(COORDINATOR, route_after_coordinator)
        .add_edge(DISPATCH, COORDINATOR)
        .set_entry(COORDINATOR)
        .set_finish(FinishCriterion::Sentinel)
        .compile()
}

/// A pending tool call loops into dispatch; anything else ends the run.
pub fn route_after_coordinator(state: &ExecutionState) -> Next {
    match state.last().map(|m| &m.payload) {
        Some(Payload::ToolCall(_)) => Next::node(DISPATCH),
        _ => Next::End,
    }
}

// ── Nodes ────────────────────────────────────────────────────────────────

/// The LLM turn: render the history into chat messages, ask the model, and
/// parse its reply into a `ToolCall` or a `Text` payload.
fn coordinator_node(chat: ChatFn, registry: Arc<ToolRegistry>) -> NodeFn {
    Arc::new(move |state: ExecutionState| {
        let chat = chat.clone();
        let registry = Arc::clone(&registry);
        async move {
            let input = seed_input(&state);

            // Reject a bad seed before any chat call is spent on it.
            if state.len() == 1 && !input.ends_with(".docx") {
                let payload = Payload::error(
                    COORDINATOR,
                    format!("input must be a path to a .docx file, got '{input}'"),
                );
                return state.appended(Message::assistant(payload));
            }

            let messages = render_conversation(&state, &registry, &input);
            let payload = match chat(messages).await {
                Ok(reply) => parse_reply(&reply),
                Err(detail) => {
                    warn!(%detail, "coordinator chat call failed");
                    Payload::error(COORDINATOR, detail)
                }
            };
            state.appended(Message::assistant(payload))
        }
        .boxed()
    })
}

/// The tool turn: invoke the requested tool and append its result as the
/// user's reply to the model.
fn dispatch_node(registry: Arc<ToolRegistry>) -> NodeFn {
    Arc::new(move |state: ExecutionState| {
        let registry = Arc::clone(&registry);
        async move {
            let request = match state.last().map(|m| &m.payload) {
                Some(Payload::ToolCall(request)) => request.clone(),
                _ => {
                    let payload = Payload::error(DISPATCH, "no pending tool call to dispatch");
                    return state.appended(Message::user(payload));
                }
            };

            let defaults = DispatchDefaults::new().with_output_dir(output_dir(&seed_input(&state)));
            debug!(tool = %request.tool_name, "dispatching tool call");
            let payload = match registry.dispatch(&request, &defaults).await {
                Ok(result) => Payload::ToolResult(result),
                Err(e) => Payload::error(DISPATCH, e.to_string()),
            };
            state.appended(Message::user(payload))
        }
        .boxed()
    })
}

// ── History rendering ────────────────────────────────────────────────────

fn seed_input(state: &ExecutionState) -> String {
    state
        .first()
        .and_then(|m| m.payload.as_text())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Artifacts land next to the input document.
fn output_dir(input: &str) -> String {
    Path::new(input)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ".".to_string())
}

/// One line per completed tool call, re-derived from the history.
fn progress_summary(state: &ExecutionState) -> String {
    let mut lines = Vec::new();
    for message in state.messages() {
        if let Payload::ToolResult(tr) = &message.payload {
            let status = if tr.result.success {
                format!("ok → {}", tr.result.outputs.join(", "))
            } else {
                format!("FAILED: {}", tr.result.error)
            };
            lines.push(format!("- {}: {status}", tr.tool_name));
        }
    }
    if lines.is_empty() {
        "None yet.".to_string()
    } else {
        lines.join("\n")
    }
}

/// Project the run history onto the chat transcript the model sees.
fn render_conversation(
    state: &ExecutionState,
    registry: &ToolRegistry,
    input: &str,
) -> Vec<ChatMessage> {
    let system = coordinator_prompt(&registry.catalogue(), &progress_summary(state));
    let mut messages = vec![
        ChatMessage::system(system),
        ChatMessage::user(format!(
            "Convert the document at {input}. Write all outputs under {}.",
            output_dir(input)
        )),
    ];

    for message in state.messages().iter().skip(1) {
        match &message.payload {
            Payload::Text { text } => messages.push(ChatMessage::assistant(text.clone())),
            Payload::ToolCall(request) => messages.push(ChatMessage::assistant(
                serde_json::to_string(request).unwrap_or_default(),
            )),
            Payload::ToolResult(tr) => messages.push(ChatMessage::user(
                serde_json::to_string(&tr.result).unwrap_or_default(),
            )),
            Payload::Error { stage, detail } => {
                messages.push(ChatMessage::user(format!("Error in {stage}: {detail}")))
            }
            _ => {}
        }
    }
    messages
}

/// Parse a model reply: a JSON object carrying `tool_name` becomes a
/// [`Payload::ToolCall`]; everything else — prose, malformed JSON, JSON
/// without a tool name — is plain text. Code fences around the JSON are
/// tolerated.
pub(crate) fn parse_reply(content: &str) -> Payload {
    let body = strip_fences(content.trim());
    if body.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(body) {
            if let Some(name) = map.get("tool_name").and_then(|v| v.as_str()) {
                let arguments = map
                    .get("arguments")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                return Payload::ToolCall(ToolCallRequest {
                    tool_name: name.to_string(),
                    arguments,
                });
            }
        }
    }
    Payload::text(content.trim())
}

fn strip_fences(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

// ── Standard tools ───────────────────────────────────────────────────────

/// The standard converter tools, closing over the run's chat function and
/// rendering DPI.
pub fn default_registry(chat: ChatFn, config: &WorkflowConfig) -> ToolRegistry {
    let dpi = config.dpi;
    let mut registry = ToolRegistry::new();

    registry.register(ToolSpec::new(
        "docx_to_pdf_converter",
        "Convert a .docx file to PDF.",
        vec![
            ArgSpec {
                name: "docx_path",
                description: "path of the .docx file to convert",
                required: true,
            },
            ArgSpec {
                name: "output_dir",
                description: "directory the pdf_files/ output lands under",
                required: true,
            },
        ],
        Arc::new(|args: JsonMap| {
            async move {
                let (docx_path, output_dir) =
                    match (str_arg(&args, "docx_path"), str_arg(&args, "output_dir")) {
                        (Ok(d), Ok(o)) => (d, o),
                        (Err(e), _) | (_, Err(e)) => {
                            return ConversionResult::failed(ConversionKind::DocxToPdf, e)
                        }
                    };
                convert_docx_to_pdf(&docx_path, &output_dir).await
            }
            .boxed()
        }),
    ));

    registry.register(ToolSpec::new(
        "pdf_to_png_converter",
        "Rasterise every page of a PDF to PNG images.",
        vec![
            ArgSpec {
                name: "pdf_path",
                description: "path of the PDF file to rasterise",
                required: true,
            },
            ArgSpec {
                name: "output_dir",
                description: "directory the png_files/ output lands under",
                required: true,
            },
        ],
        Arc::new(move |args: JsonMap| {
            async move {
                let (pdf_path, output_dir) =
                    match (str_arg(&args, "pdf_path"), str_arg(&args, "output_dir")) {
                        (Ok(p), Ok(o)) => (p, o),
                        (Err(e), _) | (_, Err(e)) => {
                            return ConversionResult::failed(ConversionKind::PdfToPng, e)
                        }
                    };
                convert_pdf_to_png(&pdf_path, &output_dir, dpi).await
            }
            .boxed()
        }),
    ));

    registry.register(ToolSpec::new(
        "png_to_markdown_converter",
        "Transcribe page PNG images to a single Markdown file.",
        vec![
            ArgSpec {
                name: "png_paths",
                description: "page image paths, in page order",
                required: true,
            },
            ArgSpec {
                name: "output_dir",
                description: "directory the markdown_files/ output lands under",
                required: true,
            },
        ],
        Arc::new(move |args: JsonMap| {
            let chat = chat.clone();
            async move {
                let png_paths = match str_list_arg(&args, "png_paths") {
                    Ok(p) => p,
                    Err(e) => return ConversionResult::failed(ConversionKind::PngToMarkdown, e),
                };
                let output_dir = match str_arg(&args, "output_dir") {
                    Ok(o) => o,
                    Err(e) => return ConversionResult::failed(ConversionKind::PngToMarkdown, e),
                };
                convert_png_to_markdown(&png_paths, &output_dir, &chat).await
            }
            .boxed()
        }),
    ));

    registry
}

fn str_arg(args: &JsonMap, name: &str) -> Result<String, String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| format!("missing or non-string argument '{name}'"))
}

fn str_list_arg(args: &JsonMap, name: &str) -> Result<Vec<String>, String> {
    let list = args
        .get(name)
        .and_then(|v| v.as_array())
        .ok_or_else(|| format!("missing or non-array argument '{name}'"))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("argument '{name}' must contain only strings"))
        })
        .collect()
}

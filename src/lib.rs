//! # docgraph
//!
//! LLM-driven document conversion workflows on a small directed-graph
//! executor.
//!
//! Two workflows ship with the crate:
//!
//! * **Comparison** — given `{base}_original.docx` and `{base}_updated.docx`,
//!   convert each to Markdown (DOCX → PDF → page PNGs → vision-model
//!   transcription), diff the two transcriptions, and explain the diff in
//!   prose.
//! * **Coordination** — given one `.docx`, let an LLM drive the same
//!   converters as tools, one call per turn, until it reports the Markdown
//!   done.
//!
//! Both are graphs of nodes wired by direct and conditional edges and driven
//! by [`engine::run`]. The graph machinery is public: build your own
//! workflow with [`GraphBuilder`], reusing the converters in [`convert`] or
//! registering your own tools in a [`ToolRegistry`].
//!
//! ## Design
//!
//! * **Typed history.** A run's state is an append-only list of [`Message`]s
//!   holding tagged [`Payload`]s. Routers match on payload variants; model
//!   prose can only ever become a `Text` payload.
//! * **Contained failure.** Nodes never raise business failures; a failed
//!   conversion is data in the history, and the success-gated routers turn
//!   it into termination. The engine errs only on contract breaches.
//! * **Bounded execution.** Every run carries a mandatory step limit and an
//!   optional wall-clock deadline and cancellation token, so the
//!   coordinator's model-driven cycle cannot loop forever.
//!
//! ## Quick start
//!
//! ```no_run
//! use docgraph::{workflows, WorkflowConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkflowConfig::builder().dpi(300).max_steps(16).build()?;
//!
//! // Compare ./docs/report_original.docx against ./docs/report_updated.docx.
//! let report = workflows::compare::run("./docs/report", &config).await?;
//! if let Some(message) = report.state.last() {
//!     println!("{:?}", message.payload);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Requires LibreOffice (`soffice`) on the `PATH` for DOCX conversion, the
//! pdfium library for rasterisation, and an LLM API key in the environment
//! (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …) unless a pre-built provider is
//! supplied via [`WorkflowConfig`].

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod graph;
pub mod prompts;
pub mod state;
pub mod tools;
pub mod workflows;

pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use convert::llm::ChatFn;
pub use engine::{run, RunOptions, RunOutcome, RunReport};
pub use error::{CompileError, EngineError, ProviderError, WorkflowError};
pub use graph::{fallible_node, CompiledGraph, FinishCriterion, GraphBuilder, Next, NodeFn};
pub use state::{
    ConversionKind, ConversionResult, DiffResult, DocBranch, ExecutionState, JsonMap, Message,
    PathSet, Payload, PayloadKind, Role, ToolCallRequest, ToolCallResult,
};
pub use tools::{ArgSpec, DispatchDefaults, ToolError, ToolRegistry, ToolSpec};

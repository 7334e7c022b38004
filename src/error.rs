//! Error types for the docgraph library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`CompileError`] — the workflow graph itself is malformed (dangling
//!   edge, unreachable node). Raised once, at construction time, never
//!   during a run.
//!
//! * [`EngineError`] — a contract breach inside a run (a node failed to
//!   append exactly one message, a router targeted an undeclared node).
//!   These are implementation bugs and fail loud.
//!
//! * [`WorkflowError`] — the umbrella returned by the one-call workflow
//!   entry points, covering provider resolution on top of the two above.
//!
//! Everything else — conversion failures, LLM API errors, missing input
//! files — is *data*: it lands in the run history as an `Error` or failed
//! `ConversionResult` payload, routers see it and terminate, and the caller
//! still receives a well-formed final state.

use thiserror::Error;

/// Graph construction failures, detected by `GraphBuilder::compile`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// No entry point was set before compiling.
    #[error("graph has no entry point; call set_entry() before compile()")]
    MissingEntry,

    /// The entry point names a node that was never declared.
    #[error("entry node '{0}' is not declared")]
    UnknownEntry(String),

    /// An edge references a node that was never declared.
    #[error("edge '{from}' -> '{to}' references an undeclared node")]
    UnknownNode { from: String, to: String },

    /// A node has both a direct and a conditional edge.
    #[error("node '{0}' has both a direct and a conditional edge; declare exactly one")]
    ConflictingEdges(String),

    /// A declared node can never be reached from the entry point.
    #[error("node '{0}' is unreachable from the entry point")]
    Unreachable(String),

    /// The designated finish node was never declared.
    #[error("finish node '{0}' is not declared")]
    UnknownFinishNode(String),
}

/// Engine invariant violations.
///
/// Never raised for a node's own business-logic failure — those are
/// contained at the node boundary and encoded into the run history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A node returned a state that is not its input extended by exactly
    /// one message.
    #[error(
        "node '{node}' broke the append contract: expected state length {expected_len}, got {actual_len}"
    )]
    AppendContract {
        node: String,
        expected_len: usize,
        actual_len: usize,
    },

    /// A router returned the name of a node the compiled graph does not hold.
    #[error("router after '{from}' targeted undeclared node '{target}'")]
    UnknownTarget { from: String, target: String },
}

/// No usable LLM provider could be resolved from config or environment.
#[derive(Debug, Clone, Error)]
#[error("LLM provider '{provider}' is not configured: {hint}")]
pub struct ProviderError {
    pub provider: String,
    pub hint: String,
}

/// Umbrella error for the one-call workflow entry points.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_contract_display() {
        let e = EngineError::AppendContract {
            node: "dispatch".into(),
            expected_len: 3,
            actual_len: 5,
        };
        let msg = e.to_string();
        assert!(msg.contains("dispatch"), "got: {msg}");
        assert!(msg.contains("expected state length 3"), "got: {msg}");
    }

    #[test]
    fn unknown_node_display() {
        let e = CompileError::UnknownNode {
            from: "coordinator".into(),
            to: "nowhere".into(),
        };
        assert!(e.to_string().contains("'coordinator' -> 'nowhere'"));
    }

    #[test]
    fn provider_error_display() {
        let e = ProviderError {
            provider: "auto".into(),
            hint: "set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }
}

//! Workflow graph construction and compilation.
//!
//! A [`GraphBuilder`] declares named nodes, direct edges, conditional edges
//! (governed by routers), an entry point, and a finish criterion, then
//! compiles into an immutable [`CompiledGraph`]. Compilation validates the
//! wiring — dangling edges, conflicting edges, and unreachable nodes are
//! construction errors, caught once, not run-time surprises.
//!
//! ## Node contract
//!
//! A node consumes the current [`ExecutionState`] and returns it extended by
//! exactly one message. A node must contain its own failures: anything that
//! can go wrong inside it becomes an `Error` payload in the returned state
//! so downstream routers can see it and terminate. [`fallible_node`] wraps a
//! `Result`-returning step into that shape.
//!
//! ## Router contract
//!
//! A router is a pure, synchronous function from the current state to
//! [`Next`]. It inspects the most recent message(s) only and must answer an
//! absent or unexpected payload with [`Next::End`] — routing failure is
//! always "stop", never "crash".

use crate::error::CompileError;
use crate::state::{ExecutionState, Message, Payload};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A unit of work: consumes the state, returns it extended by one message.
pub type NodeFn = Arc<dyn Fn(ExecutionState) -> BoxFuture<'static, ExecutionState> + Send + Sync>;

/// A routing decision function attached to a conditional edge.
pub type RouterFn = Arc<dyn Fn(&ExecutionState) -> Next + Send + Sync>;

/// Where execution goes after a node: a named successor, or the terminal
/// sentinel ending the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Node(String),
    End,
}

impl Next {
    pub fn node(name: impl Into<String>) -> Self {
        Next::Node(name.into())
    }
}

/// When a run is considered finished, beyond routers returning [`Next::End`].
///
/// The three variants are equally valid; which one a workflow uses is the
/// workflow's choice, not the engine's.
#[derive(Clone, Default)]
pub enum FinishCriterion {
    /// Only routers and leaf nodes end the run (default).
    #[default]
    Sentinel,
    /// Completion of the named node always ends the run.
    Node(String),
    /// Evaluated on the new state after every node execution.
    Predicate(Arc<dyn Fn(&ExecutionState) -> bool + Send + Sync>),
}

impl fmt::Debug for FinishCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishCriterion::Sentinel => f.write_str("Sentinel"),
            FinishCriterion::Node(n) => f.debug_tuple("Node").field(n).finish(),
            FinishCriterion::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// Wrap an async step returning `Result<Payload, String>` into a [`NodeFn`]
/// that appends the payload on success and an `Error { stage, .. }` payload
/// on failure. This is the standard way failures are contained at the node
/// boundary.
pub fn fallible_node<F, Fut>(stage: &'static str, f: F) -> NodeFn
where
    F: Fn(ExecutionState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, String>> + Send + 'static,
{
    Arc::new(move |state: ExecutionState| {
        let step = f(state.clone());
        async move {
            let payload = match step.await {
                Ok(payload) => payload,
                Err(detail) => Payload::error(stage, detail),
            };
            state.appended(Message::assistant(payload))
        }
        .boxed()
    })
}

/// Declarative builder for a workflow graph.
///
/// # Example
/// ```
/// use docgraph::{GraphBuilder, Next, Payload, Message, ExecutionState};
///
/// let graph = GraphBuilder::new()
///     .add_node("greet", |state: ExecutionState| async move {
///         state.appended(Message::assistant(Payload::text("hello")))
///     })
///     .set_entry("greet")
///     .compile()
///     .unwrap();
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<String, NodeFn>,
    direct_edges: HashMap<String, String>,
    conditional_edges: HashMap<String, RouterFn>,
    entry: Option<String>,
    finish: FinishCriterion,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node from an async function.
    pub fn add_node<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ExecutionState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExecutionState> + Send + 'static,
    {
        self.nodes
            .insert(name.into(), Arc::new(move |state| f(state).boxed()));
        self
    }

    /// Declare a pre-built node (e.g. from [`fallible_node`]).
    pub fn add_node_fn(mut self, name: impl Into<String>, node: NodeFn) -> Self {
        self.nodes.insert(name.into(), node);
        self
    }

    /// Unconditional edge: after `from` completes, run `to`.
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.direct_edges.insert(from.into(), to.into());
        self
    }

    /// Conditional edge: after `from` completes, ask `router` where to go.
    pub fn add_conditional_edge<R>(mut self, from: impl Into<String>, router: R) -> Self
    where
        R: Fn(&ExecutionState) -> Next + Send + Sync + 'static,
    {
        self.conditional_edges.insert(from.into(), Arc::new(router));
        self
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn set_finish(mut self, finish: FinishCriterion) -> Self {
        self.finish = finish;
        self
    }

    /// Validate the wiring and freeze the graph.
    ///
    /// Pure and side-effect-free; the returned [`CompiledGraph`] is immutable
    /// and safe to share across concurrent runs.
    pub fn compile(self) -> Result<CompiledGraph, CompileError> {
        let entry = self.entry.clone().ok_or(CompileError::MissingEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(CompileError::UnknownEntry(entry));
        }

        for (from, to) in &self.direct_edges {
            if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
                return Err(CompileError::UnknownNode {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
        for from in self.conditional_edges.keys() {
            if !self.nodes.contains_key(from) {
                return Err(CompileError::UnknownNode {
                    from: from.clone(),
                    to: "<conditional>".to_string(),
                });
            }
            if self.direct_edges.contains_key(from) {
                return Err(CompileError::ConflictingEdges(from.clone()));
            }
        }
        if let FinishCriterion::Node(name) = &self.finish {
            if !self.nodes.contains_key(name) {
                return Err(CompileError::UnknownFinishNode(name.clone()));
            }
        }

        self.check_reachability(&entry)?;

        Ok(CompiledGraph {
            nodes: self.nodes,
            direct_edges: self.direct_edges,
            conditional_edges: self.conditional_edges,
            entry,
            finish: self.finish,
        })
    }

    /// Walk direct edges from the entry. Router targets are dynamic, so any
    /// reachable conditional edge is treated as able to reach every node;
    /// the check still catches nodes orphaned in a purely direct-edge graph.
    fn check_reachability(&self, entry: &str) -> Result<(), CompileError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        seen.insert(entry);
        queue.push_back(entry);

        let mut saw_conditional = false;
        while let Some(name) = queue.pop_front() {
            if self.conditional_edges.contains_key(name) {
                saw_conditional = true;
            }
            if let Some(to) = self.direct_edges.get(name) {
                if seen.insert(to) {
                    queue.push_back(to);
                }
            }
        }

        if saw_conditional {
            return Ok(());
        }
        for name in self.nodes.keys() {
            if !seen.contains(name.as_str()) {
                return Err(CompileError::Unreachable(name.clone()));
            }
        }
        Ok(())
    }
}

/// The validated, immutable form of a workflow graph.
///
/// Constructed once via [`GraphBuilder::compile`] and reused across runs;
/// per-run state lives entirely in the [`ExecutionState`] each run owns.
#[derive(Clone)]
pub struct CompiledGraph {
    nodes: HashMap<String, NodeFn>,
    direct_edges: HashMap<String, String>,
    conditional_edges: HashMap<String, RouterFn>,
    entry: String,
    finish: FinishCriterion,
}

impl CompiledGraph {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn finish(&self) -> &FinishCriterion {
        &self.finish
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub(crate) fn node(&self, name: &str) -> Option<&NodeFn> {
        self.nodes.get(name)
    }

    pub(crate) fn router(&self, name: &str) -> Option<&RouterFn> {
        self.conditional_edges.get(name)
    }

    pub(crate) fn direct_edge(&self, name: &str) -> Option<&str> {
        self.direct_edges.get(name).map(String::as_str)
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        nodes.sort_unstable();
        f.debug_struct("CompiledGraph")
            .field("nodes", &nodes)
            .field("entry", &self.entry)
            .field("finish", &self.finish)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> NodeFn {
        Arc::new(|state: ExecutionState| {
            async move { state.appended(Message::assistant(Payload::text("ok"))) }.boxed()
        })
    }

    #[test]
    fn compile_rejects_missing_entry() {
        let err = GraphBuilder::new().add_node_fn("a", noop()).compile();
        assert_eq!(err.unwrap_err(), CompileError::MissingEntry);
    }

    #[test]
    fn compile_rejects_unknown_entry() {
        let err = GraphBuilder::new()
            .add_node_fn("a", noop())
            .set_entry("b")
            .compile();
        assert_eq!(err.unwrap_err(), CompileError::UnknownEntry("b".into()));
    }

    #[test]
    fn compile_rejects_dangling_edge() {
        let err = GraphBuilder::new()
            .add_node_fn("a", noop())
            .add_edge("a", "ghost")
            .set_entry("a")
            .compile();
        assert_eq!(
            err.unwrap_err(),
            CompileError::UnknownNode {
                from: "a".into(),
                to: "ghost".into()
            }
        );
    }

    #[test]
    fn compile_rejects_conflicting_edges() {
        let err = GraphBuilder::new()
            .add_node_fn("a", noop())
            .add_node_fn("b", noop())
            .add_edge("a", "b")
            .add_conditional_edge("a", |_| Next::End)
            .set_entry("a")
            .compile();
        assert_eq!(err.unwrap_err(), CompileError::ConflictingEdges("a".into()));
    }

    #[test]
    fn compile_rejects_unreachable_node() {
        let err = GraphBuilder::new()
            .add_node_fn("a", noop())
            .add_node_fn("orphan", noop())
            .set_entry("a")
            .compile();
        assert_eq!(err.unwrap_err(), CompileError::Unreachable("orphan".into()));
    }

    #[test]
    fn conditional_edge_makes_all_nodes_reachable() {
        let graph = GraphBuilder::new()
            .add_node_fn("a", noop())
            .add_node_fn("b", noop())
            .add_conditional_edge("a", |_| Next::node("b"))
            .set_entry("a")
            .compile();
        assert!(graph.is_ok());
    }

    #[test]
    fn compile_rejects_unknown_finish_node() {
        let err = GraphBuilder::new()
            .add_node_fn("a", noop())
            .set_entry("a")
            .set_finish(FinishCriterion::Node("ghost".into()))
            .compile();
        assert_eq!(
            err.unwrap_err(),
            CompileError::UnknownFinishNode("ghost".into())
        );
    }
}

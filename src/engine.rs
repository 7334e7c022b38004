//! The execution engine: drives one run of a compiled graph to completion.
//!
//! ## Termination is structural, not emergent
//!
//! The coordinator workflow contains a deliberate cycle (coordinator ⇄
//! dispatch), so a correct finish cannot be left to router logic alone.
//! Every run carries a mandatory step bound; exceeding it ends the run with
//! [`RunOutcome::StepLimitExceeded`] instead of looping forever on a model
//! that never produces a final answer.
//!
//! ## What the engine will and will not raise
//!
//! Business failures never surface here — nodes contain them as `Error`
//! payloads and routers terminate on them. The engine returns
//! `Err(EngineError)` only for contract breaches: a node that does not
//! append exactly one message, or a router that targets a node the graph
//! does not hold. Those are bugs in the workflow definition, not conditions
//! a caller should handle gracefully.
//!
//! ## Cancellation
//!
//! Each step races the node future against the run's cancellation token and
//! deadline. The external-collaborator calls (LibreOffice, pdfium, LLM APIs)
//! live inside node futures, so dropping the future at the select point
//! abandons the in-flight call; the state returned with
//! [`RunOutcome::Cancelled`] / [`RunOutcome::Timeout`] is the history as of
//! the last completed node.

use crate::error::EngineError;
use crate::graph::{CompiledGraph, FinishCriterion, Next};
use crate::state::ExecutionState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The finish criterion was met or a router returned the terminal sentinel.
    Completed,
    /// The mandatory step bound was hit before any finish condition.
    StepLimitExceeded,
    /// The per-run deadline elapsed.
    Timeout,
    /// The run's cancellation token fired.
    Cancelled,
}

/// Per-run execution limits.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum node executions before the run is cut off. Mandatory bound;
    /// there is no "unlimited".
    pub max_steps: usize,
    /// Wall-clock budget for the whole run.
    pub deadline: Option<Duration>,
    /// Cooperative cancellation, checked before and during every step.
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_steps: 24,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl RunOptions {
    pub fn max_steps(mut self, n: usize) -> Self {
        self.max_steps = n;
        self
    }

    pub fn deadline(mut self, d: Duration) -> Self {
        self.deadline = Some(d);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// The result of a completed (in any sense) run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The full history: seed message plus one message per executed node.
    pub state: ExecutionState,
    pub outcome: RunOutcome,
    /// Number of node executions actually performed.
    pub steps: usize,
}

/// Drive one run of `graph` from its entry node to completion.
///
/// The engine owns nothing between runs: `graph` is shared immutably and
/// `initial` is owned by this run alone, so any number of runs may execute
/// concurrently against the same compiled graph.
pub async fn run(
    graph: &CompiledGraph,
    initial: ExecutionState,
    options: RunOptions,
) -> Result<RunReport, EngineError> {
    let deadline_at = options
        .deadline
        .map(|d| tokio::time::Instant::now() + d);

    let mut state = initial;
    let mut current = graph.entry().to_string();
    let mut steps = 0usize;

    if options.max_steps == 0 {
        return Ok(RunReport {
            state,
            outcome: RunOutcome::StepLimitExceeded,
            steps,
        });
    }

    loop {
        if options.cancel.is_cancelled() {
            return Ok(RunReport {
                state,
                outcome: RunOutcome::Cancelled,
                steps,
            });
        }

        // Entry is validated at compile time and router targets are checked
        // below before they become `current`, so this lookup cannot miss.
        let node = graph
            .node(&current)
            .ok_or_else(|| EngineError::UnknownTarget {
                from: "<engine>".to_string(),
                target: current.clone(),
            })?;

        debug!(node = %current, step = steps + 1, "executing node");
        let expected_len = state.len() + 1;

        // Keep a snapshot so a cancelled or timed-out step can still return
        // the history as of the last completed node.
        let snapshot = state.clone();
        let node_fut = node(state);
        let timeout_fut = async {
            match deadline_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = options.cancel.cancelled() => {
                warn!(node = %current, "run cancelled mid-step");
                return Ok(RunReport { state: snapshot, outcome: RunOutcome::Cancelled, steps });
            }
            _ = timeout_fut => {
                warn!(node = %current, "run deadline elapsed mid-step");
                return Ok(RunReport { state: snapshot, outcome: RunOutcome::Timeout, steps });
            }
            new_state = node_fut => {
                state = new_state;
            }
        }

        if state.len() != expected_len {
            return Err(EngineError::AppendContract {
                node: current,
                expected_len,
                actual_len: state.len(),
            });
        }
        steps += 1;

        match graph.finish() {
            FinishCriterion::Predicate(p) if p(&state) => {
                debug!(steps, "finish predicate satisfied");
                return Ok(RunReport {
                    state,
                    outcome: RunOutcome::Completed,
                    steps,
                });
            }
            FinishCriterion::Node(name) if name == &current => {
                debug!(steps, node = %current, "finish node completed");
                return Ok(RunReport {
                    state,
                    outcome: RunOutcome::Completed,
                    steps,
                });
            }
            _ => {}
        }

        let next = if let Some(router) = graph.router(&current) {
            router(&state)
        } else if let Some(to) = graph.direct_edge(&current) {
            Next::Node(to.to_string())
        } else {
            Next::End // leaf node
        };

        match next {
            Next::End => {
                debug!(steps, "terminal sentinel reached");
                return Ok(RunReport {
                    state,
                    outcome: RunOutcome::Completed,
                    steps,
                });
            }
            Next::Node(target) => {
                if !graph.has_node(&target) {
                    return Err(EngineError::UnknownTarget {
                        from: current,
                        target,
                    });
                }
                if steps >= options.max_steps {
                    warn!(steps, max_steps = options.max_steps, "step limit exceeded");
                    return Ok(RunReport {
                        state,
                        outcome: RunOutcome::StepLimitExceeded,
                        steps,
                    });
                }
                current = target;
            }
        }
    }
}

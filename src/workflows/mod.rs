//! The two shipped workflows, each a compiled graph plus a one-call entry
//! point.
//!
//! * [`compare`] — transcribe two versions of a document and explain their
//!   diff. A fixed pipeline: routers only gate on success.
//! * [`coordinator`] — convert one document, with an LLM choosing the next
//!   tool each turn. A deliberate cycle bounded by the run's step limit.
//!
//! Both build their graphs against a [`ChatFn`](crate::convert::llm::ChatFn),
//! so tests drive them with scripted chat closures and no provider.

use crate::config::WorkflowConfig;
use crate::engine::RunOptions;
use std::time::Duration;

pub mod compare;
pub mod coordinator;

/// Derive the per-run execution limits from a workflow config.
pub(crate) fn run_options(config: &WorkflowConfig) -> RunOptions {
    let mut options = RunOptions::default().max_steps(config.max_steps);
    if let Some(secs) = config.run_timeout_secs {
        options = options.deadline(Duration::from_secs(secs));
    }
    options
}

//! The chat seam: a single callable shape for every LLM interaction.
//!
//! Nodes never talk to a provider directly; they hold a [`ChatFn`]. In
//! production the function wraps an `edgequake_llm` provider and carries the
//! retry policy; in tests it is a plain closure returning scripted replies.
//! That one indirection is what makes every workflow graph runnable against
//! stubs.
//!
//! ## Retry strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent. The
//! wrapper retries with exponential backoff (`retry_backoff_ms * 2^attempt`);
//! with the default 500 ms base and 3 retries the wait sequence is
//! 500 ms → 1 s → 2 s.

use crate::config::WorkflowConfig;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// One chat completion: messages in, reply text out. Failures are data.
pub type ChatFn =
    Arc<dyn Fn(Vec<ChatMessage>) -> BoxFuture<'static, Result<String, String>> + Send + Sync>;

/// Wrap a provider into a [`ChatFn`] carrying the config's sampling options
/// and retry policy.
pub fn provider_chat(provider: Arc<dyn LLMProvider>, config: &WorkflowConfig) -> ChatFn {
    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    };
    let max_retries = config.max_retries;
    let backoff_ms = config.retry_backoff_ms;

    Arc::new(move |messages: Vec<ChatMessage>| {
        let provider = Arc::clone(&provider);
        let options = options.clone();
        async move {
            let mut last_err = String::new();
            for attempt in 0..=max_retries {
                if attempt > 0 {
                    let backoff = backoff_ms * 2u64.pow(attempt - 1);
                    warn!(attempt, max_retries, backoff_ms = backoff, "retrying chat call");
                    sleep(Duration::from_millis(backoff)).await;
                }
                match provider.chat(&messages, Some(&options)).await {
                    Ok(response) => {
                        debug!(
                            prompt_tokens = response.prompt_tokens,
                            completion_tokens = response.completion_tokens,
                            "chat call succeeded"
                        );
                        return Ok(response.content);
                    }
                    Err(e) => last_err = format!("{e}"),
                }
            }
            Err(last_err)
        }
        .boxed()
    })
}

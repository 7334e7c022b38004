//! Configuration for document workflows.
//!
//! Every knob lives in [`WorkflowConfig`], built via its
//! [`WorkflowConfigBuilder`]. Keeping the knobs in one struct makes it
//! trivial to share a config across a graph's node closures and to diff two
//! runs to understand why their outputs differ.

use crate::error::{ProviderError, WorkflowError};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;

/// Configuration for a workflow run.
///
/// Built via [`WorkflowConfig::builder()`] or [`WorkflowConfig::default()`].
///
/// # Example
/// ```rust
/// use docgraph::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .dpi(150)
///     .model("gpt-4.1-nano")
///     .max_steps(16)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 300.
    ///
    /// 300 DPI keeps small fonts legible for the vision model; the renderer
    /// additionally caps the longest image edge so outsized pages cannot
    /// exhaust memory regardless of DPI.
    pub dpi: u32,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, auto-detects from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Low temperature keeps transcription faithful to the page and keeps
    /// the coordinator's tool-call JSON parseable.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient LLM API failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Maximum node executions per run. Default: 24.
    ///
    /// The coordinator workflow cycles between the coordinator and dispatch
    /// nodes; this bound is what guarantees the cycle terminates even when
    /// the model never produces a final answer.
    pub max_steps: usize,

    /// Wall-clock budget for a whole run, in seconds. Default: none.
    pub run_timeout_secs: Option<u64>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_steps: 24,
            run_timeout_secs: None,
        }
    }
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("dpi", &self.dpi)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_steps", &self.max_steps)
            .field("run_timeout_secs", &self.run_timeout_secs)
            .finish()
    }
}

impl WorkflowConfig {
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the LLM provider, from most-specific to least-specific:
    ///
    /// 1. **Pre-built provider** (`self.provider`) — used as-is. The route
    ///    tests take, and the route for callers needing custom middleware.
    /// 2. **Named provider + model** (`self.provider_name`) — the factory
    ///    reads the matching API key (`OPENAI_API_KEY`, …) from the
    ///    environment.
    /// 3. **OpenAI preference** — an `OPENAI_API_KEY` in the environment
    ///    wins over full auto-detection, so users holding several keys get
    ///    a predictable default.
    /// 4. **Full auto-detection** (`ProviderFactory::from_env`) — first
    ///    available provider from any known API key variable.
    pub fn resolve_provider(&self) -> Result<Arc<dyn LLMProvider>, ProviderError> {
        if let Some(ref provider) = self.provider {
            return Ok(Arc::clone(provider));
        }

        let model = self.model.as_deref().unwrap_or("gpt-4.1-nano");

        if let Some(ref name) = self.provider_name {
            return ProviderFactory::create_llm_provider(name, model).map_err(|e| ProviderError {
                provider: name.clone(),
                hint: format!("{e}"),
            });
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                return ProviderFactory::create_llm_provider("openai", model).map_err(|e| {
                    ProviderError {
                        provider: "openai".to_string(),
                        hint: format!("{e}"),
                    }
                });
            }
        }

        let (provider, _embedding) = ProviderFactory::from_env().map_err(|e| ProviderError {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;
        Ok(provider)
    }
}

/// Builder for [`WorkflowConfig`].
#[derive(Debug)]
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_steps(mut self, n: usize) -> Self {
        self.config.max_steps = n.max(1);
        self
    }

    pub fn run_timeout_secs(mut self, secs: u64) -> Self {
        self.config.run_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, WorkflowError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(WorkflowError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_steps == 0 {
            return Err(WorkflowError::InvalidConfig(
                "max_steps must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_dpi() {
        let config = WorkflowConfig::builder().dpi(10_000).build().unwrap();
        assert_eq!(config.dpi, 400);
        let config = WorkflowConfig::builder().dpi(1).build().unwrap();
        assert_eq!(config.dpi, 72);
    }

    #[test]
    fn builder_keeps_max_steps_positive() {
        let config = WorkflowConfig::builder().max_steps(0).build().unwrap();
        assert_eq!(config.max_steps, 1);
    }

    #[test]
    fn default_has_sane_limits() {
        let config = WorkflowConfig::default();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.max_steps, 24);
        assert!(config.run_timeout_secs.is_none());
    }
}

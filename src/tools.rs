//! Tool registry: the lookup-and-invoke mechanism behind the dispatch node.
//!
//! The coordinator LLM names tools; the registry turns a
//! [`ToolCallRequest`] into a [`ToolCallResult`]. Two details are part of
//! the contract, not incidental:
//!
//! * **Argument completion** — the model routinely omits arguments it was
//!   never told (the output directory is derived from the input path, which
//!   only the run knows). `dispatch` fills any missing required argument
//!   from run-level defaults before invoking.
//!
//! * **Failure containment** — an unknown tool is a [`ToolError`], which the
//!   dispatch node converts into an `Error` payload. A tool whose underlying
//!   conversion fails reports that inside `ConversionResult::error`; it is
//!   never a fault.

use crate::state::{ConversionResult, JsonMap, ToolCallRequest, ToolCallResult};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// The invocable behind a tool: normalised arguments in, structured result out.
pub type ToolFn = Arc<dyn Fn(JsonMap) -> BoxFuture<'static, ConversionResult> + Send + Sync>;

/// One argument in a tool's calling contract.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// A registered tool: name, argument contract, and the invocable itself.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub args: Vec<ArgSpec>,
    invoke: ToolFn,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        args: Vec<ArgSpec>,
        invoke: ToolFn,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args,
            invoke,
        }
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// Tool lookup failures surfaced by [`ToolRegistry::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    NotFound(String),
}

/// Run-level argument defaults used to complete omitted tool arguments.
#[derive(Debug, Clone, Default)]
pub struct DispatchDefaults {
    values: JsonMap,
}

impl DispatchDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// The usual default: an output directory derived from the input path.
    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.values
            .insert("output_dir".to_string(), dir.into().into());
        self
    }

    pub fn set(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

/// Maps tool names to invocable operations. Immutable once built; safe to
/// share across concurrent runs behind an `Arc`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration with the same name replaces the
    /// earlier one.
    pub fn register(&mut self, spec: ToolSpec) {
        self.tools.retain(|t| t.name != spec.name);
        self.tools.push(spec);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the tool catalogue for the coordinator's system prompt.
    pub fn catalogue(&self) -> String {
        let mut out = String::new();
        for tool in &self.tools {
            out.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            for arg in &tool.args {
                out.push_str(&format!(
                    "    {} ({}): {}\n",
                    arg.name,
                    if arg.required { "required" } else { "optional" },
                    arg.description
                ));
            }
        }
        out
    }

    /// Look up and invoke the requested tool.
    ///
    /// Any required argument the request omits is filled from `defaults`
    /// when a default of that name exists; arguments the caller did supply
    /// are never overwritten.
    pub async fn dispatch(
        &self,
        request: &ToolCallRequest,
        defaults: &DispatchDefaults,
    ) -> Result<ToolCallResult, ToolError> {
        let tool = self
            .get(&request.tool_name)
            .ok_or_else(|| ToolError::NotFound(request.tool_name.clone()))?;

        let mut arguments = request.arguments.clone();
        for arg in &tool.args {
            if arg.required && !arguments.contains_key(arg.name) {
                if let Some(value) = defaults.values.get(arg.name) {
                    debug!(tool = %tool.name, arg = arg.name, "filling omitted argument from run defaults");
                    arguments.insert(arg.name.to_string(), value.clone());
                }
            }
        }

        let result = (tool.invoke)(arguments).await;
        Ok(ToolCallResult {
            tool_name: tool.name.clone(),
            result,
        })
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConversionKind;
    use futures::FutureExt;
    use std::sync::Mutex;

    fn echo_tool(seen: Arc<Mutex<Option<JsonMap>>>) -> ToolSpec {
        ToolSpec::new(
            "echo",
            "records its arguments",
            vec![
                ArgSpec {
                    name: "docx_path",
                    description: "input",
                    required: true,
                },
                ArgSpec {
                    name: "output_dir",
                    description: "destination",
                    required: true,
                },
            ],
            Arc::new(move |args| {
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().unwrap() = Some(args);
                    ConversionResult::ok(ConversionKind::DocxToPdf, vec!["out.pdf".into()])
                }
                .boxed()
            }),
        )
    }

    #[tokio::test]
    async fn dispatch_fills_missing_required_argument() {
        let seen = Arc::new(Mutex::new(None));
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool(Arc::clone(&seen)));

        let request = ToolCallRequest {
            tool_name: "echo".into(),
            arguments: serde_json::from_str(r#"{"docx_path": "x.docx"}"#).unwrap(),
        };
        let defaults = DispatchDefaults::new().with_output_dir("./docs");

        let result = registry.dispatch(&request, &defaults).await.unwrap();
        assert!(result.result.success);

        let args = seen.lock().unwrap().clone().unwrap();
        assert_eq!(args["docx_path"], "x.docx");
        assert_eq!(args["output_dir"], "./docs");
    }

    #[tokio::test]
    async fn dispatch_never_overwrites_supplied_arguments() {
        let seen = Arc::new(Mutex::new(None));
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool(Arc::clone(&seen)));

        let request = ToolCallRequest {
            tool_name: "echo".into(),
            arguments: serde_json::from_str(
                r#"{"docx_path": "x.docx", "output_dir": "/explicit"}"#,
            )
            .unwrap(),
        };
        let defaults = DispatchDefaults::new().with_output_dir("./docs");

        registry.dispatch(&request, &defaults).await.unwrap();
        let args = seen.lock().unwrap().clone().unwrap();
        assert_eq!(args["output_dir"], "/explicit");
    }

    #[tokio::test]
    async fn dispatch_reports_unknown_tool() {
        let registry = ToolRegistry::new();
        let request = ToolCallRequest {
            tool_name: "nonexistent".into(),
            arguments: JsonMap::new(),
        };
        let err = registry
            .dispatch(&request, &DispatchDefaults::new())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::NotFound("nonexistent".into()));
    }
}

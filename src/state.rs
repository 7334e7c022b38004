//! Run history: typed messages and the append-only execution state.
//!
//! ## Why typed payloads?
//!
//! Every decision a router makes — "did that conversion succeed?", "is the
//! model asking for a tool?" — is answered by matching on a [`Payload`]
//! variant, never by substring-searching prose. A malformed LLM reply can
//! therefore only ever become a `FreeText` payload; it cannot crash a router
//! or smuggle structure into the run through an evaluated string.
//!
//! ## Why append-only?
//!
//! [`ExecutionState`] is the complete audit trail of a run. A node receives
//! the state by value and returns it extended by exactly one [`Message`]
//! (the engine enforces this). Progress is derived by scanning the payload
//! tags already present — there is no side-channel scratch pad to drift out
//! of sync with the history.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Speaker of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    System,
    Assistant,
}

/// Which of the two parallel document sub-flows produced a result.
///
/// Carried explicitly on [`ConversionResult`] so routers branch on a field,
/// not on a string prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocBranch {
    Original,
    Updated,
}

/// Which conversion stage produced a [`ConversionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    DocxToPdf,
    PdfToPng,
    PngToMarkdown,
}

/// Resolved input paths for a comparison run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSet {
    pub original_docx: String,
    pub updated_docx: String,
    pub base_dir: String,
    pub doc_name: String,
}

impl PathSet {
    /// Resolve `{base}_original.docx` and `{base}_updated.docx` from a base
    /// path, verifying both exist before any conversion starts.
    ///
    /// A trailing `.docx` on `base` is tolerated and stripped, so both
    /// `./docs/report` and `./docs/report.docx` name the same pair.
    pub fn from_base(base: &str) -> Result<Self, String> {
        let base = base.strip_suffix(".docx").unwrap_or(base);
        if base.is_empty() {
            return Err("input path is empty".to_string());
        }

        let original = format!("{base}_original.docx");
        let updated = format!("{base}_updated.docx");

        if !Path::new(&original).exists() {
            return Err(format!("original file not found at {original}"));
        }
        if !Path::new(&updated).exists() {
            return Err(format!("updated file not found at {updated}"));
        }

        let base_path = Path::new(base);
        let base_dir = base_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let doc_name = base_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        Ok(Self {
            original_docx: original,
            updated_docx: updated,
            base_dir,
            doc_name,
        })
    }

    /// Path of the named branch's source document.
    pub fn docx_for(&self, branch: DocBranch) -> &str {
        match branch {
            DocBranch::Original => &self.original_docx,
            DocBranch::Updated => &self.updated_docx,
        }
    }
}

/// Outcome of one external conversion call.
///
/// Failure is data: a failed conversion is `success: false` with a populated
/// `error`, never a propagated fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub kind: ConversionKind,
    /// Set when the result belongs to one of the comparison sub-flows.
    pub branch: Option<DocBranch>,
    pub success: bool,
    /// Produced file paths, in page order for `PdfToPng`.
    pub outputs: Vec<String>,
    pub error: String,
}

impl ConversionResult {
    pub fn ok(kind: ConversionKind, outputs: Vec<String>) -> Self {
        Self {
            kind,
            branch: None,
            success: true,
            outputs,
            error: String::new(),
        }
    }

    pub fn failed(kind: ConversionKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            branch: None,
            success: false,
            outputs: Vec::new(),
            error: error.into(),
        }
    }

    pub fn with_branch(mut self, branch: DocBranch) -> Self {
        self.branch = Some(branch);
        self
    }

    /// First output path, if the conversion produced any.
    pub fn first_output(&self) -> Option<&str> {
        self.outputs.first().map(String::as_str)
    }
}

/// Unified diff between the two transcribed documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub diff_text: String,
    pub success: bool,
    pub error: String,
}

/// Arbitrary JSON arguments attached to a tool call.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// A tool invocation requested by the coordinator LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: JsonMap,
}

/// The dispatched result of a [`ToolCallRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub result: ConversionResult,
}

/// The tagged content of one [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// A contained failure: which stage failed and why.
    Error { stage: String, detail: String },
    Paths(PathSet),
    Conversion(ConversionResult),
    Diff(DiffResult),
    ToolCall(ToolCallRequest),
    ToolResult(ToolCallResult),
    /// LLM free-form reply with no pending tool call, or the seed input.
    Text { text: String },
}

/// Discriminant of a [`Payload`], used for reverse-scan lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Error,
    Paths,
    Conversion,
    Diff,
    ToolCall,
    ToolResult,
    Text,
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text { text: text.into() }
    }

    pub fn error(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Payload::Error {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Error { .. } => PayloadKind::Error,
            Payload::Paths(_) => PayloadKind::Paths,
            Payload::Conversion(_) => PayloadKind::Conversion,
            Payload::Diff(_) => PayloadKind::Diff,
            Payload::ToolCall(_) => PayloadKind::ToolCall,
            Payload::ToolResult(_) => PayloadKind::ToolResult,
            Payload::Text { .. } => PayloadKind::Text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Payload::Error { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_conversion(&self) -> Option<&ConversionResult> {
        match self {
            Payload::Conversion(c) => Some(c),
            _ => None,
        }
    }
}

/// One immutable unit of run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub payload: Payload,
}

impl Message {
    pub fn user(payload: Payload) -> Self {
        Self {
            role: Role::User,
            payload,
        }
    }

    pub fn system(payload: Payload) -> Self {
        Self {
            role: Role::System,
            payload,
        }
    }

    pub fn assistant(payload: Payload) -> Self {
        Self {
            role: Role::Assistant,
            payload,
        }
    }
}

/// The ordered, append-only history of one run.
///
/// Owned exclusively by its run; a node takes the state by value and returns
/// it extended via [`ExecutionState::appended`]. After N node executions the
/// length equals the seed length plus N.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    messages: Vec<Message>,
}

impl ExecutionState {
    /// A fresh state holding one seed message.
    pub fn seeded(initial: Message) -> Self {
        Self {
            messages: vec![initial],
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Return the state extended by one message. The only way history grows.
    #[must_use]
    pub fn appended(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Most recent message whose payload carries the wanted tag.
    pub fn latest(&self, kind: PayloadKind) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.payload.kind() == kind)
    }

    /// Most recent [`PathSet`] in the history.
    pub fn latest_paths(&self) -> Option<&PathSet> {
        self.messages.iter().rev().find_map(|m| match &m.payload {
            Payload::Paths(p) => Some(p),
            _ => None,
        })
    }

    /// Most recent conversion result of the given stage and branch.
    pub fn latest_conversion(
        &self,
        kind: ConversionKind,
        branch: DocBranch,
    ) -> Option<&ConversionResult> {
        self.messages.iter().rev().find_map(|m| match &m.payload {
            Payload::Conversion(c) if c.kind == kind && c.branch == Some(branch) => Some(c),
            _ => None,
        })
    }

    /// Locate the most recent conversion result for each branch of the given
    /// stage in one reverse pass, stopping as soon as both are found.
    pub fn branch_pair(
        &self,
        kind: ConversionKind,
    ) -> (Option<&ConversionResult>, Option<&ConversionResult>) {
        let mut original = None;
        let mut updated = None;
        for message in self.messages.iter().rev() {
            if let Payload::Conversion(c) = &message.payload {
                if c.kind == kind {
                    match c.branch {
                        Some(DocBranch::Original) if original.is_none() => original = Some(c),
                        Some(DocBranch::Updated) if updated.is_none() => updated = Some(c),
                        _ => {}
                    }
                }
            }
            if original.is_some() && updated.is_some() {
                break;
            }
        }
        (original, updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(kind: ConversionKind, branch: DocBranch, out: &str) -> Message {
        Message::assistant(Payload::Conversion(
            ConversionResult::ok(kind, vec![out.to_string()]).with_branch(branch),
        ))
    }

    #[test]
    fn appended_extends_by_one() {
        let state = ExecutionState::seeded(Message::user(Payload::text("x.docx")));
        let state = state.appended(Message::assistant(Payload::text("hi")));
        assert_eq!(state.len(), 2);
        assert_eq!(state.first().unwrap().payload.as_text(), Some("x.docx"));
    }

    #[test]
    fn latest_scans_in_reverse() {
        let state = ExecutionState::seeded(Message::user(Payload::text("seed")))
            .appended(Message::assistant(Payload::text("first")))
            .appended(Message::assistant(Payload::error("stage", "boom")))
            .appended(Message::assistant(Payload::text("last")));

        assert_eq!(
            state.latest(PayloadKind::Text).unwrap().payload.as_text(),
            Some("last")
        );
        assert!(state.latest(PayloadKind::Diff).is_none());
    }

    #[test]
    fn branch_pair_finds_most_recent_of_each() {
        let state = ExecutionState::seeded(Message::user(Payload::text("seed")))
            .appended(conv(ConversionKind::PngToMarkdown, DocBranch::Original, "old.md"))
            .appended(Message::assistant(Payload::text("noise")))
            .appended(conv(ConversionKind::PngToMarkdown, DocBranch::Original, "orig.md"))
            .appended(conv(ConversionKind::PdfToPng, DocBranch::Updated, "u.png"))
            .appended(conv(ConversionKind::PngToMarkdown, DocBranch::Updated, "upd.md"));

        let (original, updated) = state.branch_pair(ConversionKind::PngToMarkdown);
        assert_eq!(original.unwrap().first_output(), Some("orig.md"));
        assert_eq!(updated.unwrap().first_output(), Some("upd.md"));
    }

    #[test]
    fn branch_pair_reports_missing_branch() {
        let state = ExecutionState::seeded(Message::user(Payload::text("seed")))
            .appended(conv(ConversionKind::PngToMarkdown, DocBranch::Original, "orig.md"));

        let (original, updated) = state.branch_pair(ConversionKind::PngToMarkdown);
        assert!(original.is_some());
        assert!(updated.is_none());
    }

    #[test]
    fn from_base_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("report");
        let base_str = base.to_string_lossy().into_owned();

        std::fs::write(format!("{base_str}_original.docx"), b"x").unwrap();
        let err = PathSet::from_base(&base_str).unwrap_err();
        assert!(err.contains("updated file not found"), "got: {err}");

        std::fs::write(format!("{base_str}_updated.docx"), b"x").unwrap();
        let paths = PathSet::from_base(&base_str).unwrap();
        assert_eq!(paths.original_docx, format!("{base_str}_original.docx"));
        assert_eq!(paths.updated_docx, format!("{base_str}_updated.docx"));
        assert_eq!(paths.doc_name, "report");

        // a trailing .docx on the base is tolerated
        let again = PathSet::from_base(&format!("{base_str}.docx")).unwrap();
        assert_eq!(again, paths);
    }

    #[test]
    fn payload_round_trips_through_json() {
        let payload = Payload::ToolCall(ToolCallRequest {
            tool_name: "docx_to_pdf_converter".into(),
            arguments: serde_json::from_str(r#"{"docx_path": "x.docx"}"#).unwrap(),
        });
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""type":"tool_call""#), "got: {json}");
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}

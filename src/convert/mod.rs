//! External collaborators: the side-effecting operations workflow nodes call.
//!
//! Every function here is synchronous from the graph's perspective (one
//! blocking await per node), returns a structured result, and never raises
//! past its boundary — a failed conversion is `success: false` plus an
//! error string, which the success-gated routers turn into termination.
//!
//! On-disk artifacts are owned by the run that created them and live under
//! `{base_dir}/{pdf_files,png_files,markdown_files}/`; the engine never
//! cleans them up.

pub mod diff;
pub mod docx;
pub mod llm;
pub mod postprocess;
pub mod raster;
pub mod transcribe;

pub use diff::{explain_diff, generate_diff};
pub use docx::convert_docx_to_pdf;
pub use llm::{provider_chat, ChatFn};
pub use raster::convert_pdf_to_png;
pub use transcribe::convert_png_to_markdown;

//! CLI binary for docgraph.
//!
//! A thin shim over the library crate: maps flags to `WorkflowConfig`,
//! picks the workflow from the input shape, and prints the final payload.

use anyhow::{Context, Result};
use clap::Parser;
use docgraph::{workflows, Payload, RunOutcome, RunReport, WorkflowConfig};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document to Markdown (LLM-coordinated)
  docgraph ./docs/report.docx

  # Compare two versions and explain the changes:
  # expects ./docs/report_original.docx and ./docs/report_updated.docx
  docgraph ./docs/report

  # Use a specific model and a tighter run budget
  docgraph --model gpt-4.1-mini --max-steps 12 ./docs/report

  # Emit the full run history as JSON
  docgraph --json ./docs/report.docx > run.json

MODES:
  The input shape selects the workflow:
    path ending in .docx   →  coordination: convert that one document
    any other path         →  comparison: diff {path}_original.docx
                              against {path}_updated.docx

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  DOCGRAPH_SOFFICE        Path to the LibreOffice binary (default: soffice)

SETUP:
  1. Install LibreOffice so `soffice` is on PATH (DOCX → PDF).
  2. Set an API key:   export OPENAI_API_KEY=sk-...
  3. Run:              docgraph document.docx
"#;

/// Convert and compare DOCX documents via LLM-driven workflows.
#[derive(Parser, Debug)]
#[command(
    name = "docgraph",
    version,
    about = "Convert and compare DOCX documents via LLM-driven workflows",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A .docx file to convert, or a base path for a comparison pair.
    input: String,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, env = "DOCGRAPH_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama.
    /// Auto-detected from API key env vars if not set.
    #[arg(long, env = "DOCGRAPH_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "DOCGRAPH_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Maximum node executions per run.
    #[arg(long, env = "DOCGRAPH_MAX_STEPS", default_value_t = 24)]
    max_steps: usize,

    /// Wall-clock budget for the whole run, in seconds.
    #[arg(long, env = "DOCGRAPH_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCGRAPH_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per LLM call on transient failure.
    #[arg(long, env = "DOCGRAPH_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Output the full run history as JSON instead of the final payload.
    #[arg(long, env = "DOCGRAPH_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCGRAPH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the final payload.
    #[arg(short, long, env = "DOCGRAPH_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut builder = WorkflowConfig::builder()
        .dpi(cli.dpi)
        .max_steps(cli.max_steps)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries);
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(secs) = cli.timeout_secs {
        builder = builder.run_timeout_secs(secs);
    }
    let config = builder.build().context("Invalid configuration")?;

    // Input shape selects the workflow: a .docx converts, a base path compares.
    let report = if cli.input.ends_with(".docx") {
        workflows::coordinator::convert_document(&cli.input, &config)
            .await
            .context("Conversion workflow failed")?
    } else {
        workflows::compare::run(&cli.input, &config)
            .await
            .context("Comparison workflow failed")?
    };

    print_report(&cli, &report)?;
    Ok(exit_code(report.outcome))
}

fn print_report(cli: &Cli, report: &RunReport) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(&report.state)
            .context("Failed to serialise run history")?;
        println!("{json}");
        return Ok(());
    }

    match report.state.last().map(|m| &m.payload) {
        Some(Payload::Text { text }) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        Some(Payload::Error { stage, detail }) => {
            eprintln!("{} {stage}: {detail}", red("✘"));
        }
        Some(other) => {
            // A run cut short mid-pipeline: show the last structured payload.
            println!(
                "{}",
                serde_json::to_string_pretty(other).context("Failed to serialise payload")?
            );
        }
        None => {}
    }

    if !cli.quiet {
        let tick = match report.outcome {
            RunOutcome::Completed => green("✔"),
            _ => red("✘"),
        };
        eprintln!(
            "{tick} {:?} after {} {}",
            report.outcome,
            bold(&report.steps.to_string()),
            dim("steps"),
        );
    }
    Ok(())
}

fn exit_code(outcome: RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Completed => ExitCode::SUCCESS,
        // The run was cut off by a limit, not finished; distinguishable
        // from hard errors (exit 1) for scripting.
        RunOutcome::StepLimitExceeded | RunOutcome::Timeout | RunOutcome::Cancelled => {
            ExitCode::from(2)
        }
    }
}

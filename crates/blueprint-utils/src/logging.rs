//! Tracing setup and structured job logging helpers.
//!
//! Every job-related event carries the same field names (`job_id`,
//! `project_id`, `step`, `duration_ms`) so that JSON output can be filtered
//! per job.

use std::io::IsTerminal;
use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::redaction::redact_secrets;

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Build the filter: `RUST_LOG` wins, otherwise blueprint crates at info
/// (debug when verbose) and everything else at warn.
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("blueprint=debug,info")
            } else {
                EnvFilter::try_new("blueprint=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// Logs go to stderr so that CLI output on stdout stays machine-readable.
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let filter = env_filter(verbose);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            let span_events = if verbose {
                FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            };
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(use_color())
                        .with_target(verbose)
                        .with_line_number(false)
                        .with_file(false)
                        .with_span_events(span_events)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span covering one job's execution.
pub fn job_span(job_id: &str, project_id: &str, step: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "job",
        job_id = %job_id,
        project_id = %project_id,
        step = %step,
    )
}

pub fn log_job_start(job_id: &str, project_id: &str, step: &str) {
    info!(
        job_id = %job_id,
        project_id = %project_id,
        step = %step,
        "Starting job"
    );
}

pub fn log_job_complete(job_id: &str, step: &str, duration_ms: u128) {
    info!(
        job_id = %job_id,
        step = %step,
        duration_ms = duration_ms,
        "Job completed"
    );
}

/// Log a job failure; the message is redacted before it is emitted.
pub fn log_job_error(job_id: &str, step: &str, message: &str, duration_ms: u128) {
    error!(
        job_id = %job_id,
        step = %step,
        duration_ms = duration_ms,
        error = %redact_secrets(message),
        "Job failed"
    );
}

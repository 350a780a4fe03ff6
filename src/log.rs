//! Structured logging for the batch commands.
//!
//! Log levels:
//! - ERROR: A unit of work failed (model call, parse, or write)
//! - WARN: A unit was skipped because its data was unusable
//! - INFO: Per-unit progress lines and run summaries
//! - DEBUG: Request-level detail (uploads, polling, HTTP status)
//! - TRACE: Raw model and datastore payloads
//!
//! Debug mode can be enabled with `--debug` flag or `SQA_DEBUG=1` env var.
//! `RUST_LOG` overrides both when set.

use tracing_subscriber::EnvFilter;

/// Environment variable that turns on debug logging.
pub const DEBUG_ENV: &str = "SQA_DEBUG";

/// Initialize logging with explicit debug mode setting.
pub fn init_with_debug(debug: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::new(spec),
        _ => EnvFilter::new(default_directive(debug || env_debug())),
    };

    // A second init (tests, repeated calls) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Check whether the debug env var asks for debug output.
pub fn env_debug() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "sqa_pipeline=debug,sqa=debug,info"
    } else {
        "info"
    }
}

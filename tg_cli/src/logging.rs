//! Structured logging configuration.
//!
//! Records from the library's `log` facade are captured by the same
//! subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var and default to
/// `info,sqlx=warn`.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!("Structured logging initialized");
}

/// Log how long a phase of the run took
///
/// # Arguments
///
/// * `phase` - Phase name
/// * `duration_ms` - Duration in milliseconds
/// * `matches` - Matches touched during the phase
pub fn log_phase(phase: &str, duration_ms: u64, matches: usize) {
    if duration_ms > 1000 {
        tracing::warn!(
            phase = phase,
            duration_ms = duration_ms,
            matches = matches,
            "Slow phase"
        );
    } else {
        tracing::info!(
            phase = phase,
            duration_ms = duration_ms,
            matches = matches,
            "Phase completed"
        );
    }
}

/// Log a decided match with structured data
pub fn log_match_result(queue_match_number: u32, score: [i32; 2], outcome: &str) {
    tracing::debug!(
        queue_match_number = queue_match_number,
        score = ?score,
        outcome = outcome,
        "Match ended"
    );
}

//! Tracing/logging initialization.
//!
//! Grounded directly on `bins/server/src/logging.rs`: an `EnvFilter`
//! defaulting to `info`, tunable via `RUST_LOG`, with a choice between
//! compact and JSON formatting.

use clap::ArgMatches;
use std::borrow::Borrow;
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoggingStyle {
    /// Human-readable, compact log lines.
    Compact,
    /// Newline-delimited JSON, for log aggregation.
    Json,
}

/// Initializes tracing from the parsed CLI matches' `logging_style` value.
pub fn initialize_from_matches<M: Borrow<ArgMatches>>(matches: M) {
    let style: &LoggingStyle = matches.borrow().get_one("logging_style").unwrap();
    initialize(style)
}

pub fn initialize<S: Borrow<LoggingStyle>>(style: S) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let formatter = tracing_subscriber::fmt()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(true)
        .with_target(true)
        .with_env_filter(filter);

    match style.borrow() {
        LoggingStyle::Compact => formatter.init(),
        LoggingStyle::Json => formatter.json().init(),
    }
}

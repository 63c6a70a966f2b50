//! Logging infrastructure for gnbproc
//!
//! This module provides configurable logging using the `tracing` crate and the
//! procedure logging helpers used by every UE procedure. Each procedure emits one
//! event when it starts, and exactly one of "completed" or "failed" when it ends.

use std::fmt;
use tracing::Level;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use crate::types::{CuCpUeIndex, DuUeIndex, Rnti};

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Initialize the tracing subscriber with the specified log level.
///
/// This should be called once at application startup. The log level can be
/// overridden by the `RUST_LOG` environment variable.
///
/// # Example
///
/// ```
/// use gnbproc_common::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Debug);
/// ```
pub fn init_logging(level: LogLevel) {
    init_logging_with_filter(&level.to_string());
}

/// Initialize logging with a custom filter string.
///
/// # Example
///
/// ```
/// use gnbproc_common::logging::init_logging_with_filter;
///
/// // Info by default, debug for the MAC control component
/// init_logging_with_filter("info,gnbproc_gnb::mac=debug");
/// ```
pub fn init_logging_with_filter(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // A second initialization (e.g. from doctests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_span_events(FmtSpan::NONE)
        .try_init();
}

/// UE identity printed as the prefix of procedure log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcUe {
    /// UE known to the DU, with its C-RNTI when available
    Du(DuUeIndex, Option<Rnti>),
    /// UE known to the CU-CP
    CuCp(CuCpUeIndex),
}

impl fmt::Display for ProcUe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcUe::Du(idx, Some(rnti)) => write!(f, "{idx} {rnti}"),
            ProcUe::Du(idx, None) => write!(f, "{idx}"),
            ProcUe::CuCp(idx) => write!(f, "{idx}"),
        }
    }
}

/// Logs the start of a UE procedure.
pub fn log_proc_started(ue: ProcUe, proc_name: &str) {
    tracing::debug!(proc = proc_name, "{}: \"{}\" started...", ue, proc_name);
}

/// Logs the successful completion of a UE procedure.
pub fn log_proc_completed(ue: ProcUe, proc_name: &str) {
    tracing::info!(proc = proc_name, "{}: \"{}\" finished successfully", ue, proc_name);
}

/// Logs the failure of a UE procedure together with its cause.
pub fn log_proc_failure(ue: ProcUe, proc_name: &str, cause: &str) {
    tracing::warn!(proc = proc_name, "{}: \"{}\" failed. Cause: {}", ue, proc_name, cause);
}

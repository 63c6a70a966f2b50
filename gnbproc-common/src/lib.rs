//! Common types and utilities for gnbproc
//!
//! This crate provides the identifier types, logging bootstrap and configuration
//! model shared by the gNB procedure crates.

pub mod config;
pub mod logging;
pub mod types;

pub use config::{DrbConfig, GnbProcConfig, DEFAULT_CTRL_LOOP_CAPACITY};
pub use logging::{
    init_logging, init_logging_with_filter, log_proc_completed, log_proc_failure,
    log_proc_started, LogLevel, ProcUe,
};
pub use types::*;

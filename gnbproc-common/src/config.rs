//! Configuration structures for the gNB procedure core
//!
//! The configuration is read from YAML. Only `gnb_name`, `max_nof_ues` and
//! `nof_cells` are mandatory; every other field has a default.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::types::MAX_NOF_DRBS;

/// Default number of pending procedures a single control loop accepts.
pub const DEFAULT_CTRL_LOOP_CAPACITY: usize = 128;

/// DRB allocation settings used by the CU-CP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbConfig {
    /// Upper bound on DRBs a single UE may hold
    #[serde(default = "default_max_nof_drbs_per_ue")]
    pub max_nof_drbs_per_ue: u8,
}

fn default_max_nof_drbs_per_ue() -> u8 {
    MAX_NOF_DRBS as u8
}

impl Default for DrbConfig {
    fn default() -> Self {
        Self {
            max_nof_drbs_per_ue: default_max_nof_drbs_per_ue(),
        }
    }
}

/// gNB procedure core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnbProcConfig {
    /// Human readable node name, used in logs
    pub gnb_name: String,
    /// Size of the UE tables (MAC, DU manager, CU-CP)
    pub max_nof_ues: u16,
    /// Number of cells served by the DU
    pub nof_cells: u8,
    /// Maximum pending procedures per control loop
    #[serde(default = "default_ctrl_loop_capacity")]
    pub ctrl_loop_capacity: usize,
    /// Log level name (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// DRB allocation settings
    #[serde(default)]
    pub drb: DrbConfig,
}

fn default_ctrl_loop_capacity() -> usize {
    DEFAULT_CTRL_LOOP_CAPACITY
}

fn default_log_level() -> String {
    LogLevel::Info.to_string()
}

impl GnbProcConfig {
    /// Creates a configuration with defaults for every optional field.
    pub fn new(gnb_name: impl Into<String>, max_nof_ues: u16, nof_cells: u8) -> Self {
        Self {
            gnb_name: gnb_name.into(),
            max_nof_ues,
            nof_cells,
            ctrl_loop_capacity: DEFAULT_CTRL_LOOP_CAPACITY,
            log_level: default_log_level(),
            drb: DrbConfig::default(),
        }
    }

    /// Parses the configured log level, falling back to `Info`.
    pub fn log_level(&self) -> LogLevel {
        self.log_level.parse().unwrap_or_default()
    }
}

impl Default for GnbProcConfig {
    fn default() -> Self {
        Self::new("gnb-proc", 64, 1)
    }
}

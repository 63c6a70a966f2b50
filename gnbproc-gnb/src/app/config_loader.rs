//! Configuration Loading for the procedure core
//!
//! Reads a [`GnbProcConfig`] from YAML and checks it against the limits of the
//! UE tables and control loops.
//!
//! # Example
//!
//! ```rust,ignore
//! use gnbproc_gnb::app::load_and_validate_gnb_proc_config;
//!
//! let config = load_and_validate_gnb_proc_config("config/gnb-proc.yaml")?;
//! ```

use std::path::Path;

use gnbproc_common::{GnbProcConfig, LogLevel, MAX_NOF_DRBS, MAX_NOF_DU_CELLS, MAX_NOF_DU_UES};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ConfigValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("Invalid gNB name: {0}")]
    InvalidGnbName(String),

    #[error("Invalid UE table size: {0}")]
    InvalidMaxNofUes(String),

    #[error("Invalid number of cells: {0}")]
    InvalidNofCells(String),

    #[error("Invalid control loop capacity: {0}")]
    InvalidCtrlLoopCapacity(String),

    #[error("Invalid DRB configuration: {0}")]
    InvalidDrbConfig(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

/// Loads a configuration from a YAML file without validating it.
pub fn load_gnb_proc_config<P: AsRef<Path>>(path: P) -> Result<GnbProcConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_gnb_proc_config_from_str(&contents)
}

/// Loads a configuration from a YAML string without validating it.
pub fn load_gnb_proc_config_from_str(yaml: &str) -> Result<GnbProcConfig, ConfigError> {
    serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Validates a configuration.
///
/// # Validation Rules
///
/// - `gnb_name` must not be blank
/// - `max_nof_ues` must be between 1 and 1024
/// - `nof_cells` must be between 1 and 16
/// - `ctrl_loop_capacity` must be non-zero
/// - `drb.max_nof_drbs_per_ue` must be between 1 and 29
/// - `log_level` must name a known level
pub fn validate_gnb_proc_config(config: &GnbProcConfig) -> Result<(), ConfigValidationError> {
    if config.gnb_name.trim().is_empty() {
        return Err(ConfigValidationError::InvalidGnbName("name cannot be empty".to_string()));
    }

    if config.max_nof_ues == 0 || config.max_nof_ues as usize > MAX_NOF_DU_UES {
        return Err(ConfigValidationError::InvalidMaxNofUes(format!(
            "{} must be between 1 and {}",
            config.max_nof_ues, MAX_NOF_DU_UES
        )));
    }

    if config.nof_cells == 0 || config.nof_cells as usize > MAX_NOF_DU_CELLS {
        return Err(ConfigValidationError::InvalidNofCells(format!(
            "{} must be between 1 and {}",
            config.nof_cells, MAX_NOF_DU_CELLS
        )));
    }

    if config.ctrl_loop_capacity == 0 {
        return Err(ConfigValidationError::InvalidCtrlLoopCapacity(
            "at least one pending procedure must be accepted".to_string(),
        ));
    }

    let max_drbs = config.drb.max_nof_drbs_per_ue;
    if max_drbs == 0 || max_drbs as usize > MAX_NOF_DRBS {
        return Err(ConfigValidationError::InvalidDrbConfig(format!(
            "max_nof_drbs_per_ue {} must be between 1 and {}",
            max_drbs, MAX_NOF_DRBS
        )));
    }

    config
        .log_level
        .parse::<LogLevel>()
        .map_err(|_| ConfigValidationError::InvalidLogLevel(config.log_level.clone()))?;

    Ok(())
}

/// Loads and validates a configuration in one step.
pub fn load_and_validate_gnb_proc_config<P: AsRef<Path>>(
    path: P,
) -> Result<GnbProcConfig, ConfigError> {
    let config = load_gnb_proc_config(path)?;
    validate_gnb_proc_config(&config)?;
    Ok(config)
}

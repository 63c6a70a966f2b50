//! Application support for the `gnb-proc` binary
//!
//! Configuration loading and validation, plus the loopback scenario that
//! drives a UE through creation, reconfiguration, PDU session setup and
//! deletion.

mod config_loader;
mod scenario;

pub use config_loader::{
    load_and_validate_gnb_proc_config, load_gnb_proc_config, load_gnb_proc_config_from_str,
    validate_gnb_proc_config, ConfigError, ConfigValidationError,
};

pub use scenario::{LoopbackScenario, ScenarioReport};

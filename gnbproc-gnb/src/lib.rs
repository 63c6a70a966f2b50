//! gnbproc-gnb - UE procedure orchestration for a split gNB
//!
//! This crate drives the lifecycle of UEs across the control-plane components
//! of a split gNB:
//!
//! - MAC control component: UE create, reconfigure and delete in UL/DL MAC
//! - DU manager: DU-side UE contexts on top of MAC
//! - CU-CP: PDU Session Resource Setup over E1AP, F1AP and RRC
//!
//! # Architecture
//!
//! Every component keeps its UEs in a [`UeRegistry`]. Each UE owns a
//! [`ControlLoop`] that runs its procedures one at a time in arrival order,
//! while procedures of different UEs interleave freely. Structural removal of
//! a UE goes through the component's main loop and waits for the UE's loop to
//! drain.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  DuUeManager ──MacUeConfigurator──> MacController            │
//! │      │                                   │                   │
//! │   UE loops                            UE loops ──> UL/DL MAC │
//! │                                                              │
//! │  DuProcessor ──> UE loops ──> PduSessionResourceSetupRoutine │
//! │                                   │   │   │                  │
//! │                                  E1  F1  RRC                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gnbproc_gnb::app::{load_and_validate_gnb_proc_config, LoopbackScenario};
//!
//! let config = load_and_validate_gnb_proc_config("config/gnb-proc.yaml")?;
//! let report = LoopbackScenario::new(config, Duration::ZERO).run(4).await;
//! ```

pub mod app;
pub mod ctrl_loop;
pub mod cu_cp;
pub mod du_manager;
pub mod loopback;
pub mod mac;
pub mod ue_registry;


pub use ctrl_loop::{AsyncTask, ControlLoop, ControlLoopError, LoopState};
pub use ue_registry::{SharedUeRegistry, UeElement, UeIndexType, UeRegistry};

pub use mac::{MacController, MacCtrlConfig, MacCtrlNotifier, MacDlConfigurer, MacUlConfigurer};

pub use du_manager::{DuUe, DuUeManager, DuUeManagerConfig, MacUeConfigAdapter, MacUeConfigurator};

pub use cu_cp::{
    CuCpUe, DuProcessor, DuProcessorConfig, DuProcessorRoutineManager,
    PduSessionResourceSetupRequest, PduSessionResourceSetupResponse, PduSessionResourceSetupRoutine,
};

pub use app::{
    load_and_validate_gnb_proc_config, load_gnb_proc_config, load_gnb_proc_config_from_str,
    validate_gnb_proc_config, ConfigError, ConfigValidationError, LoopbackScenario, ScenarioReport,
};

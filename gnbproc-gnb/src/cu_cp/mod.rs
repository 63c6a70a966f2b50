//! CU-CP UE procedures
//!
//! The CU-CP sets up PDU sessions requested by the AMF by driving the CU-UP
//! over E1AP, the DU over F1AP and the UE over RRC:
//!
//! ```text
//!  NGAP request ──> DuProcessor ──> UE ctrl loop ──> PduSessionResourceSetupRoutine
//!                        │                                   │
//!                        │          E1apControlNotifier <────┤
//!                        │          F1apUeContextNotifier <──┤
//!                        │          RrcUeControlNotifier <───┤
//!                        │          RrcUeDrbManager <────────┘
//!                        └──> NgapResponseNotifier (one response per request)
//! ```

mod drb_manager;
mod du_processor;
mod messages;
mod notifiers;
mod routine_manager;
pub mod routines;

pub use drb_manager::{DrbContext, DrbManager};
pub use du_processor::{CuCpUe, DuProcessor, DuProcessorConfig};
pub use messages::*;
pub use notifiers::{
    E1apControlNotifier, F1apUeContextNotifier, NgapResponseNotifier, RrcUeControlNotifier,
    RrcUeDrbManager,
};
pub use routine_manager::DuProcessorRoutineManager;
pub use routines::PduSessionResourceSetupRoutine;

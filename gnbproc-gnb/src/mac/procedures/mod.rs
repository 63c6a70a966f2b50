//! MAC UE procedures
//!
//! Each procedure is consumed by its `run` future, which is scheduled on the
//! UE's control loop and reports exactly once through the `MacCtrlNotifier`.

mod ue_creation;
mod ue_deletion;
mod ue_reconfiguration;

pub use ue_creation::MacUeCreateProcedure;
pub use ue_deletion::MacUeDeleteProcedure;
pub use ue_reconfiguration::MacUeReconfigurationProcedure;

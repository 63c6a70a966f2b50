//! CU-CP routines

mod pdu_session_resource_setup;

pub use pdu_session_resource_setup::PduSessionResourceSetupRoutine;

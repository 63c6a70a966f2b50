//! Launches the CU-CP routines of a DU processor

use std::sync::Arc;

use futures::FutureExt;

use super::messages::{
    PduSessionResourceSetupRequest, PduSessionResourceSetupResponse, SecurityConfig,
};
use super::notifiers::{
    E1apControlNotifier, F1apUeContextNotifier, RrcUeControlNotifier, RrcUeDrbManager,
};
use super::routines::PduSessionResourceSetupRoutine;
use crate::ctrl_loop::AsyncTask;

/// Creates routines bound to the E1AP and F1AP peers of one DU processor.
#[derive(Clone)]
pub struct DuProcessorRoutineManager {
    e1ap_ctrl_notifier: Arc<dyn E1apControlNotifier>,
    f1ap_ue_ctxt_notifier: Arc<dyn F1apUeContextNotifier>,
}

impl DuProcessorRoutineManager {
    pub fn new(
        e1ap_ctrl_notifier: Arc<dyn E1apControlNotifier>,
        f1ap_ue_ctxt_notifier: Arc<dyn F1apUeContextNotifier>,
    ) -> Self {
        Self {
            e1ap_ctrl_notifier,
            f1ap_ue_ctxt_notifier,
        }
    }

    /// Returns the PDU session resource setup routine for `msg` as a task.
    ///
    /// The task does nothing until polled. For a request without sessions it
    /// is ready on first poll.
    pub fn start_pdu_session_resource_setup_routine(
        &self,
        msg: PduSessionResourceSetupRequest,
        security_cfg: SecurityConfig,
        rrc_ue_ctrl_notifier: Arc<dyn RrcUeControlNotifier>,
        rrc_ue_drb_manager: Arc<dyn RrcUeDrbManager>,
    ) -> AsyncTask<PduSessionResourceSetupResponse> {
        PduSessionResourceSetupRoutine::new(
            msg,
            security_cfg,
            self.e1ap_ctrl_notifier.clone(),
            self.f1ap_ue_ctxt_notifier.clone(),
            rrc_ue_ctrl_notifier,
            rrc_ue_drb_manager,
        )
        .run()
        .boxed()
    }
}

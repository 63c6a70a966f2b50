//! DRB Manager
//!
//! Maps the QoS flows of a UE's PDU sessions onto DRBs. Flows of one session
//! sharing a 5QI share a DRB; DRB ids are allocated lowest-first up to the
//! configured maximum.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gnbproc_common::{
    DrbConfig, DrbId, FiveQi, PduSessionId, QosFlowId, SNssai, MAX_NOF_DRBS, MAX_QOS_FLOW_ID,
};
use tracing::{debug, warn};

use super::messages::PduSessionResourceSetupRequest;
use super::notifiers::RrcUeDrbManager;

/// An allocated DRB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbContext {
    pub drb_id: DrbId,
    pub pdu_session_id: PduSessionId,
    pub s_nssai: SNssai,
    pub five_qi: FiveQi,
    /// QoS flows mapped onto this DRB
    pub qos_flows: Vec<QosFlowId>,
}

/// Per-UE DRB allocator.
#[derive(Debug)]
pub struct DrbManager {
    max_nof_drbs: u8,
    drbs: Mutex<BTreeMap<DrbId, DrbContext>>,
}

impl DrbManager {
    pub fn new(cfg: &DrbConfig) -> Self {
        Self {
            max_nof_drbs: cfg.max_nof_drbs_per_ue.min(MAX_NOF_DRBS as u8),
            drbs: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of allocated DRBs.
    pub fn nof_drbs(&self) -> usize {
        self.lock().len()
    }

    fn allocate_drb_id(drbs: &BTreeMap<DrbId, DrbContext>, max_nof_drbs: u8) -> Option<DrbId> {
        (1..=max_nof_drbs).map(DrbId).find(|id| !drbs.contains_key(id))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<DrbId, DrbContext>> {
        self.drbs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RrcUeDrbManager for DrbManager {
    fn calculate_drb_to_add_list(&self, msg: &PduSessionResourceSetupRequest) -> Vec<DrbId> {
        let mut drbs = self.lock();
        let mut drbs_to_add = Vec::new();

        for session in &msg.pdu_session_res_setup_items {
            for flow in &session.qos_flow_setup_request_items {
                if flow.qos_flow_id.value() > MAX_QOS_FLOW_ID {
                    warn!("{}: ignoring invalid {}", session.pdu_session_id, flow.qos_flow_id);
                    continue;
                }

                let existing = drbs.values_mut().find(|drb| {
                    drb.pdu_session_id == session.pdu_session_id && drb.five_qi == flow.five_qi
                });
                if let Some(drb) = existing {
                    if !drb.qos_flows.contains(&flow.qos_flow_id) {
                        drb.qos_flows.push(flow.qos_flow_id);
                    }
                    continue;
                }

                let Some(drb_id) = Self::allocate_drb_id(&drbs, self.max_nof_drbs) else {
                    warn!(
                        "{}: no DRB left for {} ({} DRBs allocated)",
                        session.pdu_session_id,
                        flow.qos_flow_id,
                        drbs.len()
                    );
                    continue;
                };
                debug!(
                    "{}: {} {} mapped on {}",
                    session.pdu_session_id, flow.qos_flow_id, flow.five_qi, drb_id
                );
                drbs.insert(
                    drb_id,
                    DrbContext {
                        drb_id,
                        pdu_session_id: session.pdu_session_id,
                        s_nssai: session.s_nssai,
                        five_qi: flow.five_qi,
                        qos_flows: vec![flow.qos_flow_id],
                    },
                );
                drbs_to_add.push(drb_id);
            }
        }

        drbs_to_add
    }

    fn get_drb_context(&self, drb_id: DrbId) -> Option<DrbContext> {
        self.lock().get(&drb_id).cloned()
    }

    fn get_drbs_of_session(&self, pdu_session_id: PduSessionId) -> Vec<DrbId> {
        self.lock()
            .values()
            .filter(|drb| drb.pdu_session_id == pdu_session_id)
            .map(|drb| drb.drb_id)
            .collect()
    }

    fn release_drbs(&self, drb_ids: &[DrbId]) {
        let mut drbs = self.lock();
        for drb_id in drb_ids {
            if let Some(drb) = drbs.remove(drb_id) {
                debug!("{}: released {}", drb.pdu_session_id, drb_id);
            }
        }
    }
}

//! PDU Session Resource Setup Routine
//!
//! ```text
//! NGAP      CU-CP routine               CU-UP (E1)     DU (F1)        UE (RRC)
//!  │──setup req──>│                          │             │              │
//!  │              │ DRB calculation          │             │              │
//!  │              │──Bearer Ctx Setup───────>│             │              │
//!  │              │<─────────────────────────│             │              │
//!  │              │──UE Ctx Modification────────────────-->│              │
//!  │              │<───────────────────────────────────────│              │
//!  │              │──Bearer Ctx Modification>│             │              │
//!  │              │<─────────────────────────│             │              │
//!  │              │──RRC Reconfiguration──────────────────────────────────>│
//!  │              │<───────────────────────────────────────────────────────│
//!  │<─setup resp──│                          │             │              │
//! ```
//!
//! Stages run strictly in order. A peer may fail individual sessions; those
//! move to the failed list and are left out of every later stage. A stage that
//! is rejected as a whole fails every session still in flight. DRBs allocated
//! for a session that fails are released. Nothing else applied by earlier
//! stages is undone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use gnbproc_common::{
    log_proc_completed, log_proc_failure, log_proc_started, DrbId, ProcUe, PduSessionId,
};
use tracing::{debug, warn};

use crate::cu_cp::messages::{
    E1BearerContextModificationRequest, E1BearerContextSetupRequest, E1DrbToModifyItem,
    E1DrbToSetupItem, E1PduSessionToModifyItem, E1PduSessionToSetupItem, F1DrbToSetupItem,
    F1UeContextModificationRequest, PduSessionResourceFailedToSetupItem,
    PduSessionResourceSetupItem, PduSessionResourceSetupRequest, PduSessionResourceSetupResponse,
    PduSessionResourceSetupResponseItem, PduSessionSetupFailureCause, RrcDrbToAddMod,
    RrcReconfigurationRequest, SecurityConfig, UpTransportLayerInfo,
};
use crate::cu_cp::notifiers::{
    E1apControlNotifier, F1apUeContextNotifier, RrcUeControlNotifier, RrcUeDrbManager,
};

/// Stages of the routine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SetupStage {
    #[default]
    Init,
    DrbCalculation,
    BearerContextSetup,
    UeContextModification,
    BearerContextModification,
    RrcReconfiguration,
    Done,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupStage::Init => "Init",
            SetupStage::DrbCalculation => "DRB calculation",
            SetupStage::BearerContextSetup => "Bearer Context Setup",
            SetupStage::UeContextModification => "UE Context Modification",
            SetupStage::BearerContextModification => "Bearer Context Modification",
            SetupStage::RrcReconfiguration => "RRC Reconfiguration",
            SetupStage::Done => "Done",
        };
        f.write_str(name)
    }
}

/// A session that has not failed so far.
#[derive(Debug)]
struct PendingSession {
    item: PduSessionResourceSetupItem,
    drbs: Vec<DrbId>,
    dl_ngu_up_tnl_info: Option<UpTransportLayerInfo>,
    /// CU-UP F1-U endpoints, from the bearer context setup
    ul_f1u_tnl_info: BTreeMap<DrbId, UpTransportLayerInfo>,
    /// DU F1-U endpoints, from the UE context modification
    dl_f1u_tnl_info: BTreeMap<DrbId, UpTransportLayerInfo>,
}

/// Establishes the PDU sessions of one request for one UE.
pub struct PduSessionResourceSetupRoutine {
    request: PduSessionResourceSetupRequest,
    security_cfg: SecurityConfig,
    e1ap: Arc<dyn E1apControlNotifier>,
    f1ap: Arc<dyn F1apUeContextNotifier>,
    rrc_ue: Arc<dyn RrcUeControlNotifier>,
    drb_mng: Arc<dyn RrcUeDrbManager>,

    stage: SetupStage,
    pending: BTreeMap<PduSessionId, PendingSession>,
    failed: Vec<PduSessionResourceFailedToSetupItem>,
    /// DRBs allocated by this routine
    new_drbs: Vec<DrbId>,
    master_cell_group: bytes::Bytes,
}

impl PduSessionResourceSetupRoutine {
    pub const NAME: &'static str = "PDU Session Resource Setup";

    pub fn new(
        request: PduSessionResourceSetupRequest,
        security_cfg: SecurityConfig,
        e1ap: Arc<dyn E1apControlNotifier>,
        f1ap: Arc<dyn F1apUeContextNotifier>,
        rrc_ue: Arc<dyn RrcUeControlNotifier>,
        drb_mng: Arc<dyn RrcUeDrbManager>,
    ) -> Self {
        Self {
            request,
            security_cfg,
            e1ap,
            f1ap,
            rrc_ue,
            drb_mng,
            stage: SetupStage::Init,
            pending: BTreeMap::new(),
            failed: Vec::new(),
            new_drbs: Vec::new(),
            master_cell_group: bytes::Bytes::new(),
        }
    }

    /// Runs the routine to completion. An empty request completes without
    /// suspending and without contacting any peer.
    pub async fn run(mut self) -> PduSessionResourceSetupResponse {
        let ue = ProcUe::CuCp(self.request.ue_index);
        if self.request.pdu_session_res_setup_items.is_empty() {
            log_proc_failure(ue, Self::NAME, "Empty request");
            return PduSessionResourceSetupResponse::empty(self.request.ue_index);
        }
        log_proc_started(ue, Self::NAME);

        self.admit_sessions();
        if self.pending.is_empty() {
            log_proc_failure(ue, Self::NAME, "No valid PDU session");
        } else if let Err(cause) = self.run_stages().await {
            log_proc_failure(ue, Self::NAME, &format!("{} stage: {}", self.stage, cause));
            self.fail_all_pending(cause);
        }
        self.enter(SetupStage::Done);

        let resp = self.into_response();
        if resp.is_successful() {
            log_proc_completed(ue, Self::NAME);
        } else if !resp.pdu_session_res_setup_response_items.is_empty() {
            warn!(
                "{}: \"{}\" partially failed: {} setup, {} failed",
                ue,
                Self::NAME,
                resp.pdu_session_res_setup_response_items.len(),
                resp.pdu_session_res_failed_to_setup_items.len()
            );
        }
        resp
    }

    async fn run_stages(&mut self) -> Result<(), PduSessionSetupFailureCause> {
        self.enter(SetupStage::DrbCalculation);
        self.calculate_drbs()?;

        self.enter(SetupStage::BearerContextSetup);
        self.bearer_context_setup().await?;

        self.enter(SetupStage::UeContextModification);
        self.ue_context_modification().await?;

        self.enter(SetupStage::BearerContextModification);
        self.bearer_context_modification().await?;

        self.enter(SetupStage::RrcReconfiguration);
        self.rrc_reconfiguration().await
    }

    fn enter(&mut self, stage: SetupStage) {
        debug!("{}: \"{}\" {} -> {}", self.request.ue_index, Self::NAME, self.stage, stage);
        self.stage = stage;
    }

    /// Splits the request into pending sessions. Sessions whose id appears
    /// more than once fail right away.
    fn admit_sessions(&mut self) {
        let mut counts: BTreeMap<PduSessionId, usize> = BTreeMap::new();
        for item in &self.request.pdu_session_res_setup_items {
            *counts.entry(item.pdu_session_id).or_default() += 1;
        }

        for item in &self.request.pdu_session_res_setup_items {
            let psi = item.pdu_session_id;
            if counts[&psi] > 1 {
                if !self.failed.iter().any(|f| f.pdu_session_id == psi) {
                    self.failed.push(PduSessionResourceFailedToSetupItem {
                        pdu_session_id: psi,
                        cause: PduSessionSetupFailureCause::MultiplePduSessionIdInstances,
                    });
                }
                continue;
            }
            self.pending.insert(
                psi,
                PendingSession {
                    item: item.clone(),
                    drbs: Vec::new(),
                    dl_ngu_up_tnl_info: None,
                    ul_f1u_tnl_info: BTreeMap::new(),
                    dl_f1u_tnl_info: BTreeMap::new(),
                },
            );
        }
    }

    fn calculate_drbs(&mut self) -> Result<(), PduSessionSetupFailureCause> {
        let pending_request = PduSessionResourceSetupRequest {
            ue_index: self.request.ue_index,
            pdu_session_res_setup_items: self.pending.values().map(|s| s.item.clone()).collect(),
            ue_aggregate_maximum_bit_rate_dl: self.request.ue_aggregate_maximum_bit_rate_dl,
        };
        self.new_drbs = self.drb_mng.calculate_drb_to_add_list(&pending_request);
        debug!("{}: {} new DRBs", self.request.ue_index, self.new_drbs.len());

        let psis: Vec<_> = self.pending.keys().copied().collect();
        for psi in psis {
            let drbs = self.drb_mng.get_drbs_of_session(psi);
            if drbs.is_empty() {
                self.fail_session(psi, PduSessionSetupFailureCause::NoDrbAvailable);
            } else if let Some(session) = self.pending.get_mut(&psi) {
                session.drbs = drbs;
            }
        }
        self.ensure_pending(PduSessionSetupFailureCause::NoDrbAvailable)
    }

    async fn bearer_context_setup(&mut self) -> Result<(), PduSessionSetupFailureCause> {
        let cause = PduSessionSetupFailureCause::BearerContextSetupFailure;
        let msg = E1BearerContextSetupRequest {
            ue_index: self.request.ue_index,
            security: self.security_cfg,
            ue_dl_aggregate_maximum_bit_rate: self.request.ue_aggregate_maximum_bit_rate_dl,
            pdu_sessions_to_setup: self
                .pending
                .values()
                .map(|s| E1PduSessionToSetupItem {
                    pdu_session_id: s.item.pdu_session_id,
                    s_nssai: s.item.s_nssai,
                    pdu_session_type: s.item.pdu_session_type,
                    ul_ngu_up_tnl_info: s.item.ul_ngu_up_tnl_info,
                    drbs_to_setup: s
                        .drbs
                        .iter()
                        .filter_map(|id| self.drb_mng.get_drb_context(*id))
                        .map(|drb| E1DrbToSetupItem {
                            drb_id: drb.drb_id,
                            five_qi: drb.five_qi,
                            qos_flows: drb.qos_flows,
                        })
                        .collect(),
                })
                .collect(),
        };

        let resp = self.e1ap.on_bearer_context_setup_request(&msg).await;
        if !resp.success {
            return Err(cause);
        }

        for psi in resp.pdu_sessions_failed {
            self.fail_session(psi, cause);
        }
        let mut confirmed = Vec::new();
        for setup in resp.pdu_sessions_setup {
            let Some(session) = self.pending.get_mut(&setup.pdu_session_id) else {
                continue;
            };
            session.dl_ngu_up_tnl_info = Some(setup.dl_ngu_up_tnl_info);
            session.ul_f1u_tnl_info = setup
                .drbs_setup
                .iter()
                .map(|drb| (drb.drb_id, drb.ul_up_tnl_info))
                .collect();
            // Every DRB of the session must have been set up.
            if session.drbs.iter().all(|id| session.ul_f1u_tnl_info.contains_key(id)) {
                confirmed.push(setup.pdu_session_id);
            }
        }
        self.retain_confirmed(&confirmed, cause);
        self.ensure_pending(cause)
    }

    async fn ue_context_modification(&mut self) -> Result<(), PduSessionSetupFailureCause> {
        let cause = PduSessionSetupFailureCause::UeContextModificationFailure;
        let drb_mng = &self.drb_mng;
        let msg = F1UeContextModificationRequest {
            ue_index: self.request.ue_index,
            drbs_to_setup: self
                .pending
                .values()
                .flat_map(|s| {
                    s.drbs.iter().filter_map(move |id| {
                        let drb = drb_mng.get_drb_context(*id)?;
                        Some(F1DrbToSetupItem {
                            drb_id: drb.drb_id,
                            five_qi: drb.five_qi,
                            qos_flows: drb.qos_flows,
                            ul_up_tnl_info: *s.ul_f1u_tnl_info.get(id)?,
                        })
                    })
                })
                .collect(),
        };

        let resp = self.f1ap.on_ue_context_modification_request(&msg).await;
        if !resp.success {
            return Err(cause);
        }
        self.master_cell_group = resp.du_to_cu_rrc_container;

        let dl_tnl: BTreeMap<_, _> =
            resp.drbs_setup.iter().map(|d| (d.drb_id, d.dl_up_tnl_info)).collect();
        let mut confirmed = Vec::new();
        for (psi, session) in self.pending.iter_mut() {
            let any_failed = session.drbs.iter().any(|id| resp.drbs_failed.contains(id));
            session.dl_f1u_tnl_info = session
                .drbs
                .iter()
                .filter_map(|id| dl_tnl.get(id).map(|tnl| (*id, *tnl)))
                .collect();
            if !any_failed && session.dl_f1u_tnl_info.len() == session.drbs.len() {
                confirmed.push(*psi);
            }
        }
        self.retain_confirmed(&confirmed, cause);
        self.ensure_pending(cause)
    }

    async fn bearer_context_modification(&mut self) -> Result<(), PduSessionSetupFailureCause> {
        let cause = PduSessionSetupFailureCause::BearerContextModificationFailure;
        let msg = E1BearerContextModificationRequest {
            ue_index: self.request.ue_index,
            pdu_sessions_to_modify: self
                .pending
                .values()
                .map(|s| E1PduSessionToModifyItem {
                    pdu_session_id: s.item.pdu_session_id,
                    drbs_to_modify: s
                        .dl_f1u_tnl_info
                        .iter()
                        .map(|(drb_id, tnl)| E1DrbToModifyItem {
                            drb_id: *drb_id,
                            dl_up_tnl_info: *tnl,
                        })
                        .collect(),
                })
                .collect(),
        };

        let resp = self.e1ap.on_bearer_context_modification_request(&msg).await;
        if !resp.success {
            return Err(cause);
        }

        for psi in resp.pdu_sessions_failed {
            self.fail_session(psi, cause);
        }
        self.retain_confirmed(&resp.pdu_sessions_modified, cause);
        self.ensure_pending(cause)
    }

    async fn rrc_reconfiguration(&mut self) -> Result<(), PduSessionSetupFailureCause> {
        let security = self.security_cfg;
        let msg = RrcReconfigurationRequest {
            ue_index: self.request.ue_index,
            drbs_to_add_mod: self
                .pending
                .values()
                .flat_map(|s| {
                    s.drbs.iter().map(move |drb_id| RrcDrbToAddMod {
                        drb_id: *drb_id,
                        pdu_session_id: s.item.pdu_session_id,
                        security,
                    })
                })
                .collect(),
            master_cell_group: self.master_cell_group.clone(),
            dedicated_nas_messages: self
                .pending
                .values()
                .map(|s| s.item.pdu_session_nas_pdu.clone())
                .filter(|pdu| !pdu.is_empty())
                .collect(),
        };

        if self.rrc_ue.on_rrc_reconfiguration_request(&msg).await {
            Ok(())
        } else {
            Err(PduSessionSetupFailureCause::RrcReconfigurationFailure)
        }
    }

    /// Fails every pending session not in `confirmed`.
    fn retain_confirmed(&mut self, confirmed: &[PduSessionId], cause: PduSessionSetupFailureCause) {
        let unconfirmed: Vec<_> = self
            .pending
            .keys()
            .filter(|psi| !confirmed.contains(psi))
            .copied()
            .collect();
        for psi in unconfirmed {
            self.fail_session(psi, cause);
        }
    }

    fn ensure_pending(
        &self,
        cause: PduSessionSetupFailureCause,
    ) -> Result<(), PduSessionSetupFailureCause> {
        if self.pending.is_empty() {
            Err(cause)
        } else {
            Ok(())
        }
    }

    fn fail_session(&mut self, psi: PduSessionId, cause: PduSessionSetupFailureCause) {
        if let Some(session) = self.pending.remove(&psi) {
            debug!("{}: {} failed at {} stage: {}", self.request.ue_index, psi, self.stage, cause);
            self.release_new_drbs(&session.drbs);
            self.failed.push(PduSessionResourceFailedToSetupItem {
                pdu_session_id: psi,
                cause,
            });
        }
    }

    fn release_new_drbs(&self, drbs: &[DrbId]) {
        let released: Vec<_> =
            drbs.iter().copied().filter(|id| self.new_drbs.contains(id)).collect();
        if !released.is_empty() {
            self.drb_mng.release_drbs(&released);
        }
    }

    fn fail_all_pending(&mut self, cause: PduSessionSetupFailureCause) {
        let psis: Vec<_> = self.pending.keys().copied().collect();
        for psi in psis {
            self.fail_session(psi, cause);
        }
    }

    fn into_response(mut self) -> PduSessionResourceSetupResponse {
        let incomplete: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, s)| s.dl_ngu_up_tnl_info.is_none())
            .map(|(psi, _)| *psi)
            .collect();
        for psi in incomplete {
            self.fail_session(psi, PduSessionSetupFailureCause::Unspecified);
        }

        let mut failed_items = self.failed;
        let mut setup_items = Vec::with_capacity(self.pending.len());
        for (psi, session) in self.pending {
            let Some(dl_ngu_up_tnl_info) = session.dl_ngu_up_tnl_info else {
                continue;
            };
            setup_items.push(PduSessionResourceSetupResponseItem {
                pdu_session_id: psi,
                dl_ngu_up_tnl_info,
                qos_flows: session
                    .item
                    .qos_flow_setup_request_items
                    .iter()
                    .map(|f| f.qos_flow_id)
                    .collect(),
                drbs: session.drbs,
            });
        }

        failed_items.sort_by_key(|f| f.pdu_session_id);

        PduSessionResourceSetupResponse {
            ue_index: self.request.ue_index,
            pdu_session_res_setup_response_items: setup_items,
            pdu_session_res_failed_to_setup_items: failed_items,
        }
    }
}

//! DU Processor
//!
//! CU-CP side view of the UEs served through one DU. Each UE carries its
//! security configuration, its DRB allocator and the handle of its RRC entity.
//! PDU session requests from NGAP run as routines on the UE's control loop and
//! their outcome is delivered to the NGAP sink.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, MutexGuard};

use gnbproc_common::{
    log_proc_failure, CuCpUeIndex, DrbConfig, GnbProcConfig, PduSessionId, ProcUe, Rnti,
    DEFAULT_CTRL_LOOP_CAPACITY, MAX_NOF_CU_UES,
};
use tracing::{debug, info};

use super::drb_manager::DrbManager;
use super::messages::{
    PduSessionResourceSetupRequest, PduSessionResourceSetupResponse,
    PduSessionResourceSetupResponseItem, PduSessionSetupFailureCause, SecurityConfig,
};
use super::notifiers::{
    E1apControlNotifier, F1apUeContextNotifier, NgapResponseNotifier, RrcUeControlNotifier,
};
use super::routine_manager::DuProcessorRoutineManager;
use super::routines::PduSessionResourceSetupRoutine;
use crate::ctrl_loop::ControlLoop;
use crate::ue_registry::{SharedUeRegistry, UeRegistry};

/// DU processor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuProcessorConfig {
    /// Size of the CU-CP UE table
    pub max_nof_ues: usize,
    /// Pending procedures accepted per control loop
    pub ctrl_loop_capacity: usize,
    /// DRB allocation settings applied to every UE
    pub drb: DrbConfig,
}

impl Default for DuProcessorConfig {
    fn default() -> Self {
        Self {
            max_nof_ues: MAX_NOF_CU_UES,
            ctrl_loop_capacity: DEFAULT_CTRL_LOOP_CAPACITY,
            drb: DrbConfig::default(),
        }
    }
}

impl From<&GnbProcConfig> for DuProcessorConfig {
    fn from(cfg: &GnbProcConfig) -> Self {
        Self {
            max_nof_ues: cfg.max_nof_ues as usize,
            ctrl_loop_capacity: cfg.ctrl_loop_capacity,
            drb: cfg.drb.clone(),
        }
    }
}

/// A UE as seen by the CU-CP
#[derive(Clone)]
pub struct CuCpUe {
    pub ue_index: CuCpUeIndex,
    pub rnti: Rnti,
    pub security_cfg: SecurityConfig,
    /// Established PDU sessions
    pub pdu_sessions: BTreeMap<PduSessionId, PduSessionResourceSetupResponseItem>,
    pub drb_manager: Arc<DrbManager>,
    pub rrc: Arc<dyn RrcUeControlNotifier>,
}

impl CuCpUe {
    fn new(
        ue_index: CuCpUeIndex,
        rnti: Rnti,
        drb_cfg: &DrbConfig,
        rrc: Arc<dyn RrcUeControlNotifier>,
    ) -> Self {
        Self {
            ue_index,
            rnti,
            security_cfg: SecurityConfig::default(),
            pdu_sessions: BTreeMap::new(),
            drb_manager: Arc::new(DrbManager::new(drb_cfg)),
            rrc,
        }
    }
}

impl std::fmt::Debug for CuCpUe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuCpUe")
            .field("ue_index", &self.ue_index)
            .field("rnti", &self.rnti)
            .field("security_cfg", &self.security_cfg)
            .field("pdu_sessions", &self.pdu_sessions.keys().collect::<Vec<_>>())
            .field("nof_drbs", &self.drb_manager.nof_drbs())
            .finish()
    }
}

struct DuProcessorInner {
    cfg: DuProcessorConfig,
    ue_db: SharedUeRegistry<CuCpUeIndex, CuCpUe>,
    main_ctrl_loop: ControlLoop,
    routine_mng: DuProcessorRoutineManager,
    ngap: Arc<dyn NgapResponseNotifier>,
}

/// DU processor handle. Clones share the same UE table.
#[derive(Clone)]
pub struct DuProcessor {
    inner: Arc<DuProcessorInner>,
}

impl DuProcessor {
    pub fn new(
        cfg: DuProcessorConfig,
        e1ap: Arc<dyn E1apControlNotifier>,
        f1ap: Arc<dyn F1apUeContextNotifier>,
        ngap: Arc<dyn NgapResponseNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(DuProcessorInner {
                ue_db: SharedUeRegistry::new("CU-CP", cfg.max_nof_ues, cfg.ctrl_loop_capacity),
                main_ctrl_loop: ControlLoop::new("CU-CP main", cfg.ctrl_loop_capacity),
                routine_mng: DuProcessorRoutineManager::new(e1ap, f1ap),
                ngap,
                cfg,
            }),
        }
    }

    /// Registers a UE together with its RRC entity.
    pub fn create_ue(
        &self,
        ue_index: CuCpUeIndex,
        rnti: Rnti,
        rrc: Arc<dyn RrcUeControlNotifier>,
    ) -> bool {
        if ue_index.as_usize() >= self.inner.cfg.max_nof_ues || !rnti.is_valid() {
            debug!("{} {}: rejected, invalid identifiers", ue_index, rnti);
            return false;
        }
        let mut ue_db = self.ue_db();
        let ue = CuCpUe::new(ue_index, rnti, &self.inner.cfg.drb, rrc);
        let added = ue_db.add(ue_index, rnti, ue).is_some();
        if added {
            info!("{} {}: added to CU-CP ({} UEs)", ue_index, rnti, ue_db.len());
        }
        added
    }

    /// Stores the AS security configuration negotiated for a UE.
    pub fn set_security_config(&self, ue_index: CuCpUeIndex, security_cfg: SecurityConfig) -> bool {
        self.update_ue(ue_index, |ue| ue.security_cfg = security_cfg).is_some()
    }

    /// Runs a PDU Session Resource Setup for the UE in `msg`.
    ///
    /// Exactly one response reaches the NGAP sink, including when the UE is
    /// unknown or its loop no longer accepts work.
    pub fn handle_pdu_session_resource_setup_request(&self, msg: PduSessionResourceSetupRequest) {
        let ue_index = msg.ue_index;
        let reject = |msg: &PduSessionResourceSetupRequest, cause: &str| {
            log_proc_failure(ProcUe::CuCp(ue_index), PduSessionResourceSetupRoutine::NAME, cause);
            self.inner
                .ngap
                .on_pdu_session_resource_setup_response(PduSessionResourceSetupResponse::all_failed(
                    msg,
                    PduSessionSetupFailureCause::UnknownUe,
                ));
        };
        if ue_index.as_usize() >= self.inner.cfg.max_nof_ues {
            reject(&msg, "Invalid UE index");
            return;
        }

        // Kept for the rejection path, since the task owns the request.
        let fallback = msg.clone();
        let task = self.clone().run_pdu_session_resource_setup(msg);
        let scheduled = {
            let ue_db = self.ue_db();
            match ue_db.find(ue_index) {
                Some(ue) => ue.ctrl_loop.schedule(task).map_err(|e| e.to_string()),
                None => Err("Inexistent UE index".to_string()),
            }
        };
        if let Err(cause) = scheduled {
            reject(&fallback, &cause);
        }
    }

    /// Schedules the erase of a UE once its loop drained.
    pub fn remove_ue(&self, ue_index: CuCpUeIndex) -> bool {
        if ue_index.as_usize() >= self.inner.cfg.max_nof_ues {
            return false;
        }
        self.inner.ue_db.remove_deferred(&self.inner.main_ctrl_loop, ue_index)
    }

    /// Returns a snapshot of a UE.
    pub fn find_ue(&self, ue_index: CuCpUeIndex) -> Option<CuCpUe> {
        if ue_index.as_usize() >= self.inner.cfg.max_nof_ues {
            return None;
        }
        self.ue_db().find(ue_index).map(|ue| ue.ctx.clone())
    }

    /// Number of UEs in the table, including UEs waiting for removal.
    pub fn nof_ues(&self) -> usize {
        self.ue_db().len()
    }

    /// Stops the main control loop once every scheduled removal finished.
    pub fn stop(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.main_ctrl_loop.request_stop()
    }

    async fn run_pdu_session_resource_setup(self, msg: PduSessionResourceSetupRequest) {
        let ue_index = msg.ue_index;
        let ue = self.find_ue(ue_index);
        let resp = match ue {
            Some(ue) => {
                self.inner
                    .routine_mng
                    .start_pdu_session_resource_setup_routine(
                        msg,
                        ue.security_cfg,
                        ue.rrc,
                        ue.drb_manager,
                    )
                    .await
            }
            None => PduSessionResourceSetupResponse::all_failed(
                &msg,
                PduSessionSetupFailureCause::UnknownUe,
            ),
        };

        self.update_ue(ue_index, |ue| {
            for item in &resp.pdu_session_res_setup_response_items {
                ue.pdu_sessions.insert(item.pdu_session_id, item.clone());
            }
        });
        self.inner.ngap.on_pdu_session_resource_setup_response(resp);
    }

    fn update_ue<R>(&self, ue_index: CuCpUeIndex, f: impl FnOnce(&mut CuCpUe) -> R) -> Option<R> {
        if ue_index.as_usize() >= self.inner.cfg.max_nof_ues {
            return None;
        }
        self.ue_db().find_mut(ue_index).map(|ue| f(&mut ue.ctx))
    }

    fn ue_db(&self) -> MutexGuard<'_, UeRegistry<CuCpUeIndex, CuCpUe>> {
        self.inner.ue_db.lock()
    }
}

impl std::fmt::Debug for DuProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuProcessor")
            .field("cfg", &self.inner.cfg)
            .field("ue_db", &self.inner.ue_db)
            .finish()
    }
}

//! MAC Control Component
//!
//! Entry point for UE management requests towards the MAC. Every request is
//! turned into a procedure and scheduled on the target UE's control loop, so
//! creation, reconfiguration and deletion of one UE never overlap.
//!
//! # Architecture
//!
//! ```text
//!  handle_ue_*_request ──> UeRegistry lookup/add ──> UE ctrl loop ──> procedure
//!                                                                      │
//!          MacUlConfigurer / MacDlConfigurer <─────────────────────────┤
//!          MacCtrlNotifier <───────────────────────────────────────────┘
//!
//!  remove_ue ──> main ctrl loop: await UE loop drain ──> erase
//! ```
//!
//! Structural removal from the UE table always goes through the main loop and
//! waits for the UE's own loop to drain, so a procedure queued behind a delete
//! never sees a half-destroyed UE.

use std::future::Future;
use std::sync::{Arc, MutexGuard};

use gnbproc_common::{
    log_proc_failure, DuCellIndex, DuUeIndex, GnbProcConfig, ProcUe, Rnti,
    DEFAULT_CTRL_LOOP_CAPACITY,
};
use tracing::debug;

use super::configurer::{MacCtrlNotifier, MacDlConfigurer, MacUlConfigurer};
use super::messages::{
    MacUeCreateRequest, MacUeCreateResponse, MacUeDeleteRequest, MacUeDeleteResponse,
    MacUeReconfigurationRequest, MacUeReconfigurationResponse,
};
use super::procedures::{MacUeCreateProcedure, MacUeDeleteProcedure, MacUeReconfigurationProcedure};
use super::ue_context::MacUeContext;
use crate::ctrl_loop::{ControlLoop, ControlLoopError};
use crate::ue_registry::{SharedUeRegistry, UeRegistry};

/// MAC control component configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacCtrlConfig {
    /// Size of the MAC UE table
    pub max_nof_ues: usize,
    /// Pending procedures accepted per control loop
    pub ctrl_loop_capacity: usize,
}

impl Default for MacCtrlConfig {
    fn default() -> Self {
        Self {
            max_nof_ues: gnbproc_common::MAX_NOF_DU_UES,
            ctrl_loop_capacity: DEFAULT_CTRL_LOOP_CAPACITY,
        }
    }
}

impl From<&GnbProcConfig> for MacCtrlConfig {
    fn from(cfg: &GnbProcConfig) -> Self {
        Self {
            max_nof_ues: cfg.max_nof_ues as usize,
            ctrl_loop_capacity: cfg.ctrl_loop_capacity,
        }
    }
}

struct MacCtrlInner {
    ue_db: SharedUeRegistry<DuUeIndex, MacUeContext>,
    main_ctrl_loop: ControlLoop,
    ul_unit: Arc<dyn MacUlConfigurer>,
    dl_unit: Arc<dyn MacDlConfigurer>,
    notifier: Arc<dyn MacCtrlNotifier>,
}

/// MAC control component handle. Clones share the same UE table.
#[derive(Clone)]
pub struct MacController {
    inner: Arc<MacCtrlInner>,
}

impl MacController {
    /// Creates the controller and spawns its main control loop.
    pub fn new(
        cfg: MacCtrlConfig,
        ul_unit: Arc<dyn MacUlConfigurer>,
        dl_unit: Arc<dyn MacDlConfigurer>,
        notifier: Arc<dyn MacCtrlNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(MacCtrlInner {
                ue_db: SharedUeRegistry::new("MAC", cfg.max_nof_ues, cfg.ctrl_loop_capacity),
                main_ctrl_loop: ControlLoop::new("MAC main", cfg.ctrl_loop_capacity),
                ul_unit,
                dl_unit,
                notifier,
            }),
        }
    }

    /// Creates a UE and configures it in UL and DL MAC.
    ///
    /// A duplicate C-RNTI or an occupied index is reported through the
    /// notifier with `result=false` and leaves the UE table untouched.
    pub fn handle_ue_create_request(&self, msg: MacUeCreateRequest) {
        let (ue_index, crnti, cell_index) = (msg.ue_index, msg.crnti, msg.cell_index);
        let fail = |cause: &str| {
            log_proc_failure(ProcUe::Du(ue_index, Some(crnti)), MacUeCreateProcedure::NAME, cause);
            self.inner.notifier.on_ue_create_request_complete(MacUeCreateResponse {
                ue_index,
                cell_index,
                result: false,
            });
        };

        if self.find_by_rnti(crnti).is_some() {
            fail("Duplicate C-RNTI");
            return;
        }
        if !self.add_ue(ue_index, crnti, cell_index) {
            fail("Invalid UE parameters");
            return;
        }

        let proc = MacUeCreateProcedure::new(msg, self.clone());
        if let Err(e) = self.schedule_on_ue(ue_index, proc.run()) {
            fail(&e.to_string());
        }
    }

    /// Tears the UE down in DL and UL MAC and schedules its removal.
    pub fn handle_ue_delete_request(&self, msg: MacUeDeleteRequest) {
        let (ue_index, rnti) = (msg.ue_index, msg.rnti);

        let proc = MacUeDeleteProcedure::new(msg, self.clone());
        if let Err(e) = self.schedule_on_ue(ue_index, proc.run()) {
            let ue = ProcUe::Du(ue_index, Some(rnti));
            log_proc_failure(ue, MacUeDeleteProcedure::NAME, &e.to_string());
            self.inner
                .notifier
                .on_ue_delete_complete(MacUeDeleteResponse { ue_index, result: false });
        }
    }

    /// Applies a configuration change to an existing UE.
    pub fn handle_ue_reconfiguration_request(&self, msg: MacUeReconfigurationRequest) {
        let (ue_index, crnti) = (msg.ue_index, msg.crnti);

        let proc = MacUeReconfigurationProcedure::new(msg, self.clone());
        if let Err(e) = self.schedule_on_ue(ue_index, proc.run()) {
            log_proc_failure(
                ProcUe::Du(ue_index, Some(crnti)),
                MacUeReconfigurationProcedure::NAME,
                &e.to_string(),
            );
            self.inner
                .notifier
                .on_ue_reconfiguration_complete(MacUeReconfigurationResponse {
                    ue_index,
                    result: false,
                });
        }
    }

    /// Returns a snapshot of a UE's context.
    pub fn find_ue(&self, ue_index: DuUeIndex) -> Option<MacUeContext> {
        self.ue_db().find(ue_index).map(|ue| ue.ctx.clone())
    }

    /// Returns a snapshot of the context of the UE holding `rnti`.
    pub fn find_by_rnti(&self, rnti: Rnti) -> Option<MacUeContext> {
        self.ue_db().find_by_rnti(rnti).map(|ue| ue.ctx.clone())
    }

    /// Number of UEs in the table, including UEs waiting for removal.
    pub fn nof_ues(&self) -> usize {
        self.ue_db().len()
    }

    /// Stops the main control loop once every scheduled removal finished.
    pub fn stop(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.main_ctrl_loop.request_stop()
    }

    /// Registers a UE in the table.
    pub(crate) fn add_ue(&self, ue_index: DuUeIndex, crnti: Rnti, cell_index: DuCellIndex) -> bool {
        let mut ue_db = self.ue_db();
        let added = ue_db
            .add(ue_index, crnti, MacUeContext::new(ue_index, crnti, cell_index))
            .is_some();
        if added {
            debug!("{} {}: added to MAC ({} UEs)", ue_index, crnti, ue_db.len());
        }
        added
    }

    /// Schedules the structural removal of a UE.
    ///
    /// The erase runs on the main loop after the UE's loop drained. Repeated
    /// calls for a UE whose removal is already pending are ignored.
    pub(crate) fn remove_ue(&self, ue_index: DuUeIndex) {
        self.inner.ue_db.remove_deferred(&self.inner.main_ctrl_loop, ue_index);
    }

    /// Applies `f` to the context of a live UE.
    pub(crate) fn update_ue<R>(
        &self,
        ue_index: DuUeIndex,
        f: impl FnOnce(&mut MacUeContext) -> R,
    ) -> Option<R> {
        self.ue_db().find_mut(ue_index).map(|ue| f(&mut ue.ctx))
    }

    pub(crate) fn can_update_ue_rnti(&self, ue_index: DuUeIndex, rnti: Rnti) -> bool {
        self.ue_db().can_update_rnti(ue_index, rnti)
    }

    /// Moves a UE to a new C-RNTI in the reverse index.
    pub(crate) fn update_ue_rnti(&self, ue_index: DuUeIndex, rnti: Rnti) -> bool {
        self.ue_db().update_rnti(ue_index, rnti)
    }

    pub(crate) fn ul_unit(&self) -> &dyn MacUlConfigurer {
        self.inner.ul_unit.as_ref()
    }

    pub(crate) fn dl_unit(&self) -> &dyn MacDlConfigurer {
        self.inner.dl_unit.as_ref()
    }

    pub(crate) fn notifier(&self) -> &dyn MacCtrlNotifier {
        self.inner.notifier.as_ref()
    }

    /// Schedules a procedure on the UE's control loop.
    fn schedule_on_ue<F>(&self, ue_index: DuUeIndex, task: F) -> Result<(), ScheduleError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ue_db = self.ue_db();
        let ue = ue_db.find(ue_index).ok_or(ScheduleError::UnknownUe)?;
        ue.ctrl_loop.schedule(task).map_err(ScheduleError::Loop)
    }

    fn ue_db(&self) -> MutexGuard<'_, UeRegistry<DuUeIndex, MacUeContext>> {
        self.inner.ue_db.lock()
    }
}

impl std::fmt::Debug for MacController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacController")
            .field("ue_db", &self.inner.ue_db)
            .field("main_ctrl_loop", &self.inner.main_ctrl_loop)
            .finish()
    }
}

/// Reasons a procedure could not be queued for a UE.
#[derive(Debug, thiserror::Error)]
enum ScheduleError {
    #[error("Inexistent UE index")]
    UnknownUe,
    #[error(transparent)]
    Loop(#[from] ControlLoopError),
}

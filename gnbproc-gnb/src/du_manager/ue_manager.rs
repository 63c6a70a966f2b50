//! DU UE Manager
//!
//! Owns the DU UE table. Each request is validated here, since the table
//! itself treats bad identifiers as bugs, and then runs as a procedure on the
//! UE's control loop. Callers get an [`AsyncTask`] resolving with the outcome.

use std::future::Future;
use std::sync::{Arc, MutexGuard};

use futures::FutureExt;
use gnbproc_common::{log_proc_failure, DuUeIndex, GnbProcConfig, ProcUe, Rnti};
use tokio::sync::oneshot;

use super::du_ue::{DuUe, DuUeConfigRequest, DuUeCreationRequest, DuUeDeleteRequest};
use super::mac_adapter::MacUeConfigurator;
use super::procedures::{UeConfigurationProcedure, UeCreationProcedure, UeDeletionProcedure};
use crate::ctrl_loop::{AsyncTask, ControlLoop};
use crate::ue_registry::{SharedUeRegistry, UeRegistry};

/// DU manager configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuUeManagerConfig {
    /// Size of the DU UE table
    pub max_nof_ues: usize,
    /// Number of cells served
    pub nof_cells: usize,
    /// Pending procedures accepted per control loop
    pub ctrl_loop_capacity: usize,
}

impl From<&GnbProcConfig> for DuUeManagerConfig {
    fn from(cfg: &GnbProcConfig) -> Self {
        Self {
            max_nof_ues: cfg.max_nof_ues as usize,
            nof_cells: cfg.nof_cells as usize,
            ctrl_loop_capacity: cfg.ctrl_loop_capacity,
        }
    }
}

struct DuUeManagerInner {
    cfg: DuUeManagerConfig,
    ue_db: SharedUeRegistry<DuUeIndex, DuUe>,
    main_ctrl_loop: ControlLoop,
    mac: Arc<dyn MacUeConfigurator>,
}

/// DU UE manager handle. Clones share the same UE table.
#[derive(Clone)]
pub struct DuUeManager {
    inner: Arc<DuUeManagerInner>,
}

impl DuUeManager {
    pub fn new(cfg: DuUeManagerConfig, mac: Arc<dyn MacUeConfigurator>) -> Self {
        Self {
            inner: Arc::new(DuUeManagerInner {
                cfg,
                ue_db: SharedUeRegistry::new("DU", cfg.max_nof_ues, cfg.ctrl_loop_capacity),
                main_ctrl_loop: ControlLoop::new("DU main", cfg.ctrl_loop_capacity),
                mac,
            }),
        }
    }

    /// Returns the lowest index not in use.
    pub fn find_unused_ue_index(&self) -> Option<DuUeIndex> {
        let ue_db = self.ue_db();
        (0..ue_db.capacity())
            .map(|i| DuUeIndex(i as u16))
            .find(|idx| !ue_db.contains(*idx))
    }

    /// Creates a UE in the DU and in MAC. Resolves to false if the UE could
    /// not be created; a UE that failed in MAC is removed again.
    pub fn handle_ue_create_request(&self, req: DuUeCreationRequest) -> AsyncTask<bool> {
        let ue = ProcUe::Du(req.ue_index, Some(req.crnti));
        let name = UeCreationProcedure::NAME;
        if let Err(cause) = self.validate(req.ue_index, Some(req.crnti)) {
            return fail_now(ue, name, cause);
        }
        if req.pcell_index.as_usize() >= self.inner.cfg.nof_cells {
            return fail_now(ue, name, "Invalid PCell index");
        }

        let scheduled = {
            let mut ue_db = self.ue_db();
            let du_ue = DuUe::new(req.ue_index, req.crnti, req.pcell_index);
            match ue_db.add(req.ue_index, req.crnti, du_ue) {
                Some(du_ue) => du_ue
                    .ctrl_loop
                    .schedule_with_result(UeCreationProcedure::new(req, self.clone()).run())
                    .map_err(|e| e.to_string()),
                None => Err("Duplicate C-RNTI or UE index".to_string()),
            }
        };
        into_task(ue, name, scheduled)
    }

    /// Changes the bearers of a UE in MAC and in the DU context.
    pub fn handle_ue_config_request(&self, req: DuUeConfigRequest) -> AsyncTask<bool> {
        let ue_index = req.ue_index;
        let proc = UeConfigurationProcedure::new(req, self.clone());
        self.schedule_on_ue(ue_index, UeConfigurationProcedure::NAME, proc.run())
    }

    /// Removes a UE from MAC and from the DU.
    pub fn handle_ue_delete_request(&self, req: DuUeDeleteRequest) -> AsyncTask<bool> {
        let proc = UeDeletionProcedure::new(req, self.clone());
        self.schedule_on_ue(req.ue_index, UeDeletionProcedure::NAME, proc.run())
    }

    /// Returns a snapshot of a UE.
    pub fn find_ue(&self, ue_index: DuUeIndex) -> Option<DuUe> {
        self.validate(ue_index, None).ok()?;
        self.ue_db().find(ue_index).map(|ue| ue.ctx.clone())
    }

    /// Returns a snapshot of the UE holding `rnti`.
    pub fn find_by_rnti(&self, rnti: Rnti) -> Option<DuUe> {
        if !rnti.is_valid() {
            return None;
        }
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

    pub(crate) fn mac(&self) -> &dyn MacUeConfigurator {
        self.inner.mac.as_ref()
    }

    pub(crate) fn update_ue<R>(
        &self,
        ue_index: DuUeIndex,
        f: impl FnOnce(&mut DuUe) -> R,
    ) -> Option<R> {
        self.ue_db().find_mut(ue_index).map(|ue| f(&mut ue.ctx))
    }

    /// Schedules the erase of a UE once its loop drained.
    pub(crate) fn remove_ue(&self, ue_index: DuUeIndex) {
        self.inner.ue_db.remove_deferred(&self.inner.main_ctrl_loop, ue_index);
    }

    fn schedule_on_ue<F>(&self, ue_index: DuUeIndex, name: &'static str, task: F) -> AsyncTask<bool>
    where
        F: Future<Output = bool> + Send + 'static,
    {
        let ue = ProcUe::Du(ue_index, None);
        if let Err(cause) = self.validate(ue_index, None) {
            return fail_now(ue, name, cause);
        }
        let scheduled = {
            let ue_db = self.ue_db();
            match ue_db.find(ue_index) {
                Some(du_ue) => du_ue
                    .ctrl_loop
                    .schedule_with_result(task)
                    .map_err(|e| e.to_string()),
                None => Err("Inexistent UE index".to_string()),
            }
        };
        into_task(ue, name, scheduled)
    }

    fn validate(&self, ue_index: DuUeIndex, rnti: Option<Rnti>) -> Result<(), &'static str> {
        if ue_index.as_usize() >= self.inner.cfg.max_nof_ues {
            return Err("Invalid UE index");
        }
        if rnti.is_some_and(|r| !r.is_valid()) {
            return Err("Invalid C-RNTI");
        }
        Ok(())
    }

    fn ue_db(&self) -> MutexGuard<'_, UeRegistry<DuUeIndex, DuUe>> {
        self.inner.ue_db.lock()
    }
}

impl std::fmt::Debug for DuUeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuUeManager")
            .field("cfg", &self.inner.cfg)
            .field("ue_db", &self.inner.ue_db)
            .finish()
    }
}

fn fail_now(ue: ProcUe, name: &str, cause: &str) -> AsyncTask<bool> {
    log_proc_failure(ue, name, cause);
    futures::future::ready(false).boxed()
}

fn into_task(
    ue: ProcUe,
    name: &str,
    scheduled: Result<oneshot::Receiver<bool>, String>,
) -> AsyncTask<bool> {
    match scheduled {
        Ok(result) => async move { result.await.unwrap_or(false) }.boxed(),
        Err(cause) => fail_now(ue, name, &cause),
    }
}

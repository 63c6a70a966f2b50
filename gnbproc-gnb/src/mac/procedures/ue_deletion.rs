use gnbproc_common::{log_proc_completed, log_proc_failure, log_proc_started, ProcUe};

use crate::mac::ctrl::MacController;
use crate::mac::messages::{MacUeDeleteRequest, MacUeDeleteResponse};

/// Releases a UE from DL then UL MAC and hands it to deferred removal.
///
/// The UE is erased from the table later, on the main loop, once every
/// procedure still queued for it has finished.
pub struct MacUeDeleteProcedure {
    req: MacUeDeleteRequest,
    ctrl: MacController,
}

impl MacUeDeleteProcedure {
    pub const NAME: &'static str = "UE Delete Request";

    pub fn new(req: MacUeDeleteRequest, ctrl: MacController) -> Self {
        Self { req, ctrl }
    }

    pub async fn run(self) {
        let ue = ProcUe::Du(self.req.ue_index, Some(self.req.rnti));
        log_proc_started(ue, Self::NAME);

        let rnti = self.req.rnti;
        let started = self.ctrl.update_ue(self.req.ue_index, |ctx| {
            if ctx.rnti != rnti {
                Err("C-RNTI mismatch")
            } else if !ctx.on_removal() {
                Err("UE removal already in progress")
            } else {
                Ok(())
            }
        });
        match started {
            Some(Ok(())) => {}
            Some(Err(cause)) => return self.finish(false, Some(cause)),
            None => return self.finish(false, Some("Inexistent UE index")),
        }

        // Scheduler first, so no further grants are issued for the UE.
        let dl_ok = self.ctrl.dl_unit().remove_ue(&self.req).await;
        let ul_ok = self.ctrl.ul_unit().remove_ue(&self.req).await;

        self.ctrl.remove_ue(self.req.ue_index);

        match (dl_ok, ul_ok) {
            (true, true) => self.finish(true, None),
            (false, _) => self.finish(false, Some("DL MAC failed to release the UE")),
            (true, false) => self.finish(false, Some("UL MAC failed to release the UE")),
        }
    }

    fn finish(&self, result: bool, cause: Option<&str>) {
        let ue = ProcUe::Du(self.req.ue_index, Some(self.req.rnti));
        match cause {
            None => log_proc_completed(ue, Self::NAME),
            Some(cause) => log_proc_failure(ue, Self::NAME, cause),
        }
        self.ctrl.notifier().on_ue_delete_complete(MacUeDeleteResponse {
            ue_index: self.req.ue_index,
            result,
        });
    }
}

use gnbproc_common::{log_proc_completed, log_proc_failure, log_proc_started, ProcUe};

use crate::mac::ctrl::MacController;
use crate::mac::messages::{MacUeCreateRequest, MacUeCreateResponse};

/// Configures a freshly registered UE in UL and DL MAC.
///
/// The two legs are independent and run concurrently. On failure the UE stays
/// in the table in the `CreationFailed` state until it is deleted.
pub struct MacUeCreateProcedure {
    req: MacUeCreateRequest,
    ctrl: MacController,
}

impl MacUeCreateProcedure {
    pub const NAME: &'static str = "UE Create Request";

    pub fn new(req: MacUeCreateRequest, ctrl: MacController) -> Self {
        Self { req, ctrl }
    }

    pub async fn run(self) {
        let ue = ProcUe::Du(self.req.ue_index, Some(self.req.crnti));
        log_proc_started(ue, Self::NAME);

        let (ul_ok, dl_ok) = tokio::join!(
            self.ctrl.ul_unit().add_ue(&self.req),
            self.ctrl.dl_unit().add_ue(&self.req)
        );

        let result = ul_ok && dl_ok;
        if result {
            self.ctrl
                .update_ue(self.req.ue_index, |ctx| ctx.on_created(&self.req.bearers));
            log_proc_completed(ue, Self::NAME);
        } else {
            self.ctrl.update_ue(self.req.ue_index, |ctx| ctx.on_creation_failed());
            let cause = if ul_ok { "DL MAC rejected the UE" } else { "UL MAC rejected the UE" };
            log_proc_failure(ue, Self::NAME, cause);
        }

        self.ctrl.notifier().on_ue_create_request_complete(MacUeCreateResponse {
            ue_index: self.req.ue_index,
            cell_index: self.req.cell_index,
            result,
        });
    }
}

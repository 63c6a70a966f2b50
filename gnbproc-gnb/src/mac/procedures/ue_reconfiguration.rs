use gnbproc_common::{log_proc_completed, log_proc_failure, log_proc_started, ProcUe};

use crate::mac::ctrl::MacController;
use crate::mac::messages::{MacUeReconfigurationRequest, MacUeReconfigurationResponse};

/// Applies a UE configuration change in UL then DL MAC.
///
/// The C-RNTI is checked before either unit is touched. The stored UE context
/// only changes when both legs succeed.
pub struct MacUeReconfigurationProcedure {
    req: MacUeReconfigurationRequest,
    ctrl: MacController,
}

impl MacUeReconfigurationProcedure {
    pub const NAME: &'static str = "UE Reconfiguration Request";

    pub fn new(req: MacUeReconfigurationRequest, ctrl: MacController) -> Self {
        Self { req, ctrl }
    }

    pub async fn run(self) {
        let ue = ProcUe::Du(self.req.ue_index, Some(self.req.crnti));
        log_proc_started(ue, Self::NAME);

        match self.ctrl.update_ue(self.req.ue_index, |ctx| ctx.is_removing()) {
            Some(false) => {}
            Some(true) => return self.finish(false, Some("UE is being removed")),
            None => return self.finish(false, Some("Inexistent UE index")),
        }

        if !self.ctrl.can_update_ue_rnti(self.req.ue_index, self.req.crnti) {
            return self.finish(false, Some("C-RNTI already in use"));
        }
        if !self.ctrl.ul_unit().reconfigure_ue(&self.req).await {
            return self.finish(false, Some("UL MAC rejected the configuration"));
        }
        if !self.ctrl.dl_unit().reconfigure_ue(&self.req).await {
            return self.finish(false, Some("DL MAC rejected the configuration"));
        }

        if !self.ctrl.update_ue_rnti(self.req.ue_index, self.req.crnti) {
            return self.finish(false, Some("C-RNTI already in use"));
        }
        self.ctrl.update_ue(self.req.ue_index, |ctx| {
            ctx.on_reconfigured(
                self.req.crnti,
                self.req.pcell_index,
                &self.req.bearers_to_addmod,
                &self.req.bearers_to_rem,
            )
        });
        self.finish(true, None);
    }

    fn finish(&self, result: bool, cause: Option<&str>) {
        let ue = ProcUe::Du(self.req.ue_index, Some(self.req.crnti));
        match cause {
            None => log_proc_completed(ue, Self::NAME),
            Some(cause) => log_proc_failure(ue, Self::NAME, cause),
        }
        self.ctrl
            .notifier()
            .on_ue_reconfiguration_complete(MacUeReconfigurationResponse {
                ue_index: self.req.ue_index,
                result,
            });
    }
}

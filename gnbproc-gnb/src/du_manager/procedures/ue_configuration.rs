use gnbproc_common::{log_proc_completed, log_proc_failure, log_proc_started, ProcUe};

use crate::du_manager::du_ue::DuUeConfigRequest;
use crate::du_manager::ue_manager::DuUeManager;
use crate::mac::MacUeReconfigurationRequest;

/// Applies a bearer change in MAC, then in the DU UE context.
pub struct UeConfigurationProcedure {
    req: DuUeConfigRequest,
    ue_mng: DuUeManager,
}

impl UeConfigurationProcedure {
    pub const NAME: &'static str = "UE Configuration";

    pub fn new(req: DuUeConfigRequest, ue_mng: DuUeManager) -> Self {
        Self { req, ue_mng }
    }

    pub async fn run(self) -> bool {
        let Some(du_ue) = self.ue_mng.find_ue(self.req.ue_index) else {
            let ue = ProcUe::Du(self.req.ue_index, None);
            log_proc_failure(ue, Self::NAME, "Inexistent UE index");
            return false;
        };
        let ue = ProcUe::Du(du_ue.ue_index, Some(du_ue.rnti));
        log_proc_started(ue, Self::NAME);

        let resp = self
            .ue_mng
            .mac()
            .handle_ue_reconfiguration_request(MacUeReconfigurationRequest {
                ue_index: du_ue.ue_index,
                crnti: du_ue.rnti,
                pcell_index: du_ue.pcell_index,
                bearers_to_addmod: self.req.bearers_to_addmod.clone(),
                bearers_to_rem: self.req.bearers_to_rem.clone(),
            })
            .await;

        if !resp.result {
            log_proc_failure(ue, Self::NAME, "MAC UE reconfiguration failed");
            return false;
        }

        self.ue_mng.update_ue(self.req.ue_index, |du_ue| {
            du_ue.apply_bearer_changes(&self.req.bearers_to_addmod, &self.req.bearers_to_rem)
        });
        log_proc_completed(ue, Self::NAME);
        true
    }
}

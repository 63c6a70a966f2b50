use gnbproc_common::{log_proc_completed, log_proc_failure, log_proc_started, ProcUe};
use tracing::debug;

use crate::du_manager::du_ue::DuUeCreationRequest;
use crate::du_manager::ue_manager::DuUeManager;
use crate::mac::{MacUeCreateRequest, MacUeDeleteRequest};

/// Creates a UE in MAC after it was added to the DU UE table.
///
/// If MAC rejects the UE, the UE is released from MAC and removed from the
/// DU table again.
pub struct UeCreationProcedure {
    req: DuUeCreationRequest,
    ue_mng: DuUeManager,
}

impl UeCreationProcedure {
    pub const NAME: &'static str = "UE Create";

    pub fn new(req: DuUeCreationRequest, ue_mng: DuUeManager) -> Self {
        Self { req, ue_mng }
    }

    pub async fn run(self) -> bool {
        let ue = ProcUe::Du(self.req.ue_index, Some(self.req.crnti));
        log_proc_started(ue, Self::NAME);

        let bearers = self
            .ue_mng
            .update_ue(self.req.ue_index, |du_ue| du_ue.bearers.clone())
            .unwrap_or_default();
        let resp = self
            .ue_mng
            .mac()
            .handle_ue_create_request(MacUeCreateRequest {
                ue_index: self.req.ue_index,
                crnti: self.req.crnti,
                cell_index: self.req.pcell_index,
                bearers,
            })
            .await;

        if !resp.result {
            log_proc_failure(ue, Self::NAME, "MAC UE creation failed");
            self.clear_ue().await;
            return false;
        }

        log_proc_completed(ue, Self::NAME);
        true
    }

    async fn clear_ue(&self) {
        let resp = self
            .ue_mng
            .mac()
            .handle_ue_delete_request(MacUeDeleteRequest {
                ue_index: self.req.ue_index,
                rnti: self.req.crnti,
                cell_index: self.req.pcell_index,
            })
            .await;
        if !resp.result {
            debug!("{}: no MAC UE context left to release", self.req.ue_index);
        }
        self.ue_mng.remove_ue(self.req.ue_index);
    }
}

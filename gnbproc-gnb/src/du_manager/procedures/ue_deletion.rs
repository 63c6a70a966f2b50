use gnbproc_common::{log_proc_completed, log_proc_failure, log_proc_started, ProcUe};

use crate::du_manager::du_ue::DuUeDeleteRequest;
use crate::du_manager::ue_manager::DuUeManager;
use crate::mac::MacUeDeleteRequest;

/// Removes a UE from MAC and then from the DU UE table.
///
/// The DU entry is removed even when MAC fails to release the UE.
pub struct UeDeletionProcedure {
    req: DuUeDeleteRequest,
    ue_mng: DuUeManager,
}

impl UeDeletionProcedure {
    pub const NAME: &'static str = "UE Delete";

    pub fn new(req: DuUeDeleteRequest, ue_mng: DuUeManager) -> Self {
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
            .handle_ue_delete_request(MacUeDeleteRequest {
                ue_index: du_ue.ue_index,
                rnti: du_ue.rnti,
                cell_index: du_ue.pcell_index,
            })
            .await;

        self.ue_mng.remove_ue(self.req.ue_index);

        if resp.result {
            log_proc_completed(ue, Self::NAME);
        } else {
            log_proc_failure(ue, Self::NAME, "MAC UE deletion failed");
        }
        resp.result
    }
}

//! Interfaces between the CU-CP and its peers

use async_trait::async_trait;
use gnbproc_common::{DrbId, PduSessionId};

use super::drb_manager::DrbContext;
use super::messages::{
    E1BearerContextModificationRequest, E1BearerContextModificationResponse,
    E1BearerContextSetupRequest, E1BearerContextSetupResponse, F1UeContextModificationRequest,
    F1UeContextModificationResponse, PduSessionResourceSetupRequest,
    PduSessionResourceSetupResponse, RrcReconfigurationRequest,
};

/// E1AP towards the CU-UP.
#[async_trait]
pub trait E1apControlNotifier: Send + Sync {
    /// Sends a Bearer Context Setup Request and awaits the answer.
    async fn on_bearer_context_setup_request(
        &self,
        msg: &E1BearerContextSetupRequest,
    ) -> E1BearerContextSetupResponse;

    /// Sends a Bearer Context Modification Request and awaits the answer.
    async fn on_bearer_context_modification_request(
        &self,
        msg: &E1BearerContextModificationRequest,
    ) -> E1BearerContextModificationResponse;
}

/// F1AP towards the DU.
#[async_trait]
pub trait F1apUeContextNotifier: Send + Sync {
    /// Sends a UE Context Modification Request and awaits the answer.
    async fn on_ue_context_modification_request(
        &self,
        msg: &F1UeContextModificationRequest,
    ) -> F1UeContextModificationResponse;
}

/// RRC UE entity.
#[async_trait]
pub trait RrcUeControlNotifier: Send + Sync {
    /// Sends an RRC Reconfiguration to the UE. Resolves to true once the UE
    /// answered with RRC Reconfiguration Complete.
    async fn on_rrc_reconfiguration_request(&self, msg: &RrcReconfigurationRequest) -> bool;
}

/// DRB bookkeeping of an RRC UE entity.
pub trait RrcUeDrbManager: Send + Sync {
    /// Maps the QoS flows of every requested session onto DRBs, allocating
    /// new DRBs where needed. Returns the newly allocated DRBs.
    fn calculate_drb_to_add_list(&self, msg: &PduSessionResourceSetupRequest) -> Vec<DrbId>;

    /// Returns the context of an allocated DRB.
    fn get_drb_context(&self, drb_id: DrbId) -> Option<DrbContext>;

    /// Returns the DRBs carrying a PDU session, in id order.
    fn get_drbs_of_session(&self, pdu_session_id: PduSessionId) -> Vec<DrbId>;

    /// Frees DRBs so their ids can be allocated again.
    fn release_drbs(&self, drb_ids: &[DrbId]);
}

/// NGAP towards the AMF.
pub trait NgapResponseNotifier: Send + Sync {
    /// Called once per PDU Session Resource Setup Request.
    fn on_pdu_session_resource_setup_response(&self, resp: PduSessionResourceSetupResponse);
}

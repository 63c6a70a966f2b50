//! CU-CP message model
//!
//! Decoded views of the NGAP, E1AP, F1AP and RRC messages exchanged by the
//! PDU session resource setup routine. Only the fields the routine reads or
//! fills are modelled.

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use gnbproc_common::{CuCpUeIndex, DrbId, FiveQi, PduSessionId, QosFlowId, SNssai};

// ============================================================================
// Common
// ============================================================================

/// GTP-U tunnel endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpTransportLayerInfo {
    /// Transport layer address
    pub transport_layer_address: IpAddr,
    /// GTP-U tunnel endpoint identifier
    pub gtp_teid: u32,
}

impl UpTransportLayerInfo {
    pub fn new(transport_layer_address: IpAddr, gtp_teid: u32) -> Self {
        Self {
            transport_layer_address,
            gtp_teid,
        }
    }
}

impl fmt::Display for UpTransportLayerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/teid={:#x}", self.transport_layer_address, self.gtp_teid)
    }
}

/// NR integrity protection algorithm (TS 33.501)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityAlgorithm {
    Nia0,
    Nia1,
    #[default]
    Nia2,
    Nia3,
}

/// NR ciphering algorithm (TS 33.501)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipheringAlgorithm {
    Nea0,
    Nea1,
    #[default]
    Nea2,
    Nea3,
}

/// AS security configuration applied to new DRBs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityConfig {
    pub integrity_algo: IntegrityAlgorithm,
    pub ciphering_algo: CipheringAlgorithm,
    /// User plane integrity protection required
    pub integrity_protection_required: bool,
    /// User plane confidentiality protection required
    pub confidentiality_protection_required: bool,
}

// ============================================================================
// NGAP
// ============================================================================

/// PDU session type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PduSessionType {
    #[default]
    Ipv4,
    Ipv6,
    Ipv4v6,
    Ethernet,
    Unstructured,
}

/// QoS flow requested for a PDU session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosFlowSetupRequestItem {
    pub qos_flow_id: QosFlowId,
    pub five_qi: FiveQi,
    /// ARP priority level (1 = highest)
    pub priority_level: u8,
}

/// One PDU session of a PDU Session Resource Setup Request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceSetupItem {
    pub pdu_session_id: PduSessionId,
    /// NAS PDU forwarded to the UE in the RRC reconfiguration
    pub pdu_session_nas_pdu: Bytes,
    pub s_nssai: SNssai,
    pub pdu_session_type: PduSessionType,
    /// UPF endpoint for uplink traffic
    pub ul_ngu_up_tnl_info: UpTransportLayerInfo,
    pub qos_flow_setup_request_items: Vec<QosFlowSetupRequestItem>,
}

/// PDU Session Resource Setup Request (TS 38.413 9.2.1.1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionResourceSetupRequest {
    pub ue_index: CuCpUeIndex,
    pub pdu_session_res_setup_items: Vec<PduSessionResourceSetupItem>,
    /// UE aggregate maximum bit rate, downlink (bit/s)
    pub ue_aggregate_maximum_bit_rate_dl: u64,
}

/// Successfully established PDU session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceSetupResponseItem {
    pub pdu_session_id: PduSessionId,
    /// CU-UP endpoint for downlink traffic
    pub dl_ngu_up_tnl_info: UpTransportLayerInfo,
    /// DRBs carrying the session
    pub drbs: Vec<DrbId>,
    /// QoS flows mapped onto those DRBs
    pub qos_flows: Vec<QosFlowId>,
}

/// Why a PDU session could not be set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PduSessionSetupFailureCause {
    #[error("multiple PDU session ID instances")]
    MultiplePduSessionIdInstances,
    #[error("no DRB available")]
    NoDrbAvailable,
    #[error("bearer context setup failed")]
    BearerContextSetupFailure,
    #[error("UE context modification failed")]
    UeContextModificationFailure,
    #[error("bearer context modification failed")]
    BearerContextModificationFailure,
    #[error("RRC reconfiguration failed")]
    RrcReconfigurationFailure,
    #[error("unknown UE")]
    UnknownUe,
    #[error("unspecified")]
    Unspecified,
}

/// PDU session that could not be set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduSessionResourceFailedToSetupItem {
    pub pdu_session_id: PduSessionId,
    pub cause: PduSessionSetupFailureCause,
}

/// PDU Session Resource Setup Response (TS 38.413 9.2.1.2).
///
/// Every session of the request appears in exactly one of the two lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionResourceSetupResponse {
    pub ue_index: CuCpUeIndex,
    pub pdu_session_res_setup_response_items: Vec<PduSessionResourceSetupResponseItem>,
    pub pdu_session_res_failed_to_setup_items: Vec<PduSessionResourceFailedToSetupItem>,
}

impl PduSessionResourceSetupResponse {
    /// Creates a response with both lists empty.
    pub fn empty(ue_index: CuCpUeIndex) -> Self {
        Self {
            ue_index,
            ..Default::default()
        }
    }

    /// Creates a response failing every session of `req` with `cause`.
    pub fn all_failed(
        req: &PduSessionResourceSetupRequest,
        cause: PduSessionSetupFailureCause,
    ) -> Self {
        Self {
            ue_index: req.ue_index,
            pdu_session_res_setup_response_items: vec![],
            pdu_session_res_failed_to_setup_items: req
                .pdu_session_res_setup_items
                .iter()
                .map(|item| PduSessionResourceFailedToSetupItem {
                    pdu_session_id: item.pdu_session_id,
                    cause,
                })
                .collect(),
        }
    }

    /// True if nothing failed and at least one session was set up.
    pub fn is_successful(&self) -> bool {
        self.pdu_session_res_failed_to_setup_items.is_empty()
            && !self.pdu_session_res_setup_response_items.is_empty()
    }
}

// ============================================================================
// E1AP
// ============================================================================

/// DRB to establish in the CU-UP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E1DrbToSetupItem {
    pub drb_id: DrbId,
    pub five_qi: FiveQi,
    pub qos_flows: Vec<QosFlowId>,
}

/// PDU session to establish in the CU-UP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E1PduSessionToSetupItem {
    pub pdu_session_id: PduSessionId,
    pub s_nssai: SNssai,
    pub pdu_session_type: PduSessionType,
    pub ul_ngu_up_tnl_info: UpTransportLayerInfo,
    pub drbs_to_setup: Vec<E1DrbToSetupItem>,
}

/// Bearer Context Setup Request (TS 38.463 9.2.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E1BearerContextSetupRequest {
    pub ue_index: CuCpUeIndex,
    pub security: SecurityConfig,
    pub ue_dl_aggregate_maximum_bit_rate: u64,
    pub pdu_sessions_to_setup: Vec<E1PduSessionToSetupItem>,
}

/// DRB established by the CU-UP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct E1DrbSetupItem {
    pub drb_id: DrbId,
    /// CU-UP F1-U endpoint for uplink traffic from the DU
    pub ul_up_tnl_info: UpTransportLayerInfo,
}

/// PDU session established by the CU-UP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E1PduSessionSetupItem {
    pub pdu_session_id: PduSessionId,
    pub dl_ngu_up_tnl_info: UpTransportLayerInfo,
    pub drbs_setup: Vec<E1DrbSetupItem>,
}

/// Bearer Context Setup Response or Failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct E1BearerContextSetupResponse {
    /// False for a Bearer Context Setup Failure
    pub success: bool,
    pub pdu_sessions_setup: Vec<E1PduSessionSetupItem>,
    pub pdu_sessions_failed: Vec<PduSessionId>,
}

/// DU F1-U endpoint to hand to the CU-UP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct E1DrbToModifyItem {
    pub drb_id: DrbId,
    pub dl_up_tnl_info: UpTransportLayerInfo,
}

/// PDU session to modify in the CU-UP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E1PduSessionToModifyItem {
    pub pdu_session_id: PduSessionId,
    pub drbs_to_modify: Vec<E1DrbToModifyItem>,
}

/// Bearer Context Modification Request (TS 38.463 9.2.2.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E1BearerContextModificationRequest {
    pub ue_index: CuCpUeIndex,
    pub pdu_sessions_to_modify: Vec<E1PduSessionToModifyItem>,
}

/// Bearer Context Modification Response or Failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct E1BearerContextModificationResponse {
    /// False for a Bearer Context Modification Failure
    pub success: bool,
    pub pdu_sessions_modified: Vec<PduSessionId>,
    pub pdu_sessions_failed: Vec<PduSessionId>,
}

// ============================================================================
// F1AP
// ============================================================================

/// DRB to establish in the DU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F1DrbToSetupItem {
    pub drb_id: DrbId,
    pub five_qi: FiveQi,
    pub qos_flows: Vec<QosFlowId>,
    /// CU-UP F1-U endpoint for uplink traffic
    pub ul_up_tnl_info: UpTransportLayerInfo,
}

/// UE Context Modification Request (TS 38.473 9.2.2.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F1UeContextModificationRequest {
    pub ue_index: CuCpUeIndex,
    pub drbs_to_setup: Vec<F1DrbToSetupItem>,
}

/// DRB established by the DU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F1DrbSetupItem {
    pub drb_id: DrbId,
    /// DU F1-U endpoint for downlink traffic
    pub dl_up_tnl_info: UpTransportLayerInfo,
}

/// UE Context Modification Response or Failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct F1UeContextModificationResponse {
    /// False for a UE Context Modification Failure
    pub success: bool,
    pub drbs_setup: Vec<F1DrbSetupItem>,
    pub drbs_failed: Vec<DrbId>,
    /// CellGroupConfig generated by the DU
    pub du_to_cu_rrc_container: Bytes,
}

// ============================================================================
// RRC
// ============================================================================

/// DRB added by an RRC reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrcDrbToAddMod {
    pub drb_id: DrbId,
    pub pdu_session_id: PduSessionId,
    pub security: SecurityConfig,
}

/// RRC Reconfiguration pushed to the UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcReconfigurationRequest {
    pub ue_index: CuCpUeIndex,
    pub drbs_to_add_mod: Vec<RrcDrbToAddMod>,
    /// Secondary cell group as generated by the DU
    pub master_cell_group: Bytes,
    /// NAS PDUs of the PDU sessions being established
    pub dedicated_nas_messages: Vec<Bytes>,
}

//! MAC UE management request and response messages

use gnbproc_common::{DuCellIndex, DuUeIndex, Lcid, Rnti};

/// Logical channel to be configured in MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacLogicalChannelConfig {
    /// Logical channel identifier
    pub lcid: Lcid,
    /// Logical channel priority (1 = highest)
    pub priority: u8,
    /// Logical channel group used for buffer status reporting
    pub lcg_id: u8,
}

impl MacLogicalChannelConfig {
    /// Creates a logical channel config with the given priority and LCG 0.
    pub fn new(lcid: Lcid, priority: u8) -> Self {
        Self { lcid, priority, lcg_id: 0 }
    }
}

/// Request to create a UE in MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacUeCreateRequest {
    /// DU UE index to allocate
    pub ue_index: DuUeIndex,
    /// C-RNTI assigned to the UE
    pub crnti: Rnti,
    /// Serving cell
    pub cell_index: DuCellIndex,
    /// Initial logical channels (SRBs)
    pub bearers: Vec<MacLogicalChannelConfig>,
}

/// Outcome of a UE creation in MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacUeCreateResponse {
    /// UE the request referred to
    pub ue_index: DuUeIndex,
    /// Serving cell from the request
    pub cell_index: DuCellIndex,
    /// True if both UL and DL MAC accepted the UE
    pub result: bool,
}

/// Request to remove a UE from MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacUeDeleteRequest {
    /// UE to remove
    pub ue_index: DuUeIndex,
    /// C-RNTI of the UE
    pub rnti: Rnti,
    /// Serving cell
    pub cell_index: DuCellIndex,
}

/// Outcome of a UE removal from MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacUeDeleteResponse {
    /// UE the request referred to
    pub ue_index: DuUeIndex,
    /// True if both UL and DL MAC released the UE
    pub result: bool,
}

/// Request to change the MAC configuration of an existing UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacUeReconfigurationRequest {
    /// UE to reconfigure
    pub ue_index: DuUeIndex,
    /// C-RNTI of the UE
    pub crnti: Rnti,
    /// Primary cell
    pub pcell_index: DuCellIndex,
    /// Logical channels to add or modify
    pub bearers_to_addmod: Vec<MacLogicalChannelConfig>,
    /// Logical channels to release
    pub bearers_to_rem: Vec<Lcid>,
}

/// Outcome of a UE reconfiguration in MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacUeReconfigurationResponse {
    /// UE the request referred to
    pub ue_index: DuUeIndex,
    /// True if both UL and DL MAC applied the change
    pub result: bool,
}

//! DU UE context and DU manager requests

use gnbproc_common::{DuCellIndex, DuUeIndex, Lcid, Rnti};

use crate::mac::MacLogicalChannelConfig;

/// LCID of SRB1, configured on every new UE.
pub const SRB1_LCID: Lcid = Lcid(1);

/// DU view of a UE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuUe {
    /// DU UE index
    pub ue_index: DuUeIndex,
    /// C-RNTI
    pub rnti: Rnti,
    /// Primary cell
    pub pcell_index: DuCellIndex,
    /// Logical channels configured in MAC
    pub bearers: Vec<MacLogicalChannelConfig>,
}

impl DuUe {
    /// Creates a UE with SRB1 as its only bearer.
    pub fn new(ue_index: DuUeIndex, rnti: Rnti, pcell_index: DuCellIndex) -> Self {
        Self {
            ue_index,
            rnti,
            pcell_index,
            bearers: vec![MacLogicalChannelConfig::new(SRB1_LCID, 1)],
        }
    }

    /// Replaces and removes bearers by LCID.
    pub fn apply_bearer_changes(&mut self, to_addmod: &[MacLogicalChannelConfig], to_rem: &[Lcid]) {
        self.bearers
            .retain(|b| !to_rem.contains(&b.lcid) && !to_addmod.iter().any(|n| n.lcid == b.lcid));
        self.bearers.extend_from_slice(to_addmod);
        self.bearers.sort_by_key(|b| b.lcid);
    }
}

/// Request to create a UE in the DU, e.g. on reception of a UL-CCCH message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuUeCreationRequest {
    /// Index to allocate
    pub ue_index: DuUeIndex,
    /// Temporary C-RNTI assigned during random access
    pub crnti: Rnti,
    /// Cell the UE accessed
    pub pcell_index: DuCellIndex,
}

/// Request to change the bearers of a DU UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuUeConfigRequest {
    /// UE to reconfigure
    pub ue_index: DuUeIndex,
    /// Bearers to add or modify
    pub bearers_to_addmod: Vec<MacLogicalChannelConfig>,
    /// Bearers to release
    pub bearers_to_rem: Vec<Lcid>,
}

/// F1AP UE context release: removes a UE from the DU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuUeDeleteRequest {
    /// UE to remove
    pub ue_index: DuUeIndex,
}

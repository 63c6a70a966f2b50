//! MAC UE Context
//!
//! Per-UE state kept by the MAC control component: identity, serving cell,
//! configured logical channels and the lifecycle state driven by the MAC UE
//! procedures.

use std::collections::BTreeMap;

use gnbproc_common::{DuCellIndex, DuUeIndex, Lcid, Rnti};

use super::messages::MacLogicalChannelConfig;

/// MAC UE lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacUeState {
    /// Registered, UL/DL configuration in progress
    #[default]
    Creating,
    /// UL and DL MAC accepted the UE
    Active,
    /// UL or DL MAC rejected the UE; entry kept until deleted
    CreationFailed,
    /// Delete procedure started, waiting for deferred removal
    Removing,
}

impl std::fmt::Display for MacUeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacUeState::Creating => write!(f, "Creating"),
            MacUeState::Active => write!(f, "Active"),
            MacUeState::CreationFailed => write!(f, "CreationFailed"),
            MacUeState::Removing => write!(f, "Removing"),
        }
    }
}

/// MAC UE context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacUeContext {
    /// DU UE index
    pub du_ue_index: DuUeIndex,
    /// Current C-RNTI
    pub rnti: Rnti,
    /// Primary serving cell
    pub pcell_index: DuCellIndex,
    /// Configured logical channels, keyed by LCID
    pub logical_channels: BTreeMap<Lcid, MacLogicalChannelConfig>,
    /// Lifecycle state
    pub state: MacUeState,
}

impl MacUeContext {
    /// Creates a context in the `Creating` state with no logical channels.
    pub fn new(du_ue_index: DuUeIndex, rnti: Rnti, pcell_index: DuCellIndex) -> Self {
        Self {
            du_ue_index,
            rnti,
            pcell_index,
            logical_channels: BTreeMap::new(),
            state: MacUeState::Creating,
        }
    }

    /// Transitions to `Active` and installs the initial logical channels.
    pub fn on_created(&mut self, bearers: &[MacLogicalChannelConfig]) {
        self.logical_channels = bearers.iter().map(|lc| (lc.lcid, *lc)).collect();
        self.state = MacUeState::Active;
    }

    /// Transitions to `CreationFailed`.
    pub fn on_creation_failed(&mut self) {
        self.state = MacUeState::CreationFailed;
    }

    /// Applies a successful reconfiguration.
    pub fn on_reconfigured(
        &mut self,
        crnti: Rnti,
        pcell_index: DuCellIndex,
        to_addmod: &[MacLogicalChannelConfig],
        to_rem: &[Lcid],
    ) {
        self.rnti = crnti;
        self.pcell_index = pcell_index;
        for lcid in to_rem {
            self.logical_channels.remove(lcid);
        }
        for lc in to_addmod {
            self.logical_channels.insert(lc.lcid, *lc);
        }
    }

    /// Transitions to `Removing`. Returns false if removal had already started.
    pub fn on_removal(&mut self) -> bool {
        if self.state == MacUeState::Removing {
            return false;
        }
        self.state = MacUeState::Removing;
        true
    }

    /// Returns true once the delete procedure started.
    pub fn is_removing(&self) -> bool {
        self.state == MacUeState::Removing
    }
}

//! Core RAN identifier types: UE indexes, RNTI, cell index, PDU session and bearer IDs.
//!
//! Identifiers are thin newtypes over the integer width used on the wire. Range
//! limits are exposed as constants; they are enforced by the components that own
//! the corresponding tables, not by the constructors here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of UEs a DU (MAC, DU manager) can serve at once.
pub const MAX_NOF_DU_UES: usize = 1024;

/// Maximum number of UEs a CU-CP can serve at once.
pub const MAX_NOF_CU_UES: usize = 1024;

/// Maximum number of cells handled by one DU.
pub const MAX_NOF_DU_CELLS: usize = 16;

/// Maximum number of DRBs per UE (TS 38.331 `maxDRB`).
pub const MAX_NOF_DRBS: usize = 29;

/// Highest valid QoS flow identifier (6 bits).
pub const MAX_QOS_FLOW_ID: u8 = 63;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident($inner:ty), $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Returns the raw value.
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "={}"), self.0)
            }
        }
    };
}

index_type!(
    /// UE index inside the DU (MAC, DU manager). Valid range `0..MAX_NOF_DU_UES`.
    DuUeIndex(u16),
    "ueId"
);

index_type!(
    /// UE index inside the CU-CP. Valid range `0..MAX_NOF_CU_UES`.
    CuCpUeIndex(u16),
    "cuUeId"
);

index_type!(
    /// Cell index inside the DU. Valid range `0..MAX_NOF_DU_CELLS`.
    DuCellIndex(u8),
    "cell"
);

index_type!(
    /// PDU session identifier (TS 38.413).
    PduSessionId(u8),
    "psi"
);

index_type!(
    /// Data radio bearer identifier. Valid range `1..=MAX_NOF_DRBS`.
    DrbId(u8),
    "drb"
);

index_type!(
    /// QoS flow identifier. Valid range `0..=MAX_QOS_FLOW_ID`.
    QosFlowId(u8),
    "qfi"
);

index_type!(
    /// Logical channel identifier.
    Lcid(u8),
    "lcid"
);

index_type!(
    /// 5G QoS identifier.
    FiveQi(u16),
    "5qi"
);

impl DuUeIndex {
    /// Returns the index as a table position.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl CuCpUeIndex {
    /// Returns the index as a table position.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl DuCellIndex {
    /// Returns the index as a table position.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl DrbId {
    /// Returns true if the id is inside `1..=MAX_NOF_DRBS`.
    pub fn is_valid(self) -> bool {
        self.0 >= 1 && (self.0 as usize) <= MAX_NOF_DRBS
    }
}

/// Radio Network Temporary Identifier.
///
/// The C-RNTI identifies a UE on the air interface of its serving cell. Zero is
/// reserved and never assigned to a live UE.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rnti(pub u16);

/// Reserved RNTI value that never identifies a UE.
pub const INVALID_RNTI: Rnti = Rnti(0);

impl Rnti {
    /// Returns true unless this is [`INVALID_RNTI`].
    pub const fn is_valid(self) -> bool {
        self.0 != INVALID_RNTI.0
    }

    /// Returns the raw value.
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rnti({:#06x})", self.0)
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rnti={:#x}", self.0)
    }
}

/// Single Network Slice Selection Assistance Information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator (24-bit), if any
    pub sd: Option<u32>,
}

impl SNssai {
    /// Creates an S-NSSAI with SST only.
    pub const fn new(sst: u8) -> Self {
        Self { sst, sd: None }
    }

    /// Creates an S-NSSAI with SST and SD.
    pub const fn with_sd(sst: u8, sd: u32) -> Self {
        Self { sst, sd: Some(sd & 0xFF_FFFF) }
    }
}

impl fmt::Display for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd {
            Some(sd) => write!(f, "sst={} sd={:#08x}", self.sst, sd),
            None => write!(f, "sst={}", self.sst),
        }
    }
}

//! DU Manager UE Procedures
//!
//! Keeps the DU view of every UE and drives UE creation, configuration and
//! deletion through the MAC control component.
//!
//! # UE Creation
//! ```text
//! caller            DuUeManager (UE loop)                MAC
//!   │──create request──>│                                  │
//!   │                   │ add to DU table                  │
//!   │                   │──MacUeCreateRequest─────────────>│
//!   │                   │<────────────MacUeCreateResponse──│
//!   │                   │ on failure: MAC delete and       │
//!   │                   │ deferred removal from DU table   │
//!   │<──────result──────│                                  │
//! ```
//!
//! # UE Deletion
//! ```text
//! caller            DuUeManager (UE loop)                MAC
//!   │──delete request──>│                                  │
//!   │                   │──MacUeDeleteRequest─────────────>│
//!   │                   │<────────────MacUeDeleteResponse──│
//!   │                   │ deferred removal from DU table   │
//!   │<──────result──────│                                  │
//! ```

mod du_ue;
mod mac_adapter;
mod procedures;
mod ue_manager;

pub use du_ue::{DuUe, DuUeConfigRequest, DuUeCreationRequest, DuUeDeleteRequest, SRB1_LCID};
pub use mac_adapter::{MacPendingTransactions, MacUeConfigAdapter, MacUeConfigurator};
pub use ue_manager::{DuUeManager, DuUeManagerConfig};

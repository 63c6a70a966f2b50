//! MAC Control Component
//!
//! Creates, reconfigures and deletes UEs in the MAC. Requests are serialized
//! per UE on the UE's control loop; UL and DL MAC are reached through the
//! [`MacUlConfigurer`] and [`MacDlConfigurer`] interfaces and outcomes are
//! reported through [`MacCtrlNotifier`].
//!
//! # UE Lifecycle
//!
//! ```text
//!   handle_ue_create_request
//!            │
//!            ▼
//!       ┌──────────┐  UL+DL ok   ┌──────────┐
//!       │ Creating │────────────>│  Active  │<──┐ reconfiguration
//!       └────┬─────┘             └────┬─────┘───┘
//!            │ UL or DL failed        │ handle_ue_delete_request
//!            ▼                        ▼
//!   ┌────────────────┐ delete   ┌──────────┐  loop drained   ┌────────┐
//!   │ CreationFailed │─────────>│ Removing │────────────────>│ erased │
//!   └────────────────┘          └──────────┘  (main loop)    └────────┘
//! ```

mod configurer;
mod ctrl;
mod messages;
mod procedures;
mod ue_context;

pub use configurer::{MacCtrlNotifier, MacDlConfigurer, MacUlConfigurer};
pub use ctrl::{MacController, MacCtrlConfig};
pub use messages::{
    MacLogicalChannelConfig, MacUeCreateRequest, MacUeCreateResponse, MacUeDeleteRequest,
    MacUeDeleteResponse, MacUeReconfigurationRequest, MacUeReconfigurationResponse,
};
pub use ue_context::{MacUeContext, MacUeState};

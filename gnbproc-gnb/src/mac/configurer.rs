//! Interfaces between the MAC control component and its collaborators

use async_trait::async_trait;

use super::messages::{
    MacUeCreateRequest, MacUeCreateResponse, MacUeDeleteRequest, MacUeDeleteResponse,
    MacUeReconfigurationRequest, MacUeReconfigurationResponse,
};

/// Uplink MAC: applies UE configuration to the UL demultiplexer.
#[async_trait]
pub trait MacUlConfigurer: Send + Sync {
    /// Adds a UE. Resolves to false if the UE could not be added.
    async fn add_ue(&self, req: &MacUeCreateRequest) -> bool;

    /// Applies a configuration change to an existing UE.
    async fn reconfigure_ue(&self, req: &MacUeReconfigurationRequest) -> bool;

    /// Removes a UE.
    async fn remove_ue(&self, req: &MacUeDeleteRequest) -> bool;
}

/// Downlink MAC: applies UE configuration to the DL multiplexer and scheduler.
#[async_trait]
pub trait MacDlConfigurer: Send + Sync {
    /// Adds a UE. Resolves to false if the UE could not be added.
    async fn add_ue(&self, req: &MacUeCreateRequest) -> bool;

    /// Applies a configuration change to an existing UE.
    async fn reconfigure_ue(&self, req: &MacUeReconfigurationRequest) -> bool;

    /// Removes a UE.
    async fn remove_ue(&self, req: &MacUeDeleteRequest) -> bool;
}

/// Result sink of the MAC control component.
///
/// Each handled request produces exactly one call, after the owning procedure
/// has finished.
pub trait MacCtrlNotifier: Send + Sync {
    /// Called when a UE creation request finished.
    fn on_ue_create_request_complete(&self, resp: MacUeCreateResponse);

    /// Called when a UE delete request finished.
    fn on_ue_delete_complete(&self, resp: MacUeDeleteResponse);

    /// Called when a UE reconfiguration request finished.
    fn on_ue_reconfiguration_complete(&self, resp: MacUeReconfigurationResponse);
}

//! Loopback Collaborators
//!
//! In-process stand-ins for every peer the procedure core talks to. Each one
//! answers with a configurable outcome after an optional latency and counts
//! the calls it received. The `gnb-proc` binary wires them together to run
//! scenarios without a real PHY, CU-UP or UE.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use gnbproc_common::{DrbId, PduSessionId};
use tokio::sync::Notify;
use tracing::info;

use crate::cu_cp::{
    E1BearerContextModificationRequest, E1BearerContextModificationResponse,
    E1BearerContextSetupRequest, E1BearerContextSetupResponse, E1DrbSetupItem,
    E1PduSessionSetupItem, E1apControlNotifier, F1DrbSetupItem, F1UeContextModificationRequest,
    F1UeContextModificationResponse, F1apUeContextNotifier, NgapResponseNotifier,
    PduSessionResourceSetupResponse, RrcReconfigurationRequest, RrcUeControlNotifier,
    UpTransportLayerInfo,
};
use crate::mac::{
    MacDlConfigurer, MacUeCreateRequest, MacUeDeleteRequest, MacUeReconfigurationRequest,
    MacUlConfigurer,
};

async fn respond(latency: Duration, outcome: &AtomicBool) -> bool {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
    outcome.load(Ordering::Acquire)
}

// ============================================================================
// MAC
// ============================================================================

/// Loopback UL or DL MAC unit.
#[derive(Debug)]
pub struct LoopbackMacUnit {
    accept: AtomicBool,
    latency: Duration,
    nof_add: AtomicUsize,
    nof_reconfigure: AtomicUsize,
    nof_remove: AtomicUsize,
}

impl Default for LoopbackMacUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackMacUnit {
    /// Creates a unit accepting every request immediately.
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Creates a unit answering after `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            accept: AtomicBool::new(true),
            latency,
            nof_add: AtomicUsize::new(0),
            nof_reconfigure: AtomicUsize::new(0),
            nof_remove: AtomicUsize::new(0),
        }
    }

    /// Sets the outcome of subsequent requests.
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::Release);
    }

    pub fn nof_add_calls(&self) -> usize {
        self.nof_add.load(Ordering::Acquire)
    }

    pub fn nof_reconfigure_calls(&self) -> usize {
        self.nof_reconfigure.load(Ordering::Acquire)
    }

    pub fn nof_remove_calls(&self) -> usize {
        self.nof_remove.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MacUlConfigurer for LoopbackMacUnit {
    async fn add_ue(&self, _req: &MacUeCreateRequest) -> bool {
        self.nof_add.fetch_add(1, Ordering::AcqRel);
        respond(self.latency, &self.accept).await
    }

    async fn reconfigure_ue(&self, _req: &MacUeReconfigurationRequest) -> bool {
        self.nof_reconfigure.fetch_add(1, Ordering::AcqRel);
        respond(self.latency, &self.accept).await
    }

    async fn remove_ue(&self, _req: &MacUeDeleteRequest) -> bool {
        self.nof_remove.fetch_add(1, Ordering::AcqRel);
        respond(self.latency, &self.accept).await
    }
}

#[async_trait]
impl MacDlConfigurer for LoopbackMacUnit {
    async fn add_ue(&self, req: &MacUeCreateRequest) -> bool {
        MacUlConfigurer::add_ue(self, req).await
    }

    async fn reconfigure_ue(&self, req: &MacUeReconfigurationRequest) -> bool {
        MacUlConfigurer::reconfigure_ue(self, req).await
    }

    async fn remove_ue(&self, req: &MacUeDeleteRequest) -> bool {
        MacUlConfigurer::remove_ue(self, req).await
    }
}

// ============================================================================
// CU-CP peers
// ============================================================================

/// Address the loopback CU-UP allocates its tunnel endpoints on.
pub const LOOPBACK_CU_UP_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2));

/// Address the loopback DU allocates its tunnel endpoints on.
pub const LOOPBACK_DU_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 3));

fn lock_list<T: Clone>(list: &Mutex<Vec<T>>) -> Vec<T> {
    list.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn set_list<T>(list: &Mutex<Vec<T>>, values: Vec<T>) {
    *list.lock().unwrap_or_else(PoisonError::into_inner) = values;
}

/// Loopback CU-UP answering E1AP bearer context procedures.
///
/// Allocates a fresh GTP-U TEID for every tunnel endpoint it reports.
#[derive(Debug)]
pub struct LoopbackE1ap {
    setup_accept: AtomicBool,
    modification_accept: AtomicBool,
    setup_failed_sessions: Mutex<Vec<PduSessionId>>,
    modification_failed_sessions: Mutex<Vec<PduSessionId>>,
    latency: Duration,
    next_teid: AtomicU32,
    nof_setup: AtomicUsize,
    nof_modification: AtomicUsize,
}

impl Default for LoopbackE1ap {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackE1ap {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            setup_accept: AtomicBool::new(true),
            modification_accept: AtomicBool::new(true),
            setup_failed_sessions: Mutex::new(Vec::new()),
            modification_failed_sessions: Mutex::new(Vec::new()),
            latency,
            next_teid: AtomicU32::new(1),
            nof_setup: AtomicUsize::new(0),
            nof_modification: AtomicUsize::new(0),
        }
    }

    /// Sets whether Bearer Context Setup is accepted as a whole.
    pub fn set_setup_accept(&self, accept: bool) {
        self.setup_accept.store(accept, Ordering::Release);
    }

    /// Sets whether Bearer Context Modification is accepted as a whole.
    pub fn set_modification_accept(&self, accept: bool) {
        self.modification_accept.store(accept, Ordering::Release);
    }

    /// Sessions reported as failed by subsequent setups.
    pub fn set_setup_failed_sessions(&self, psis: Vec<PduSessionId>) {
        set_list(&self.setup_failed_sessions, psis);
    }

    /// Sessions reported as failed by subsequent modifications.
    pub fn set_modification_failed_sessions(&self, psis: Vec<PduSessionId>) {
        set_list(&self.modification_failed_sessions, psis);
    }

    pub fn nof_setup_calls(&self) -> usize {
        self.nof_setup.load(Ordering::Acquire)
    }

    pub fn nof_modification_calls(&self) -> usize {
        self.nof_modification.load(Ordering::Acquire)
    }

    fn allocate_tnl(&self) -> UpTransportLayerInfo {
        let teid = self.next_teid.fetch_add(1, Ordering::AcqRel);
        UpTransportLayerInfo::new(LOOPBACK_CU_UP_ADDR, teid)
    }
}

#[async_trait]
impl E1apControlNotifier for LoopbackE1ap {
    async fn on_bearer_context_setup_request(
        &self,
        msg: &E1BearerContextSetupRequest,
    ) -> E1BearerContextSetupResponse {
        self.nof_setup.fetch_add(1, Ordering::AcqRel);
        if !respond(self.latency, &self.setup_accept).await {
            return E1BearerContextSetupResponse::default();
        }

        let failed = lock_list(&self.setup_failed_sessions);
        let (failed_items, ok_items): (Vec<_>, Vec<_>) = msg
            .pdu_sessions_to_setup
            .iter()
            .partition(|s| failed.contains(&s.pdu_session_id));
        E1BearerContextSetupResponse {
            success: true,
            pdu_sessions_setup: ok_items
                .into_iter()
                .map(|s| E1PduSessionSetupItem {
                    pdu_session_id: s.pdu_session_id,
                    dl_ngu_up_tnl_info: self.allocate_tnl(),
                    drbs_setup: s
                        .drbs_to_setup
                        .iter()
                        .map(|drb| E1DrbSetupItem {
                            drb_id: drb.drb_id,
                            ul_up_tnl_info: self.allocate_tnl(),
                        })
                        .collect(),
                })
                .collect(),
            pdu_sessions_failed: failed_items.into_iter().map(|s| s.pdu_session_id).collect(),
        }
    }

    async fn on_bearer_context_modification_request(
        &self,
        msg: &E1BearerContextModificationRequest,
    ) -> E1BearerContextModificationResponse {
        self.nof_modification.fetch_add(1, Ordering::AcqRel);
        if !respond(self.latency, &self.modification_accept).await {
            return E1BearerContextModificationResponse::default();
        }

        let failed = lock_list(&self.modification_failed_sessions);
        let (pdu_sessions_failed, pdu_sessions_modified) = msg
            .pdu_sessions_to_modify
            .iter()
            .map(|s| s.pdu_session_id)
            .partition(|psi| failed.contains(psi));
        E1BearerContextModificationResponse {
            success: true,
            pdu_sessions_modified,
            pdu_sessions_failed,
        }
    }
}

/// Loopback DU answering F1AP UE context modifications.
#[derive(Debug)]
pub struct LoopbackF1ap {
    accept: AtomicBool,
    failed_drbs: Mutex<Vec<DrbId>>,
    latency: Duration,
    next_teid: AtomicU32,
    nof_modification: AtomicUsize,
}

impl Default for LoopbackF1ap {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackF1ap {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            accept: AtomicBool::new(true),
            failed_drbs: Mutex::new(Vec::new()),
            latency,
            next_teid: AtomicU32::new(0x100),
            nof_modification: AtomicUsize::new(0),
        }
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::Release);
    }

    /// DRBs reported as failed by subsequent modifications.
    pub fn set_failed_drbs(&self, drbs: Vec<DrbId>) {
        set_list(&self.failed_drbs, drbs);
    }

    pub fn nof_modification_calls(&self) -> usize {
        self.nof_modification.load(Ordering::Acquire)
    }
}

#[async_trait]
impl F1apUeContextNotifier for LoopbackF1ap {
    async fn on_ue_context_modification_request(
        &self,
        msg: &F1UeContextModificationRequest,
    ) -> F1UeContextModificationResponse {
        self.nof_modification.fetch_add(1, Ordering::AcqRel);
        if !respond(self.latency, &self.accept).await {
            return F1UeContextModificationResponse::default();
        }

        let failed = lock_list(&self.failed_drbs);
        let (drbs_failed, drbs_ok): (Vec<_>, Vec<_>) =
            msg.drbs_to_setup.iter().map(|d| d.drb_id).partition(|id| failed.contains(id));
        F1UeContextModificationResponse {
            success: true,
            drbs_setup: drbs_ok
                .into_iter()
                .map(|drb_id| F1DrbSetupItem {
                    drb_id,
                    dl_up_tnl_info: UpTransportLayerInfo::new(
                        LOOPBACK_DU_ADDR,
                        self.next_teid.fetch_add(1, Ordering::AcqRel),
                    ),
                })
                .collect(),
            drbs_failed,
            du_to_cu_rrc_container: Bytes::from_static(b"cellGroupConfig"),
        }
    }
}

/// Loopback RRC UE entity.
#[derive(Debug)]
pub struct LoopbackRrc {
    accept: AtomicBool,
    latency: Duration,
    nof_reconfiguration: AtomicUsize,
}

impl Default for LoopbackRrc {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackRrc {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            accept: AtomicBool::new(true),
            latency,
            nof_reconfiguration: AtomicUsize::new(0),
        }
    }

    /// Sets whether the UE answers with RRC Reconfiguration Complete.
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::Release);
    }

    pub fn nof_reconfiguration_calls(&self) -> usize {
        self.nof_reconfiguration.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RrcUeControlNotifier for LoopbackRrc {
    async fn on_rrc_reconfiguration_request(&self, _msg: &RrcReconfigurationRequest) -> bool {
        self.nof_reconfiguration.fetch_add(1, Ordering::AcqRel);
        respond(self.latency, &self.accept).await
    }
}

/// NGAP sink logging and keeping every response.
#[derive(Debug, Default)]
pub struct NgapResponseLog {
    responses: Mutex<Vec<PduSessionResourceSetupResponse>>,
    received: Notify,
}

impl NgapResponseLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses received so far, in arrival order.
    pub fn responses(&self) -> Vec<PduSessionResourceSetupResponse> {
        lock_list(&self.responses)
    }

    /// Resolves once at least `n` responses arrived.
    pub async fn wait_for_responses(&self, n: usize) {
        loop {
            let received = self.received.notified();
            if self.responses.lock().unwrap_or_else(PoisonError::into_inner).len() >= n {
                return;
            }
            received.await;
        }
    }
}

impl NgapResponseNotifier for NgapResponseLog {
    fn on_pdu_session_resource_setup_response(&self, resp: PduSessionResourceSetupResponse) {
        info!(
            "{}: PDU Session Resource Setup Response: {} setup, {} failed",
            resp.ue_index,
            resp.pdu_session_res_setup_response_items.len(),
            resp.pdu_session_res_failed_to_setup_items.len()
        );
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resp);
        self.received.notify_waiters();
    }
}

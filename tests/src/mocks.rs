//! Recording mock collaborators
//!
//! Every mock appends a line to a shared [`CallLog`] when it is called, so a
//! test can assert the order of calls across components. Outcomes are
//! switchable at runtime through [`Outcome`].

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use gnbproc_common::{DrbId, DuUeIndex, PduSessionId};
use gnbproc_gnb::cu_cp::{
    E1BearerContextModificationRequest, E1BearerContextModificationResponse,
    E1BearerContextSetupRequest, E1BearerContextSetupResponse, E1DrbSetupItem,
    E1PduSessionSetupItem, E1apControlNotifier, F1DrbSetupItem, F1UeContextModificationRequest,
    F1UeContextModificationResponse, F1apUeContextNotifier, NgapResponseNotifier,
    PduSessionResourceSetupResponse, RrcReconfigurationRequest, RrcUeControlNotifier,
    UpTransportLayerInfo,
};
use gnbproc_gnb::mac::{
    MacCtrlNotifier, MacDlConfigurer, MacUeCreateRequest, MacUeCreateResponse, MacUeDeleteRequest,
    MacUeDeleteResponse, MacUeReconfigurationRequest, MacUeReconfigurationResponse, MacUlConfigurer,
};

/// CU-UP side tunnel address used by [`MockE1ap`].
pub const MOCK_CU_UP_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1));

/// DU side tunnel address used by [`MockF1ap`].
pub const MOCK_DU_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 20, 1));

/// Ordered record of calls shared between mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries starting with `prefix`, in call order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries().into_iter().filter(|e| e.starts_with(prefix)).collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Switchable accept/reject outcome.
#[derive(Debug)]
pub struct Outcome(AtomicBool);

impl Default for Outcome {
    fn default() -> Self {
        Self(AtomicBool::new(true))
    }
}

impl Outcome {
    pub fn set(&self, accept: bool) {
        self.0.store(accept, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MAC
// ============================================================================

/// UL or DL MAC unit recording `"<name> <op> <ueId>"` for every call.
///
/// Tracks how many calls per UE were in flight at once.
#[derive(Debug)]
pub struct MockMacUnit {
    name: &'static str,
    log: CallLog,
    latency: Duration,
    pub outcome: Outcome,
    in_flight: Mutex<HashMap<DuUeIndex, usize>>,
    max_in_flight: Mutex<HashMap<DuUeIndex, usize>>,
}

impl MockMacUnit {
    pub fn new(name: &'static str, log: CallLog) -> Self {
        Self::with_latency(name, log, Duration::ZERO)
    }

    pub fn with_latency(name: &'static str, log: CallLog, latency: Duration) -> Self {
        Self {
            name,
            log,
            latency,
            outcome: Outcome::default(),
            in_flight: Mutex::new(HashMap::new()),
            max_in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Highest number of calls for `ue_index` that overlapped in time.
    pub fn max_in_flight(&self, ue_index: DuUeIndex) -> usize {
        self.max_in_flight.lock().unwrap().get(&ue_index).copied().unwrap_or(0)
    }

    async fn call(&self, op: &str, ue_index: DuUeIndex) -> bool {
        self.log.push(format!("{} {} {}", self.name, op, ue_index));
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let n = in_flight.entry(ue_index).or_default();
            *n += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            let m = max.entry(ue_index).or_default();
            *m = (*m).max(*n);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        *self.in_flight.lock().unwrap().entry(ue_index).or_default() -= 1;
        self.outcome.get()
    }
}

#[async_trait]
impl MacUlConfigurer for MockMacUnit {
    async fn add_ue(&self, req: &MacUeCreateRequest) -> bool {
        self.call("add", req.ue_index).await
    }

    async fn reconfigure_ue(&self, req: &MacUeReconfigurationRequest) -> bool {
        self.call("reconfigure", req.ue_index).await
    }

    async fn remove_ue(&self, req: &MacUeDeleteRequest) -> bool {
        self.call("remove", req.ue_index).await
    }
}

#[async_trait]
impl MacDlConfigurer for MockMacUnit {
    async fn add_ue(&self, req: &MacUeCreateRequest) -> bool {
        self.call("add", req.ue_index).await
    }

    async fn reconfigure_ue(&self, req: &MacUeReconfigurationRequest) -> bool {
        self.call("reconfigure", req.ue_index).await
    }

    async fn remove_ue(&self, req: &MacUeDeleteRequest) -> bool {
        self.call("remove", req.ue_index).await
    }
}

/// MAC result sink recording `"notify <op> <ueId> <result>"`.
#[derive(Debug, Default)]
pub struct MockMacNotifier {
    log: CallLog,
    pub created: Mutex<Vec<MacUeCreateResponse>>,
    pub deleted: Mutex<Vec<MacUeDeleteResponse>>,
    pub reconfigured: Mutex<Vec<MacUeReconfigurationResponse>>,
}

impl MockMacNotifier {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn nof_responses(&self) -> usize {
        self.created.lock().unwrap().len()
            + self.deleted.lock().unwrap().len()
            + self.reconfigured.lock().unwrap().len()
    }
}

impl MacCtrlNotifier for MockMacNotifier {
    fn on_ue_create_request_complete(&self, resp: MacUeCreateResponse) {
        self.log.push(format!("notify create {} {}", resp.ue_index, resp.result));
        self.created.lock().unwrap().push(resp);
    }

    fn on_ue_delete_complete(&self, resp: MacUeDeleteResponse) {
        self.log.push(format!("notify delete {} {}", resp.ue_index, resp.result));
        self.deleted.lock().unwrap().push(resp);
    }

    fn on_ue_reconfiguration_complete(&self, resp: MacUeReconfigurationResponse) {
        self.log.push(format!("notify reconfigure {} {}", resp.ue_index, resp.result));
        self.reconfigured.lock().unwrap().push(resp);
    }
}

// ============================================================================
// CU-CP peers
// ============================================================================

/// CU-UP keeping every E1AP request it received.
#[derive(Debug, Default)]
pub struct MockE1ap {
    log: CallLog,
    pub setup_outcome: Outcome,
    pub modification_outcome: Outcome,
    pub setup_failed_sessions: Mutex<Vec<PduSessionId>>,
    pub setup_requests: Mutex<Vec<E1BearerContextSetupRequest>>,
    pub modification_requests: Mutex<Vec<E1BearerContextModificationRequest>>,
    next_teid: AtomicU32,
}

impl MockE1ap {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            next_teid: AtomicU32::new(0x1000),
            ..Default::default()
        }
    }

    fn tnl(&self) -> UpTransportLayerInfo {
        UpTransportLayerInfo::new(MOCK_CU_UP_ADDR, self.next_teid.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl E1apControlNotifier for MockE1ap {
    async fn on_bearer_context_setup_request(
        &self,
        msg: &E1BearerContextSetupRequest,
    ) -> E1BearerContextSetupResponse {
        self.log.push(format!("E1 bearer context setup {}", msg.ue_index));
        self.setup_requests.lock().unwrap().push(msg.clone());
        tokio::task::yield_now().await;
        if !self.setup_outcome.get() {
            return E1BearerContextSetupResponse::default();
        }

        let failed = self.setup_failed_sessions.lock().unwrap().clone();
        let mut resp = E1BearerContextSetupResponse {
            success: true,
            ..Default::default()
        };
        for session in &msg.pdu_sessions_to_setup {
            if failed.contains(&session.pdu_session_id) {
                resp.pdu_sessions_failed.push(session.pdu_session_id);
                continue;
            }
            resp.pdu_sessions_setup.push(E1PduSessionSetupItem {
                pdu_session_id: session.pdu_session_id,
                dl_ngu_up_tnl_info: self.tnl(),
                drbs_setup: session
                    .drbs_to_setup
                    .iter()
                    .map(|drb| E1DrbSetupItem {
                        drb_id: drb.drb_id,
                        ul_up_tnl_info: self.tnl(),
                    })
                    .collect(),
            });
        }
        resp
    }

    async fn on_bearer_context_modification_request(
        &self,
        msg: &E1BearerContextModificationRequest,
    ) -> E1BearerContextModificationResponse {
        self.log.push(format!("E1 bearer context modification {}", msg.ue_index));
        self.modification_requests.lock().unwrap().push(msg.clone());
        tokio::task::yield_now().await;
        if !self.modification_outcome.get() {
            return E1BearerContextModificationResponse::default();
        }
        E1BearerContextModificationResponse {
            success: true,
            pdu_sessions_modified: msg
                .pdu_sessions_to_modify
                .iter()
                .map(|s| s.pdu_session_id)
                .collect(),
            pdu_sessions_failed: vec![],
        }
    }
}

/// DU keeping every F1AP UE context modification it received.
#[derive(Debug, Default)]
pub struct MockF1ap {
    log: CallLog,
    pub outcome: Outcome,
    pub failed_drbs: Mutex<Vec<DrbId>>,
    pub requests: Mutex<Vec<F1UeContextModificationRequest>>,
}

/// Cell group container returned by [`MockF1ap`].
pub const MOCK_CELL_GROUP: &[u8] = b"mock-cell-group";

impl MockF1ap {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// DL F1-U endpoint the mock reports for `drb_id`.
    pub fn dl_tnl(drb_id: DrbId) -> UpTransportLayerInfo {
        UpTransportLayerInfo::new(MOCK_DU_ADDR, 0x2000 + drb_id.value() as u32)
    }
}

#[async_trait]
impl F1apUeContextNotifier for MockF1ap {
    async fn on_ue_context_modification_request(
        &self,
        msg: &F1UeContextModificationRequest,
    ) -> F1UeContextModificationResponse {
        self.log.push(format!("F1 UE context modification {}", msg.ue_index));
        self.requests.lock().unwrap().push(msg.clone());
        tokio::task::yield_now().await;
        if !self.outcome.get() {
            return F1UeContextModificationResponse::default();
        }

        let failed = self.failed_drbs.lock().unwrap().clone();
        let mut resp = F1UeContextModificationResponse {
            success: true,
            du_to_cu_rrc_container: Bytes::from_static(MOCK_CELL_GROUP),
            ..Default::default()
        };
        for drb in &msg.drbs_to_setup {
            if failed.contains(&drb.drb_id) {
                resp.drbs_failed.push(drb.drb_id);
            } else {
                resp.drbs_setup.push(F1DrbSetupItem {
                    drb_id: drb.drb_id,
                    dl_up_tnl_info: Self::dl_tnl(drb.drb_id),
                });
            }
        }
        resp
    }
}

/// RRC UE entity keeping every reconfiguration it was asked to send.
#[derive(Debug, Default)]
pub struct MockRrc {
    log: CallLog,
    pub outcome: Outcome,
    pub requests: Mutex<Vec<RrcReconfigurationRequest>>,
}

impl MockRrc {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }
}

#[async_trait]
impl RrcUeControlNotifier for MockRrc {
    async fn on_rrc_reconfiguration_request(&self, msg: &RrcReconfigurationRequest) -> bool {
        self.log.push(format!("RRC reconfiguration {}", msg.ue_index));
        self.requests.lock().unwrap().push(msg.clone());
        tokio::task::yield_now().await;
        self.outcome.get()
    }
}

/// NGAP sink keeping every response.
#[derive(Debug, Default)]
pub struct MockNgap {
    log: CallLog,
    pub responses: Mutex<Vec<PduSessionResourceSetupResponse>>,
}

impl MockNgap {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn responses(&self) -> Vec<PduSessionResourceSetupResponse> {
        self.responses.lock().unwrap().clone()
    }
}

impl NgapResponseNotifier for MockNgap {
    fn on_pdu_session_resource_setup_response(&self, resp: PduSessionResourceSetupResponse) {
        self.log.push(format!("NGAP response {}", resp.ue_index));
        self.responses.lock().unwrap().push(resp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_log_matching() {
        let log = CallLog::new();
        log.push("UL add ueId=1");
        log.push("DL add ueId=1");
        log.push("UL remove ueId=1");
        assert_eq!(log.matching("UL"), vec!["UL add ueId=1", "UL remove ueId=1"]);
        log.clear();
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_mock_mac_unit_tracks_overlap() {
        let log = CallLog::new();
        let latency = Duration::from_millis(10);
        let unit = Arc::new(MockMacUnit::with_latency("UL", log.clone(), latency));
        let req = MacUeDeleteRequest {
            ue_index: DuUeIndex(1),
            rnti: gnbproc_common::Rnti(0x4601),
            cell_index: gnbproc_common::DuCellIndex(0),
        };
        let (a, b) = tokio::join!(
            MacUlConfigurer::remove_ue(unit.as_ref(), &req),
            MacUlConfigurer::remove_ue(unit.as_ref(), &req)
        );
        assert!(a && b);
        assert_eq!(unit.max_in_flight(DuUeIndex(1)), 2);
        assert_eq!(log.entries().len(), 2);
    }
}

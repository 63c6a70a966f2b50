//! MAC UE procedure integration tests
//!
//! Drives the MAC control component against recording UL/DL units and checks
//! the order of MAC calls and notifications.

use std::sync::Arc;
use std::time::Duration;

use gnbproc_common::{DuCellIndex, DuUeIndex, Lcid, Rnti};
use gnbproc_gnb::mac::{
    MacController, MacCtrlConfig, MacLogicalChannelConfig, MacUeCreateRequest, MacUeDeleteRequest,
    MacUeReconfigurationRequest, MacUeState,
};
use integration_tests::{
    init_test_logging, wait_for_condition, CallLog, MockMacNotifier, MockMacUnit,
    DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT,
};

struct Harness {
    log: CallLog,
    ul: Arc<MockMacUnit>,
    dl: Arc<MockMacUnit>,
    notifier: Arc<MockMacNotifier>,
    mac: MacController,
}

fn harness(latency: Duration) -> Harness {
    init_test_logging();
    let log = CallLog::new();
    let ul = Arc::new(MockMacUnit::with_latency("UL", log.clone(), latency));
    let dl = Arc::new(MockMacUnit::with_latency("DL", log.clone(), latency));
    let notifier = Arc::new(MockMacNotifier::new(log.clone()));
    let cfg = MacCtrlConfig {
        max_nof_ues: 16,
        ctrl_loop_capacity: 16,
    };
    let mac = MacController::new(cfg, ul.clone(), dl.clone(), notifier.clone());
    Harness {
        log,
        ul,
        dl,
        notifier,
        mac,
    }
}

fn create(idx: u16, rnti: u16) -> MacUeCreateRequest {
    MacUeCreateRequest {
        ue_index: DuUeIndex(idx),
        crnti: Rnti(rnti),
        cell_index: DuCellIndex(0),
        bearers: vec![MacLogicalChannelConfig::new(Lcid(1), 1)],
    }
}

fn delete(idx: u16, rnti: u16) -> MacUeDeleteRequest {
    MacUeDeleteRequest {
        ue_index: DuUeIndex(idx),
        rnti: Rnti(rnti),
        cell_index: DuCellIndex(0),
    }
}

fn reconfigure(
    idx: u16,
    rnti: u16,
    addmod: Vec<MacLogicalChannelConfig>,
    rem: Vec<Lcid>,
) -> MacUeReconfigurationRequest {
    MacUeReconfigurationRequest {
        ue_index: DuUeIndex(idx),
        crnti: Rnti(rnti),
        pcell_index: DuCellIndex(0),
        bearers_to_addmod: addmod,
        bearers_to_rem: rem,
    }
}

async fn wait_for_responses(h: &Harness, n: usize) {
    let notifier = h.notifier.clone();
    wait_for_condition(
        move || {
            let notifier = notifier.clone();
            async move { notifier.nof_responses() >= n }
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .expect("MAC responses");
}

/// Test the full create, reconfigure, delete cycle of one UE
#[tokio::test]
async fn test_ue_lifecycle_call_order() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_create_request(create(1, 0x4601));
    h.mac.handle_ue_reconfiguration_request(reconfigure(
        1,
        0x4601,
        vec![MacLogicalChannelConfig::new(Lcid(4), 8)],
        vec![],
    ));
    h.mac.handle_ue_delete_request(delete(1, 0x4601));
    wait_for_responses(&h, 3).await;

    let entries = h.log.entries();
    // UL and DL add run concurrently, so only their set is fixed.
    let mut adds = entries[..2].to_vec();
    adds.sort();
    assert_eq!(adds, vec!["DL add ueId=1", "UL add ueId=1"]);
    assert_eq!(
        entries[2..].to_vec(),
        vec![
            "notify create ueId=1 true",
            "UL reconfigure ueId=1",
            "DL reconfigure ueId=1",
            "notify reconfigure ueId=1 true",
            "DL remove ueId=1",
            "UL remove ueId=1",
            "notify delete ueId=1 true",
        ]
    );

    h.mac.stop().await;
    assert_eq!(h.mac.nof_ues(), 0);
    assert!(h.mac.find_by_rnti(Rnti(0x4601)).is_none());
}

/// Test logical channels follow reconfigurations
#[tokio::test]
async fn test_reconfiguration_updates_logical_channels() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_create_request(create(2, 0x4602));
    h.mac.handle_ue_reconfiguration_request(reconfigure(
        2,
        0x4602,
        vec![MacLogicalChannelConfig::new(Lcid(4), 8), MacLogicalChannelConfig::new(Lcid(5), 9)],
        vec![],
    ));
    h.mac.handle_ue_reconfiguration_request(reconfigure(2, 0x4602, vec![], vec![Lcid(4)]));
    wait_for_responses(&h, 3).await;

    let ue = h.mac.find_ue(DuUeIndex(2)).expect("UE exists");
    assert_eq!(ue.state, MacUeState::Active);
    assert_eq!(ue.logical_channels.keys().copied().collect::<Vec<_>>(), vec![Lcid(1), Lcid(5)]);
}

/// Test a C-RNTI change moves the reverse lookup
#[tokio::test]
async fn test_reconfiguration_changes_crnti() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_create_request(create(3, 0x4603));
    h.mac.handle_ue_reconfiguration_request(reconfigure(3, 0x4703, vec![], vec![]));
    wait_for_responses(&h, 2).await;

    assert!(h.notifier.reconfigured.lock().unwrap()[0].result);
    assert!(h.mac.find_by_rnti(Rnti(0x4603)).is_none());
    assert_eq!(h.mac.find_by_rnti(Rnti(0x4703)).map(|ue| ue.du_ue_index), Some(DuUeIndex(3)));
}

/// Test a UL rejection skips the DL leg of a reconfiguration
#[tokio::test]
async fn test_reconfiguration_rejected_by_ul() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_create_request(create(4, 0x4604));
    wait_for_responses(&h, 1).await;
    h.log.clear();

    h.ul.outcome.set(false);
    h.mac.handle_ue_reconfiguration_request(reconfigure(
        4,
        0x4604,
        vec![MacLogicalChannelConfig::new(Lcid(4), 8)],
        vec![],
    ));
    wait_for_responses(&h, 2).await;

    assert_eq!(h.log.entries(), vec!["UL reconfigure ueId=4", "notify reconfigure ueId=4 false"]);
    let ue = h.mac.find_ue(DuUeIndex(4)).expect("UE exists");
    assert!(!ue.logical_channels.contains_key(&Lcid(4)));
}

/// Test a duplicate C-RNTI is refused before any MAC call
#[tokio::test]
async fn test_duplicate_crnti_refused() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_create_request(create(5, 0x4605));
    h.mac.handle_ue_create_request(create(6, 0x4605));
    wait_for_responses(&h, 2).await;

    let created = h.notifier.created.lock().unwrap().clone();
    let refused = created.iter().find(|r| r.ue_index == DuUeIndex(6)).expect("response for ueId=6");
    assert!(!refused.result);
    assert!(h.log.matching("UL add ueId=6").is_empty());
    assert_eq!(h.mac.nof_ues(), 1);
}

/// Test a failed creation leaves the UE for an explicit delete
#[tokio::test]
async fn test_failed_creation_then_delete() {
    let h = harness(Duration::ZERO);
    h.dl.outcome.set(false);
    h.mac.handle_ue_create_request(create(7, 0x4607));
    wait_for_responses(&h, 1).await;

    assert!(!h.notifier.created.lock().unwrap()[0].result);
    assert_eq!(h.mac.find_ue(DuUeIndex(7)).map(|ue| ue.state), Some(MacUeState::CreationFailed));

    h.dl.outcome.set(true);
    h.mac.handle_ue_delete_request(delete(7, 0x4607));
    wait_for_responses(&h, 2).await;
    h.mac.stop().await;
    assert_eq!(h.mac.nof_ues(), 0);
}

/// Test a delete with the wrong C-RNTI leaves the UE alone
#[tokio::test]
async fn test_delete_with_wrong_crnti() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_create_request(create(8, 0x4608));
    h.mac.handle_ue_delete_request(delete(8, 0x4999));
    wait_for_responses(&h, 2).await;

    assert!(!h.notifier.deleted.lock().unwrap()[0].result);
    assert!(h.log.matching("DL remove").is_empty());
    assert_eq!(h.mac.find_ue(DuUeIndex(8)).map(|ue| ue.state), Some(MacUeState::Active));
}

/// Test a request for a UE index that was never created
#[tokio::test]
async fn test_requests_for_unknown_ue() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_delete_request(delete(9, 0x4609));
    h.mac.handle_ue_reconfiguration_request(reconfigure(9, 0x4609, vec![], vec![]));

    // Both are answered synchronously.
    assert_eq!(h.notifier.nof_responses(), 2);
    assert!(!h.notifier.deleted.lock().unwrap()[0].result);
    assert!(!h.notifier.reconfigured.lock().unwrap()[0].result);
    assert!(h.log.matching("UL").is_empty());
}

/// Test distinct C-RNTIs that agree in their low bits are both admitted
#[tokio::test]
async fn test_distinct_crntis_sharing_low_bits() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_create_request(create(0, 0x4601));
    h.mac.handle_ue_create_request(create(1, 0x4611));
    wait_for_responses(&h, 2).await;

    let created = h.notifier.created.lock().unwrap().clone();
    assert!(created.iter().all(|r| r.result), "{:?}", created);
    assert_eq!(h.mac.nof_ues(), 2);
    assert_eq!(h.mac.find_by_rnti(Rnti(0x4601)).map(|ue| ue.du_ue_index), Some(DuUeIndex(0)));
    assert_eq!(h.mac.find_by_rnti(Rnti(0x4611)).map(|ue| ue.du_ue_index), Some(DuUeIndex(1)));
}

/// Test a C-RNTI held by another UE fails the reconfiguration before any MAC call
#[tokio::test]
async fn test_reconfiguration_to_taken_crnti() {
    let h = harness(Duration::ZERO);
    h.mac.handle_ue_create_request(create(10, 0x4610));
    h.mac.handle_ue_create_request(create(11, 0x4612));
    wait_for_responses(&h, 2).await;
    h.log.clear();

    h.mac.handle_ue_reconfiguration_request(reconfigure(
        10,
        0x4612,
        vec![MacLogicalChannelConfig::new(Lcid(4), 8)],
        vec![],
    ));
    wait_for_responses(&h, 3).await;

    assert_eq!(h.log.entries(), vec!["notify reconfigure ueId=10 false"]);
    let ue = h.mac.find_ue(DuUeIndex(10)).expect("UE exists");
    assert_eq!(ue.rnti, Rnti(0x4610));
    assert!(!ue.logical_channels.contains_key(&Lcid(4)));
    assert_eq!(h.mac.find_by_rnti(Rnti(0x4612)).map(|ue| ue.du_ue_index), Some(DuUeIndex(11)));
}

//! PDU Session Resource Setup integration tests
//!
//! Runs the CU-CP routine against recording E1AP, F1AP and RRC peers and
//! checks stage order, the content each peer receives, and failure handling.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use gnbproc_common::{CuCpUeIndex, DrbConfig, DrbId, FiveQi, PduSessionId, QosFlowId, Rnti, SNssai};
use gnbproc_gnb::cu_cp::{
    DrbManager, DuProcessor, DuProcessorConfig, DuProcessorRoutineManager,
    PduSessionResourceSetupItem, PduSessionResourceSetupRequest, PduSessionResourceSetupResponse,
    PduSessionSetupFailureCause, PduSessionType, QosFlowSetupRequestItem, RrcUeDrbManager,
    SecurityConfig, UpTransportLayerInfo,
};
use integration_tests::mocks::{MOCK_CELL_GROUP, MOCK_CU_UP_ADDR};
use integration_tests::{
    init_test_logging, wait_for_condition, CallLog, MockE1ap, MockF1ap, MockNgap, MockRrc,
    DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT,
};

fn qos_flow(qfi: u8, five_qi: u16) -> QosFlowSetupRequestItem {
    QosFlowSetupRequestItem {
        qos_flow_id: QosFlowId(qfi),
        five_qi: FiveQi(five_qi),
        priority_level: 1,
    }
}

fn session(psi: u8, flows: Vec<QosFlowSetupRequestItem>) -> PduSessionResourceSetupItem {
    PduSessionResourceSetupItem {
        pdu_session_id: PduSessionId(psi),
        pdu_session_nas_pdu: Bytes::from(format!("nas-{psi}")),
        s_nssai: SNssai::with_sd(1, 0x010203),
        pdu_session_type: PduSessionType::Ipv4,
        ul_ngu_up_tnl_info: UpTransportLayerInfo::new(
            IpAddr::V4(Ipv4Addr::new(10, 45, 0, 1)),
            0x100 + psi as u32,
        ),
        qos_flow_setup_request_items: flows,
    }
}

fn request(ue: u16, sessions: Vec<PduSessionResourceSetupItem>) -> PduSessionResourceSetupRequest {
    PduSessionResourceSetupRequest {
        ue_index: CuCpUeIndex(ue),
        pdu_session_res_setup_items: sessions,
        ue_aggregate_maximum_bit_rate_dl: 500_000_000,
    }
}

struct Harness {
    log: CallLog,
    e1ap: Arc<MockE1ap>,
    f1ap: Arc<MockF1ap>,
    rrc: Arc<MockRrc>,
    drb_mng: Arc<DrbManager>,
    routine_mng: DuProcessorRoutineManager,
}

impl Harness {
    fn new() -> Self {
        init_test_logging();
        let log = CallLog::new();
        let e1ap = Arc::new(MockE1ap::new(log.clone()));
        let f1ap = Arc::new(MockF1ap::new(log.clone()));
        Self {
            rrc: Arc::new(MockRrc::new(log.clone())),
            drb_mng: Arc::new(DrbManager::new(&DrbConfig::default())),
            routine_mng: DuProcessorRoutineManager::new(e1ap.clone(), f1ap.clone()),
            log,
            e1ap,
            f1ap,
        }
    }

    async fn run(&self, msg: PduSessionResourceSetupRequest) -> PduSessionResourceSetupResponse {
        self.routine_mng
            .start_pdu_session_resource_setup_routine(
                msg,
                SecurityConfig::default(),
                self.rrc.clone(),
                self.drb_mng.clone(),
            )
            .await
    }
}

fn causes(resp: &PduSessionResourceSetupResponse) -> Vec<(u8, PduSessionSetupFailureCause)> {
    resp.pdu_session_res_failed_to_setup_items
        .iter()
        .map(|f| (f.pdu_session_id.value(), f.cause))
        .collect()
}

/// Test the stages run in order and each peer sees what the previous one returned
#[tokio::test]
async fn test_stage_order_and_message_content() {
    let h = Harness::new();
    let resp = h
        .run(request(0, vec![session(1, vec![qos_flow(1, 9), qos_flow(2, 9), qos_flow(3, 5)])]))
        .await;

    assert!(resp.is_successful());
    assert_eq!(
        h.log.entries(),
        vec![
            "E1 bearer context setup cuUeId=0",
            "F1 UE context modification cuUeId=0",
            "E1 bearer context modification cuUeId=0",
            "RRC reconfiguration cuUeId=0",
        ]
    );

    // Two 5QIs give two DRBs; flows sharing a 5QI share a DRB.
    let setup = h.e1ap.setup_requests.lock().unwrap()[0].clone();
    assert_eq!(setup.ue_dl_aggregate_maximum_bit_rate, 500_000_000);
    let drbs = &setup.pdu_sessions_to_setup[0].drbs_to_setup;
    assert_eq!(drbs.len(), 2);
    assert_eq!(drbs[0].drb_id, DrbId(1));
    assert_eq!(drbs[0].qos_flows, vec![QosFlowId(1), QosFlowId(2)]);
    assert_eq!(drbs[1].qos_flows, vec![QosFlowId(3)]);

    // The DU gets the CU-UP UL endpoints.
    let f1 = h.f1ap.requests.lock().unwrap()[0].clone();
    assert!(f1
        .drbs_to_setup
        .iter()
        .all(|d| d.ul_up_tnl_info.transport_layer_address == MOCK_CU_UP_ADDR));

    // The CU-UP gets the DU DL endpoints.
    let modification = h.e1ap.modification_requests.lock().unwrap()[0].clone();
    let modified = &modification.pdu_sessions_to_modify[0].drbs_to_modify;
    assert_eq!(modified.len(), 2);
    for drb in modified {
        assert_eq!(drb.dl_up_tnl_info, MockF1ap::dl_tnl(drb.drb_id));
    }

    // The UE gets the DU cell group, the NAS PDU and one entry per DRB.
    let rrc = h.rrc.requests.lock().unwrap()[0].clone();
    assert_eq!(rrc.master_cell_group, Bytes::from_static(MOCK_CELL_GROUP));
    assert_eq!(rrc.dedicated_nas_messages, vec![Bytes::from("nas-1")]);
    assert_eq!(rrc.drbs_to_add_mod.len(), 2);

    let item = &resp.pdu_session_res_setup_response_items[0];
    assert_eq!(item.drbs, vec![DrbId(1), DrbId(2)]);
    assert_eq!(item.dl_ngu_up_tnl_info.transport_layer_address, MOCK_CU_UP_ADDR);
}

/// Test each stage outcome combination ends at the right stage with the right cause
#[tokio::test]
async fn test_stage_outcome_matrix() {
    use PduSessionSetupFailureCause::*;

    // (E1 setup, F1 modification, E1 modification, RRC) -> expected
    let cases: [([bool; 4], usize, Option<PduSessionSetupFailureCause>); 5] = [
        ([false, true, true, true], 1, Some(BearerContextSetupFailure)),
        ([true, false, true, true], 2, Some(UeContextModificationFailure)),
        ([true, true, false, true], 3, Some(BearerContextModificationFailure)),
        ([true, true, true, false], 4, Some(RrcReconfigurationFailure)),
        ([true, true, true, true], 4, None),
    ];

    for (outcomes, nof_calls, cause) in cases {
        let h = Harness::new();
        h.e1ap.setup_outcome.set(outcomes[0]);
        h.f1ap.outcome.set(outcomes[1]);
        h.e1ap.modification_outcome.set(outcomes[2]);
        h.rrc.outcome.set(outcomes[3]);

        let resp = h.run(request(0, vec![session(1, vec![qos_flow(1, 9)])])).await;

        assert_eq!(h.log.entries().len(), nof_calls, "outcomes {outcomes:?}");
        match cause {
            Some(cause) => {
                assert!(!resp.is_successful());
                assert!(resp.pdu_session_res_setup_response_items.is_empty());
                assert_eq!(causes(&resp), vec![(1, cause)], "outcomes {outcomes:?}");
            }
            None => assert!(resp.is_successful()),
        }
    }
}

/// Test an empty request is answered without contacting any peer
#[test]
fn test_empty_request() {
    let h = Harness::new();
    let resp = h
        .routine_mng
        .start_pdu_session_resource_setup_routine(
            request(3, vec![]),
            SecurityConfig::default(),
            h.rrc.clone(),
            h.drb_mng.clone(),
        )
        .now_or_never()
        .expect("empty request must complete on first poll");

    assert_eq!(resp.ue_index, CuCpUeIndex(3));
    assert!(!resp.is_successful());
    assert!(resp.pdu_session_res_setup_response_items.is_empty());
    assert!(resp.pdu_session_res_failed_to_setup_items.is_empty());
    assert!(h.log.entries().is_empty());
}

/// Test a session rejected by the CU-UP is not sent to the DU or the UE
#[tokio::test]
async fn test_partial_failure_excludes_session_from_later_stages() {
    let h = Harness::new();
    h.e1ap.setup_failed_sessions.lock().unwrap().push(PduSessionId(2));

    let resp = h
        .run(request(
            0,
            vec![session(1, vec![qos_flow(1, 9)]), session(2, vec![qos_flow(2, 7)])],
        ))
        .await;

    assert_eq!(causes(&resp), vec![(2, PduSessionSetupFailureCause::BearerContextSetupFailure)]);
    assert_eq!(resp.pdu_session_res_setup_response_items.len(), 1);

    let f1 = h.f1ap.requests.lock().unwrap()[0].clone();
    assert_eq!(f1.drbs_to_setup.iter().map(|d| d.drb_id).collect::<Vec<_>>(), vec![DrbId(1)]);
    let rrc = h.rrc.requests.lock().unwrap()[0].clone();
    assert_eq!(rrc.dedicated_nas_messages, vec![Bytes::from("nas-1")]);
}

/// Test DRBs of a failed session are freed for the next request
#[tokio::test]
async fn test_failed_session_releases_its_drbs() {
    let mut h = Harness::new();
    h.drb_mng = Arc::new(DrbManager::new(&DrbConfig { max_nof_drbs_per_ue: 1 }));
    h.e1ap.setup_outcome.set(false);

    let resp = h.run(request(0, vec![session(1, vec![qos_flow(1, 9)])])).await;
    assert_eq!(causes(&resp), vec![(1, PduSessionSetupFailureCause::BearerContextSetupFailure)]);
    assert_eq!(h.drb_mng.nof_drbs(), 0);

    h.e1ap.setup_outcome.set(true);
    let resp = h.run(request(0, vec![session(2, vec![qos_flow(2, 9)])])).await;
    assert!(resp.is_successful());
    assert_eq!(resp.pdu_session_res_setup_response_items[0].drbs, vec![DrbId(1)]);
    assert_eq!(h.drb_mng.nof_drbs(), 1);
}

/// Test a DRB rejected by the DU fails its session only
#[tokio::test]
async fn test_failed_drb_fails_its_session() {
    let h = Harness::new();
    h.f1ap.failed_drbs.lock().unwrap().push(DrbId(1));

    let resp = h
        .run(request(
            0,
            vec![session(1, vec![qos_flow(1, 9)]), session(2, vec![qos_flow(2, 7)])],
        ))
        .await;

    assert_eq!(causes(&resp), vec![(1, PduSessionSetupFailureCause::UeContextModificationFailure)]);
    assert_eq!(h.drb_mng.get_drbs_of_session(PduSessionId(1)), vec![]);
    assert_eq!(h.drb_mng.get_drbs_of_session(PduSessionId(2)), vec![DrbId(2)]);
    let modification = h.e1ap.modification_requests.lock().unwrap()[0].clone();
    assert_eq!(modification.pdu_sessions_to_modify.len(), 1);
    assert_eq!(modification.pdu_sessions_to_modify[0].pdu_session_id, PduSessionId(2));
}

/// Test a whole batch of sessions is accounted for exactly once
#[tokio::test]
async fn test_every_session_in_exactly_one_list() {
    let h = Harness::new();
    h.e1ap.setup_failed_sessions.lock().unwrap().push(PduSessionId(3));

    let sessions = vec![
        session(1, vec![qos_flow(1, 9)]),
        session(2, vec![qos_flow(2, 9)]),
        session(2, vec![qos_flow(3, 9)]),
        session(3, vec![qos_flow(4, 9)]),
        session(4, vec![qos_flow(5, 9)]),
    ];
    let resp = h.run(request(0, sessions)).await;

    let mut setup: Vec<_> = resp
        .pdu_session_res_setup_response_items
        .iter()
        .map(|s| s.pdu_session_id.value())
        .collect();
    setup.sort();
    assert_eq!(setup, vec![1, 4]);
    assert_eq!(
        causes(&resp),
        vec![
            (2, PduSessionSetupFailureCause::MultiplePduSessionIdInstances),
            (3, PduSessionSetupFailureCause::BearerContextSetupFailure),
        ]
    );
}

/// Test requests for different UEs are handled independently through the DU processor
#[tokio::test]
async fn test_du_processor_serves_several_ues() {
    let h = Harness::new();
    let ngap = Arc::new(MockNgap::new(h.log.clone()));
    let du_proc = DuProcessor::new(
        DuProcessorConfig::default(),
        h.e1ap.clone(),
        h.f1ap.clone(),
        ngap.clone(),
    );

    for i in 0..3u16 {
        assert!(du_proc.create_ue(CuCpUeIndex(i), Rnti(0x4601 + i), h.rrc.clone()));
    }
    for i in 0..3u16 {
        let msg = request(i, vec![session(1, vec![qos_flow(1, 9)])]);
        du_proc.handle_pdu_session_resource_setup_request(msg);
    }

    wait_for_condition(
        || {
            let ngap = ngap.clone();
            async move { ngap.responses().len() == 3 }
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .expect("all responses");

    assert!(ngap.responses().iter().all(|r| r.is_successful()));
    for i in 0..3u16 {
        let ue = du_proc.find_ue(CuCpUeIndex(i)).expect("UE exists");
        assert!(ue.pdu_sessions.contains_key(&PduSessionId(1)));
        // DRB ids are allocated per UE.
        assert_eq!(ue.pdu_sessions[&PduSessionId(1)].drbs, vec![DrbId(1)]);
    }

    for i in 0..3u16 {
        assert!(du_proc.remove_ue(CuCpUeIndex(i)));
    }
    du_proc.stop().await;
    assert_eq!(du_proc.nof_ues(), 0);
}

/// Test a request for an unknown UE is rejected through the NGAP sink
#[tokio::test]
async fn test_du_processor_unknown_ue() {
    let h = Harness::new();
    let ngap = Arc::new(MockNgap::new(h.log.clone()));
    let du_proc = DuProcessor::new(
        DuProcessorConfig::default(),
        h.e1ap.clone(),
        h.f1ap.clone(),
        ngap.clone(),
    );

    du_proc.handle_pdu_session_resource_setup_request(request(
        5,
        vec![session(1, vec![qos_flow(1, 9)]), session(2, vec![qos_flow(2, 9)])],
    ));

    let responses = ngap.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(
        causes(&responses[0]),
        vec![
            (1, PduSessionSetupFailureCause::UnknownUe),
            (2, PduSessionSetupFailureCause::UnknownUe),
        ]
    );
    assert_eq!(h.log.entries(), vec!["NGAP response cuUeId=5"]);
}

//! Loopback scenario
//!
//! Wires the MAC control component, the DU manager and a CU-CP DU processor to
//! loopback peers and walks a batch of UEs through their lifecycle. UEs run
//! concurrently; each UE's own steps are strictly ordered by its control loops.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use gnbproc_common::{
    CuCpUeIndex, DuCellIndex, DuUeIndex, FiveQi, GnbProcConfig, Lcid, PduSessionId, QosFlowId, Rnti,
    SNssai,
};
use tracing::{info, warn};

use crate::cu_cp::{
    DuProcessor, DuProcessorConfig, PduSessionResourceSetupItem, PduSessionResourceSetupRequest,
    PduSessionType, QosFlowSetupRequestItem, UpTransportLayerInfo,
};
use crate::du_manager::{
    DuUeConfigRequest, DuUeCreationRequest, DuUeDeleteRequest, DuUeManager, DuUeManagerConfig,
    MacUeConfigAdapter,
};
use crate::loopback::{LoopbackE1ap, LoopbackF1ap, LoopbackMacUnit, LoopbackRrc, NgapResponseLog};
use crate::mac::{MacCtrlConfig, MacLogicalChannelConfig};

/// First C-RNTI handed out by the scenario.
const FIRST_CRNTI: u16 = 0x4601;

/// LCID of the data bearer added during reconfiguration.
const DRB1_LCID: Lcid = Lcid(4);

/// Upper bound on the wait for PDU session setup responses.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome counters of a scenario run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenarioReport {
    pub ues_created: usize,
    pub ues_configured: usize,
    pub sessions_established: usize,
    pub sessions_failed: usize,
    pub ues_deleted: usize,
}

/// All components of the procedure core on loopback peers.
pub struct LoopbackScenario {
    cfg: GnbProcConfig,
    mac: MacUeConfigAdapter,
    du: DuUeManager,
    du_proc: DuProcessor,
    rrc: Arc<LoopbackRrc>,
    ngap: Arc<NgapResponseLog>,
}

impl LoopbackScenario {
    /// Builds the components. Peers answer after `latency`.
    pub fn new(cfg: GnbProcConfig, latency: Duration) -> Self {
        let mac = MacUeConfigAdapter::new(
            MacCtrlConfig::from(&cfg),
            Arc::new(LoopbackMacUnit::with_latency(latency)),
            Arc::new(LoopbackMacUnit::with_latency(latency)),
        );
        let du = DuUeManager::new(DuUeManagerConfig::from(&cfg), Arc::new(mac.clone()));
        let ngap = Arc::new(NgapResponseLog::new());
        let du_proc = DuProcessor::new(
            DuProcessorConfig::from(&cfg),
            Arc::new(LoopbackE1ap::with_latency(latency)),
            Arc::new(LoopbackF1ap::with_latency(latency)),
            ngap.clone(),
        );
        Self {
            cfg,
            mac,
            du,
            du_proc,
            rrc: Arc::new(LoopbackRrc::with_latency(latency)),
            ngap,
        }
    }

    /// Runs create, reconfigure, PDU session setup and delete for `nof_ues`
    /// UEs, then stops every main loop.
    pub async fn run(&self, nof_ues: u16) -> ScenarioReport {
        let nof_ues = nof_ues.min(self.cfg.max_nof_ues);
        info!("{}: running loopback scenario with {} UEs", self.cfg.gnb_name, nof_ues);
        let mut report = ScenarioReport::default();

        let attached = join_all((0..nof_ues).map(|i| self.attach_ue(i))).await;
        report.ues_created = attached.iter().filter(|(created, _)| *created).count();
        report.ues_configured = attached.iter().filter(|(_, configured)| *configured).count();

        let mut nof_requests = 0;
        for (i, (created, _)) in attached.iter().enumerate() {
            if !created {
                continue;
            }
            let ue_index = CuCpUeIndex(i as u16);
            if self.du_proc.create_ue(ue_index, crnti(i as u16), self.rrc.clone()) {
                self.du_proc
                    .handle_pdu_session_resource_setup_request(pdu_session_request(ue_index));
                nof_requests += 1;
            }
        }
        if tokio::time::timeout(RESPONSE_TIMEOUT, self.ngap.wait_for_responses(nof_requests))
            .await
            .is_err()
        {
            warn!("{}: timed out waiting for PDU session setup responses", self.cfg.gnb_name);
        }
        for resp in self.ngap.responses() {
            report.sessions_established += resp.pdu_session_res_setup_response_items.len();
            report.sessions_failed += resp.pdu_session_res_failed_to_setup_items.len();
        }

        let deleted = join_all(
            attached
                .iter()
                .enumerate()
                .filter(|(_, (created, _))| *created)
                .map(|(i, _)| self.detach_ue(i as u16)),
        )
        .await;
        report.ues_deleted = deleted.into_iter().filter(|ok| *ok).count();

        self.du.stop().await;
        self.mac.mac().stop().await;
        self.du_proc.stop().await;
        info!("{}: loopback scenario finished: {:?}", self.cfg.gnb_name, report);
        report
    }

    /// Returns (created, configured).
    async fn attach_ue(&self, i: u16) -> (bool, bool) {
        let created = self
            .du
            .handle_ue_create_request(DuUeCreationRequest {
                ue_index: DuUeIndex(i),
                crnti: crnti(i),
                pcell_index: DuCellIndex((i % self.cfg.nof_cells.max(1) as u16) as u8),
            })
            .await;
        if !created {
            return (false, false);
        }

        let configured = self
            .du
            .handle_ue_config_request(DuUeConfigRequest {
                ue_index: DuUeIndex(i),
                bearers_to_addmod: vec![MacLogicalChannelConfig::new(DRB1_LCID, 8)],
                bearers_to_rem: vec![],
            })
            .await;
        (true, configured)
    }

    async fn detach_ue(&self, i: u16) -> bool {
        let deleted = self
            .du
            .handle_ue_delete_request(DuUeDeleteRequest { ue_index: DuUeIndex(i) })
            .await;
        self.du_proc.remove_ue(CuCpUeIndex(i));
        deleted
    }
}

fn crnti(i: u16) -> Rnti {
    Rnti(FIRST_CRNTI + i)
}

fn pdu_session_request(ue_index: CuCpUeIndex) -> PduSessionResourceSetupRequest {
    PduSessionResourceSetupRequest {
        ue_index,
        pdu_session_res_setup_items: vec![PduSessionResourceSetupItem {
            pdu_session_id: PduSessionId(1),
            pdu_session_nas_pdu: Bytes::from_static(b"pdu-session-establishment-accept"),
            s_nssai: SNssai::new(1),
            pdu_session_type: PduSessionType::Ipv4,
            ul_ngu_up_tnl_info: UpTransportLayerInfo::new(
                IpAddr::V4(Ipv4Addr::new(10, 100, 200, 1)),
                0x1000 + ue_index.value() as u32,
            ),
            qos_flow_setup_request_items: vec![QosFlowSetupRequestItem {
                qos_flow_id: QosFlowId(1),
                five_qi: FiveQi(9),
                priority_level: 1,
            }],
        }],
        ue_aggregate_maximum_bit_rate_dl: 1_000_000_000,
    }
}

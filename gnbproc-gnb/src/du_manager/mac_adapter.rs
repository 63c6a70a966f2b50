//! Request/response facade over the MAC control component
//!
//! The MAC reports procedure outcomes through [`MacCtrlNotifier`] callbacks.
//! [`MacUeConfigAdapter`] pairs each request with its callback through a
//! pending transaction per (UE, procedure kind), so DU manager procedures can
//! simply await the MAC response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use gnbproc_common::DuUeIndex;
use tokio::sync::oneshot;
use tracing::warn;

use crate::mac::{
    MacController, MacCtrlConfig, MacCtrlNotifier, MacDlConfigurer, MacUeCreateRequest,
    MacUeCreateResponse, MacUeDeleteRequest, MacUeDeleteResponse, MacUeReconfigurationRequest,
    MacUeReconfigurationResponse, MacUlConfigurer,
};

/// MAC UE management as seen from the DU manager.
#[async_trait]
pub trait MacUeConfigurator: Send + Sync {
    /// Creates a UE in MAC and waits for the outcome.
    async fn handle_ue_create_request(&self, msg: MacUeCreateRequest) -> MacUeCreateResponse;

    /// Reconfigures a UE in MAC and waits for the outcome.
    async fn handle_ue_reconfiguration_request(
        &self,
        msg: MacUeReconfigurationRequest,
    ) -> MacUeReconfigurationResponse;

    /// Deletes a UE from MAC and waits for the outcome.
    async fn handle_ue_delete_request(&self, msg: MacUeDeleteRequest) -> MacUeDeleteResponse;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MacTransactionKind {
    Create,
    Reconfiguration,
    Delete,
}

/// Outstanding MAC transactions, completed by the MAC notifier callbacks.
#[derive(Debug, Default)]
pub struct MacPendingTransactions {
    pending: Mutex<HashMap<(DuUeIndex, MacTransactionKind), oneshot::Sender<bool>>>,
}

impl MacPendingTransactions {
    fn start(&self, ue_index: DuUeIndex, kind: MacTransactionKind) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        if self.lock().insert((ue_index, kind), tx).is_some() {
            warn!("{}: MAC {:?} transaction superseded", ue_index, kind);
        }
        rx
    }

    fn complete(&self, ue_index: DuUeIndex, kind: MacTransactionKind, result: bool) {
        match self.lock().remove(&(ue_index, kind)) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => warn!("{}: unexpected MAC {:?} response", ue_index, kind),
        }
    }

    fn lock(
        &self,
    ) -> MutexGuard<'_, HashMap<(DuUeIndex, MacTransactionKind), oneshot::Sender<bool>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MacCtrlNotifier for MacPendingTransactions {
    fn on_ue_create_request_complete(&self, resp: MacUeCreateResponse) {
        self.complete(resp.ue_index, MacTransactionKind::Create, resp.result);
    }

    fn on_ue_delete_complete(&self, resp: MacUeDeleteResponse) {
        self.complete(resp.ue_index, MacTransactionKind::Delete, resp.result);
    }

    fn on_ue_reconfiguration_complete(&self, resp: MacUeReconfigurationResponse) {
        self.complete(resp.ue_index, MacTransactionKind::Reconfiguration, resp.result);
    }
}

/// [`MacUeConfigurator`] backed by a [`MacController`].
#[derive(Debug, Clone)]
pub struct MacUeConfigAdapter {
    mac: MacController,
    transactions: Arc<MacPendingTransactions>,
}

impl MacUeConfigAdapter {
    /// Creates the MAC control component with this adapter as its notifier.
    pub fn new(
        cfg: MacCtrlConfig,
        ul_unit: Arc<dyn MacUlConfigurer>,
        dl_unit: Arc<dyn MacDlConfigurer>,
    ) -> Self {
        let transactions = Arc::new(MacPendingTransactions::default());
        let mac = MacController::new(cfg, ul_unit, dl_unit, transactions.clone());
        Self { mac, transactions }
    }

    /// The wrapped MAC control component.
    pub fn mac(&self) -> &MacController {
        &self.mac
    }
}

#[async_trait]
impl MacUeConfigurator for MacUeConfigAdapter {
    async fn handle_ue_create_request(&self, msg: MacUeCreateRequest) -> MacUeCreateResponse {
        let (ue_index, cell_index) = (msg.ue_index, msg.cell_index);
        let rx = self.transactions.start(ue_index, MacTransactionKind::Create);
        self.mac.handle_ue_create_request(msg);
        MacUeCreateResponse {
            ue_index,
            cell_index,
            result: rx.await.unwrap_or(false),
        }
    }

    async fn handle_ue_reconfiguration_request(
        &self,
        msg: MacUeReconfigurationRequest,
    ) -> MacUeReconfigurationResponse {
        let ue_index = msg.ue_index;
        let rx = self.transactions.start(ue_index, MacTransactionKind::Reconfiguration);
        self.mac.handle_ue_reconfiguration_request(msg);
        MacUeReconfigurationResponse {
            ue_index,
            result: rx.await.unwrap_or(false),
        }
    }

    async fn handle_ue_delete_request(&self, msg: MacUeDeleteRequest) -> MacUeDeleteResponse {
        let ue_index = msg.ue_index;
        let rx = self.transactions.start(ue_index, MacTransactionKind::Delete);
        self.mac.handle_ue_delete_request(msg);
        MacUeDeleteResponse {
            ue_index,
            result: rx.await.unwrap_or(false),
        }
    }
}

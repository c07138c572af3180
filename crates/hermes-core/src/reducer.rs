use std::path::PathBuf;

use chrono::Utc;
use hermes_ipc::IpcEvent;

use crate::{
    AppStores, IncomingRequest, PeersState, ReceiveStatus, Transfer, TransferDirection,
    TransferStatus,
};

pub const PROVISIONAL_FILE_NAME: &str = "incoming-file";
pub const UNKNOWN_PEER: &str = "unknown";

/// Turns listener events into state transitions for one receive session.
///
/// The session pointers live here rather than on the transfer rows so that
/// every progress event of a session lands on the same transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveReducer {
    active_transfer_id: Option<String>,
    active_peer_id: Option<String>,
    /// The active transfer was synthesized from progress before any `transfer_start`.
    provisional: bool,
    output_dir: Option<PathBuf>,
}

impl ReceiveReducer {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self {
            output_dir,
            ..Self::default()
        }
    }

    pub fn active_transfer_id(&self) -> Option<&str> {
        self.active_transfer_id.as_deref()
    }

    pub fn active_peer_id(&self) -> Option<&str> {
        self.active_peer_id.as_deref()
    }

    pub fn apply(&mut self, stores: &AppStores, event: &IpcEvent) {
        match event {
            IpcEvent::Listening { port } => {
                let port = u16::try_from(*port).ok().filter(|port| *port > 0);
                stores.receive.update(|receive| {
                    receive.status = ReceiveStatus::Listening;
                    if port.is_some() {
                        receive.port = port;
                    }
                });
                tracing::info!(port = ?port, "receive listener ready");
            }
            IpcEvent::HandshakeComplete { peer } => {
                let resolved = resolve_peer(stores, peer);
                tracing::debug!(peer = %resolved, "receive handshake complete");
                self.active_peer_id = Some(resolved);
            }
            IpcEvent::IncomingRequest {
                id,
                peer,
                fingerprint,
                file,
                size,
            } => {
                let peer_id = resolve_peer(stores, peer);
                let peer_fingerprint = fingerprint
                    .clone()
                    .filter(|fingerprint| !fingerprint.is_empty())
                    .or_else(|| {
                        stores.peers.with(|peers| {
                            peers.find(&peer_id).map(|peer| peer.fingerprint.clone())
                        })
                    })
                    .unwrap_or_default();
                let request = IncomingRequest {
                    id: id
                        .clone()
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    peer_id,
                    peer_fingerprint,
                    file_name: file.clone(),
                    file_size: *size,
                    received_at: Utc::now(),
                };
                tracing::info!(request_id = %request.id, peer = %request.peer_id, file = %request.file_name, "incoming transfer request");
                stores.receive.update(|receive| receive.add_request(request));
                stores.sync_activity_selection();
            }
            IpcEvent::TransferStart { file, size, peer } => {
                let peer_id = if peer.is_empty() {
                    self.session_peer()
                } else {
                    resolve_peer(stores, peer)
                };
                let transfer_id = match self.slot(stores) {
                    ActiveSlot::Live { id, provisional: true } => {
                        stores.transfers.update(|transfers| {
                            transfers.update(&id, |transfer| {
                                transfer.file_name = file.clone();
                                transfer.peer_id = peer_id.clone();
                                transfer.status = TransferStatus::InProgress;
                                if *size > 0 {
                                    transfer.file_size = *size;
                                }
                            })
                        });
                        tracing::debug!(transfer_id = %id, "provisional receive transfer adopted");
                        id
                    }
                    slot => {
                        if let ActiveSlot::Live { id, .. } = slot {
                            stores.transfers.update(|transfers| transfers.cancel(&id));
                            tracing::info!(transfer_id = %id, "receive transfer superseded by a new start");
                        }
                        let transfer = Transfer::new(
                            TransferDirection::Receive,
                            peer_id.as_str(),
                            file.as_str(),
                            *size,
                        )
                        .with_status(TransferStatus::InProgress);
                        let transfer_id = transfer.id.clone();
                        stores.transfers.update(|transfers| transfers.add(transfer));
                        transfer_id
                    }
                };
                tracing::info!(transfer_id = %transfer_id, peer = %peer_id, file = %file, size, "receive transfer started");
                self.active_transfer_id = Some(transfer_id);
                self.provisional = false;
                self.active_peer_id = Some(peer_id);
                stores
                    .receive
                    .update(|receive| receive.status = ReceiveStatus::Receiving);
                stores.sync_activity_selection();
            }
            IpcEvent::Progress { bytes, percent } => {
                let Some(transfer_id) = self.ensure_active_transfer(stores) else {
                    tracing::debug!("progress for a transfer that is no longer active ignored");
                    return;
                };
                let progress = clamp_percent(*percent);
                let estimated = estimate_size(*bytes, *percent);
                stores.transfers.update(|transfers| {
                    transfers.update(&transfer_id, |transfer| {
                        transfer.progress = progress;
                        transfer.status = TransferStatus::InProgress;
                        if let Some(size) = estimated {
                            transfer.file_size = size;
                        }
                    });
                });
            }
            IpcEvent::TransferComplete { file, hash } => {
                let Some(transfer_id) = self.ensure_active_transfer(stores) else {
                    tracing::debug!("completion for a transfer that is no longer active ignored");
                    self.return_to_listening(stores);
                    return;
                };
                let default_dir = self.output_dir.clone().unwrap_or_else(|| {
                    stores.receive.with(|receive| receive.default_save_path.clone())
                });
                stores.transfers.update(|transfers| {
                    transfers.update(&transfer_id, |transfer| {
                        if !file.is_empty() {
                            transfer.file_name = file.clone();
                        }
                        if transfer.file_path.is_none() {
                            transfer.file_path = Some(
                                default_dir
                                    .join(&transfer.file_name)
                                    .to_string_lossy()
                                    .to_string(),
                            );
                        }
                    });
                    transfers.complete(&transfer_id, hash.as_str());
                });
                tracing::info!(transfer_id = %transfer_id, hash = %hash, "receive transfer completed");
                self.return_to_listening(stores);
            }
            IpcEvent::Error { code, message } => {
                let message = message
                    .clone()
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| "Unknown error".to_owned());
                tracing::warn!(code = ?code, message = %message, "receive listener reported error");
                if let ActiveSlot::Live { id, .. } = self.slot(stores) {
                    stores
                        .transfers
                        .update(|transfers| transfers.fail(&id, message.as_str()));
                }
                self.clear();
                stores.receive.update(|receive| {
                    receive.status = ReceiveStatus::Listening;
                    receive.error = Some(message);
                });
                stores.sync_activity_selection();
            }
            _ => {}
        }
    }

    /// Ends the session: any transfer still running is cancelled and the
    /// listener status drops to idle.
    pub fn finish(&mut self, stores: &AppStores, error: Option<String>) {
        self.cancel_active(stores);
        stores.receive.update(|receive| receive.stop_listening(error));
        stores.sync_activity_selection();
    }

    /// Cancels the transfer owned by this session, if any, and clears the pointers.
    pub fn cancel_active(&mut self, stores: &AppStores) -> Option<String> {
        let transfer_id = self.active_transfer_id.take();
        if let Some(transfer_id) = transfer_id.as_deref() {
            let cancelled = stores
                .transfers
                .update(|transfers| transfers.cancel(transfer_id));
            if cancelled {
                tracing::info!(transfer_id = %transfer_id, "receive transfer cancelled with its session");
            }
        }
        self.clear();
        transfer_id
    }

    fn clear(&mut self) {
        self.active_transfer_id = None;
        self.active_peer_id = None;
        self.provisional = false;
    }

    fn session_peer(&self) -> String {
        self.active_peer_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_PEER.to_owned())
    }

    fn return_to_listening(&mut self, stores: &AppStores) {
        self.clear();
        stores
            .receive
            .update(|receive| receive.status = ReceiveStatus::Listening);
        stores.sync_activity_selection();
    }

    fn slot(&self, stores: &AppStores) -> ActiveSlot {
        let Some(id) = self.active_transfer_id.clone() else {
            return ActiveSlot::Empty;
        };
        let status = stores
            .transfers
            .with(|transfers| transfers.get(&id).map(|transfer| transfer.status));
        match status {
            Some(status) if status.is_active() => ActiveSlot::Live {
                id,
                provisional: self.provisional,
            },
            Some(_) => ActiveSlot::Detached,
            None => ActiveSlot::Empty,
        }
    }

    /// Progress can arrive before `transfer_start`; a provisional transfer
    /// absorbs it until the real one is declared. Returns `None` when the
    /// session's transfer already reached a terminal status, e.g. cancelled
    /// by the user.
    fn ensure_active_transfer(&mut self, stores: &AppStores) -> Option<String> {
        match self.slot(stores) {
            ActiveSlot::Live { id, .. } => return Some(id),
            ActiveSlot::Detached => return None,
            ActiveSlot::Empty => {}
        }

        let transfer = Transfer::new(
            TransferDirection::Receive,
            self.session_peer(),
            PROVISIONAL_FILE_NAME,
            0,
        )
        .with_status(TransferStatus::InProgress);
        let transfer_id = transfer.id.clone();
        tracing::debug!(transfer_id = %transfer_id, "provisional receive transfer created");
        stores.transfers.update(|transfers| transfers.add(transfer));
        stores
            .receive
            .update(|receive| receive.status = ReceiveStatus::Receiving);
        stores.sync_activity_selection();
        self.active_transfer_id = Some(transfer_id.clone());
        self.provisional = true;
        Some(transfer_id)
    }
}

/// Where the session's transfer pointer stands against the transfer rows.
enum ActiveSlot {
    Empty,
    Live { id: String, provisional: bool },
    /// The row exists but already reached a terminal status.
    Detached,
}

fn resolve_peer(stores: &AppStores, token: &str) -> String {
    stores
        .peers
        .with(|peers: &PeersState| {
            peers
                .peers
                .iter()
                .find(|peer| peer.id == token || peer.fingerprint == token)
                .map(|peer| peer.id.clone())
        })
        .unwrap_or_else(|| token.to_owned())
}

fn clamp_percent(percent: f64) -> u8 {
    if !percent.is_finite() {
        return 0;
    }
    percent.round().clamp(0.0, 100.0) as u8
}

fn estimate_size(bytes: u64, percent: f64) -> Option<u64> {
    if percent.is_nan() || percent <= 0.0 {
        return None;
    }
    let estimate = (bytes as f64 / (percent / 100.0)).round();
    (estimate.is_finite() && estimate > 0.0).then_some(estimate as u64)
}

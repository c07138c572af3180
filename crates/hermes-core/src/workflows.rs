use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use hermes_ipc::{
    codes, DecryptOptions, EncryptOptions, PeerInfo, PeerTrustSetting, ZencService, ZendService,
};

use crate::{
    parse_ed25519_public_key, read_device_secret_key, sha256_file, AppStores, CoreError,
    CoreResult, DecryptMethod, HistoryStore, Identity, IncomingRequest, ModalData, Peer,
    ReceiveController, SendEncryption, ToastTone, Transfer, TransferDirection, TransferStatus,
    TrustLevel,
};

/// Clipboard shim. The application provides the OS-backed implementation.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> CoreResult<()>;
}

/// External collaborators the workflows drive.
#[derive(Clone)]
pub struct Services {
    pub zend: Arc<ZendService>,
    pub zenc: Arc<ZencService>,
    pub clipboard: Arc<dyn Clipboard>,
    pub history: Arc<dyn HistoryStore>,
}

/// User-facing operations. Each one reports its outcome through the stores
/// (identity or peers error, toast, error modal) instead of returning it.
#[derive(Clone)]
pub struct Workflows {
    stores: Arc<AppStores>,
    services: Services,
    receive: Arc<ReceiveController>,
    config_dir: PathBuf,
    device_key_path: PathBuf,
    home_dir: Option<PathBuf>,
}

impl Workflows {
    pub fn new(stores: Arc<AppStores>, services: Services, receive: Arc<ReceiveController>) -> Self {
        let home_dir = dirs::home_dir();
        let base = home_dir.clone().unwrap_or_else(std::env::temp_dir);
        Self {
            stores,
            services,
            receive,
            config_dir: base.join(".config").join("hermes"),
            device_key_path: base.join(".zend").join("identity"),
            home_dir,
        }
    }

    pub fn with_config_dir(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = config_dir.into();
        self
    }

    pub fn with_device_key_path(mut self, device_key_path: impl Into<PathBuf>) -> Self {
        self.device_key_path = device_key_path.into();
        self
    }

    pub fn stores(&self) -> &Arc<AppStores> {
        &self.stores
    }

    pub fn receive(&self) -> &Arc<ReceiveController> {
        &self.receive
    }

    // Identity

    pub async fn load_identity(&self) {
        self.stores.identity.update(|identity| identity.set_loading());
        match self.services.zend.show_identity().await {
            Ok(info) => {
                tracing::info!(fingerprint = %info.fingerprint, "identity loaded");
                self.stores.identity.update(|identity| {
                    identity.set_identity(Identity {
                        public_key: info.public_key,
                        fingerprint: info.fingerprint,
                        created_at: Utc::now(),
                    })
                });
                self.refresh_peers().await;
            }
            Err(error) if error.has_code(codes::NO_IDENTITY) => {
                tracing::info!("no identity yet");
                self.stores.identity.update(|identity| identity.clear());
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to load identity");
                let message = error.user_message();
                self.stores.identity.update(|identity| identity.set_error(message));
            }
        }
    }

    pub async fn create_identity(&self) {
        self.stores.identity.update(|identity| identity.set_loading());
        match self.services.zend.init_identity().await {
            Ok(info) => {
                tracing::info!(fingerprint = %info.fingerprint, "identity created");
                self.stores.identity.update(|identity| {
                    identity.set_identity(Identity {
                        public_key: info.public_key,
                        fingerprint: info.fingerprint,
                        created_at: Utc::now(),
                    })
                });
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to create identity");
                let message = error.user_message();
                self.stores.identity.update(|identity| identity.set_error(message));
            }
        }
    }

    pub fn copy_fingerprint(&self) {
        let fingerprint = self.stores.identity.with(|identity| {
            identity
                .identity
                .as_ref()
                .map(|identity| identity.fingerprint.clone())
        });
        let (message, tone) = match fingerprint {
            None => ("No identity available to copy.".to_owned(), ToastTone::Error),
            Some(fingerprint) => match self.services.clipboard.write_text(&fingerprint) {
                Ok(()) => ("Fingerprint copied to clipboard.".to_owned(), ToastTone::Success),
                Err(error) => (error.user_message(), ToastTone::Error),
            },
        };
        self.stores
            .identity
            .update(|identity| identity.show_notice(message, tone, Instant::now()));
    }

    pub async fn export_identity(&self) {
        let Some(identity) = self.stores.identity.with(|state| state.identity.clone()) else {
            self.stores
                .identity
                .update(|state| state.set_error("No identity available to export."));
            return;
        };

        match self.write_identity_export(&identity).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "identity exported");
                let shown = self.display_path(&path);
                self.stores
                    .show_toast(format!("Identity exported to {shown}"), ToastTone::Success);
            }
            Err(error) => {
                tracing::warn!(error = %error, "identity export failed");
                let message = error.user_message();
                self.stores.identity.update(|state| state.set_error(message));
            }
        }
    }

    async fn write_identity_export(&self, identity: &Identity) -> CoreResult<PathBuf> {
        let safe: String = identity
            .fingerprint
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let path = self.config_dir.join(format!("hermes-identity-{safe}.json"));
        let payload = serde_json::json!({
            "publicKey": identity.public_key,
            "fingerprint": identity.fingerprint,
            "createdAt": identity.created_at.to_rfc3339(),
        });
        let rendered = serde_json::to_string_pretty(&payload)
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        tokio::fs::create_dir_all(&self.config_dir)
            .await
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        tokio::fs::write(&path, rendered)
            .await
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(path)
    }

    fn display_path(&self, path: &Path) -> String {
        match self.home_dir.as_deref().and_then(|home| path.strip_prefix(home).ok()) {
            Some(relative) => format!("~/{}", relative.display()),
            None => path.display().to_string(),
        }
    }

    // Peers

    pub async fn refresh_peers(&self) {
        self.stores.peers.update(|peers| peers.set_loading());
        match self.services.zend.list_peers().await {
            Ok(listed) => {
                let peers = listed.into_iter().map(peer_from_info).collect::<Vec<_>>();
                tracing::debug!(count = peers.len(), "peers refreshed");
                self.stores.peers.update(|state| state.set_peers(peers));
            }
            Err(error) => self.peers_failed("refresh peers", CoreError::from(error)),
        }
    }

    pub async fn add_peer(&self, name: &str, public_key: &str, address: &str) {
        match self.services.zend.add_peer(name, public_key, address).await {
            Ok(added) => {
                tracing::info!(peer = %added.name, fingerprint = %added.fingerprint, "peer added");
                self.refresh_peers().await;
            }
            Err(error) => self.peers_failed("add peer", CoreError::from(error)),
        }
    }

    pub async fn remove_peer(&self, id: &str) {
        match self.services.zend.remove_peer(id).await {
            Ok(removed) => {
                tracing::info!(peer = %removed, "peer removed");
                self.stores.peers.update(|peers| {
                    peers.remove_local(id);
                });
                self.refresh_peers().await;
            }
            Err(error) => self.peers_failed("remove peer", CoreError::from(error)),
        }
    }

    pub async fn set_peer_trust(&self, id: &str, trust: PeerTrustSetting) {
        match self.services.zend.set_peer_trust(id, trust).await {
            Ok(updated) => {
                tracing::info!(peer = %id, trust = %updated, "peer trust updated");
                self.refresh_peers().await;
            }
            Err(error) => self.peers_failed("update peer trust", CoreError::from(error)),
        }
    }

    pub async fn block_peer(&self, id: &str) {
        self.set_peer_trust(id, PeerTrustSetting::Blocked).await;
    }

    /// Trusts a peer: blocked peers are re-trusted, pending ones are registered with `zend`.
    pub async fn trust_peer(&self, peer: &Peer) {
        let known = self.stores.peers.with(|peers| {
            peers
                .find(&peer.id)
                .is_some_and(|existing| existing.trust_level != TrustLevel::Pending)
        });
        if known {
            self.set_peer_trust(&peer.id, PeerTrustSetting::Trusted).await;
        } else {
            self.add_peer(&peer.id, &peer.public_key, &peer.address).await;
        }
    }

    /// Validates the add-peer form and returns the pending peer to confirm.
    pub fn pending_peer(
        name: &str,
        address: &str,
        public_key: &str,
    ) -> CoreResult<Peer> {
        let (name, address) = (name.trim(), address.trim());
        if name.is_empty() || address.is_empty() || public_key.trim().is_empty() {
            return Err(CoreError::Message(
                "Name, address and public key are required".to_owned(),
            ));
        }
        let parsed = parse_ed25519_public_key(public_key)?;
        Ok(Peer {
            id: name.to_owned(),
            address: address.to_owned(),
            public_key: parsed.normalized,
            fingerprint: parsed.fingerprint,
            label: Some(name.to_owned()),
            trust_level: TrustLevel::Pending,
        })
    }

    fn peers_failed(&self, action: &str, error: CoreError) {
        tracing::warn!(action, error = %error, "peer operation failed");
        let message = error.user_message();
        self.stores
            .peers
            .update(|peers| peers.set_error(message.clone()));
        self.stores.show_toast(message, ToastTone::Error);
    }

    // Transfers

    pub async fn send_file(&self, peer: &Peer, file_path: &str, encryption: &SendEncryption) {
        let file_name = Path::new(file_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_owned());
        let file_size = tokio::fs::metadata(file_path)
            .await
            .map(|metadata| metadata.len())
            .unwrap_or(0);
        let transfer = Transfer::new(TransferDirection::Send, peer.id.as_str(), file_name.as_str(), file_size)
            .with_file_path(file_path);
        let transfer_id = transfer.id.clone();
        tracing::info!(transfer_id = %transfer_id, peer = %peer.id, file = %file_name, encryption = encryption.label(), "send started");
        self.stores.transfers.update(|transfers| transfers.add(transfer));
        self.stores.sync_activity_selection();
        self.set_progress(&transfer_id, 10);

        match self.run_send(&transfer_id, peer, file_path, encryption).await {
            Ok(hash) => {
                tracing::info!(transfer_id = %transfer_id, hash = %hash, "send completed");
                self.stores
                    .transfers
                    .update(|transfers| transfers.complete(&transfer_id, hash));
                self.stores.show_toast(
                    format!("Sent {file_name} to {}", peer.display_name()),
                    ToastTone::Success,
                );
            }
            Err(error) => {
                tracing::warn!(transfer_id = %transfer_id, error = %error, "send failed");
                let message = error.user_message();
                self.stores
                    .transfers
                    .update(|transfers| transfers.fail(&transfer_id, message.clone()));
                self.stores.show_toast(message, ToastTone::Error);
            }
        }
        self.stores.sync_activity_selection();
        self.persist_history().await;
    }

    async fn run_send(
        &self,
        transfer_id: &str,
        peer: &Peer,
        file_path: &str,
        encryption: &SendEncryption,
    ) -> CoreResult<String> {
        let options = match encryption {
            SendEncryption::None => None,
            SendEncryption::PublicKey => Some(EncryptOptions::ToPublicKey(peer.public_key.clone())),
            SendEncryption::Password(password) => Some(EncryptOptions::Password(password.clone())),
        };

        let mut send_path = file_path.to_owned();
        if let Some(options) = options {
            let encrypted = self.services.zenc.encrypt_file(file_path, &options).await?;
            tracing::debug!(transfer_id, output = %encrypted.encrypted_path, "file encrypted for send");
            self.set_progress(transfer_id, 40);
            send_path = encrypted.encrypted_path;
        }

        self.set_progress(transfer_id, 60);
        let sent = self.services.zend.send_file(&send_path, &peer.id).await?;
        Ok(sent.hash)
    }

    fn set_progress(&self, transfer_id: &str, progress: u8) {
        self.stores
            .transfers
            .update(|transfers| transfers.update_progress(transfer_id, progress));
    }

    pub async fn decrypt_file(&self, file_path: &str, method: &DecryptMethod) {
        let result = async {
            let options = match method {
                DecryptMethod::DeviceKey => {
                    DecryptOptions::SecretKey(read_device_secret_key(&self.device_key_path)?)
                }
                DecryptMethod::Password(password) => DecryptOptions::Password(password.clone()),
            };
            Ok::<_, CoreError>(self.services.zenc.decrypt_file(file_path, &options).await?)
        }
        .await;

        match result {
            Ok(decrypted) => {
                tracing::info!(input = %file_path, output = %decrypted.decrypted_path, "file decrypted");
                self.stores.show_toast(
                    format!("Decrypted to {}", decrypted.decrypted_path),
                    ToastTone::Success,
                );
            }
            Err(error) => {
                tracing::warn!(input = %file_path, error = %error, "decrypt failed");
                self.stores.show_toast(error.user_message(), ToastTone::Error);
            }
        }
    }

    /// Location of a transfer's file, falling back to the default save directory.
    pub fn resolve_transfer_path(&self, transfer: &Transfer) -> PathBuf {
        match transfer.file_path.as_deref() {
            Some(path) => PathBuf::from(path),
            None => self
                .stores
                .receive
                .with(|receive| receive.default_save_path.join(&transfer.file_name)),
        }
    }

    /// Modal payload for decrypting `transfer`, or a warning toast when it cannot be decrypted.
    pub fn decrypt_target(&self, transfer: &Transfer) -> Option<ModalData> {
        if transfer.status != TransferStatus::Completed {
            self.stores.show_toast(
                "Only completed transfers can be decrypted.",
                ToastTone::Warning,
            );
            return None;
        }
        if transfer.direction != TransferDirection::Receive {
            self.stores
                .show_toast("Decrypt works only for received files.", ToastTone::Warning);
            return None;
        }
        Some(ModalData::DecryptTarget {
            file_name: transfer.file_name.clone(),
            file_path: self.resolve_transfer_path(transfer).to_string_lossy().to_string(),
        })
    }

    pub async fn verify_transfer_hash(&self, transfer: &Transfer) {
        if transfer.status != TransferStatus::Completed {
            self.stores.show_toast(
                "Hash verification requires a completed transfer.",
                ToastTone::Warning,
            );
            return;
        }
        let Some(expected) = transfer.hash.clone().filter(|hash| !hash.is_empty()) else {
            self.stores
                .show_toast("No hash available for this transfer.", ToastTone::Warning);
            return;
        };

        let path = self.resolve_transfer_path(transfer);
        let hashed = tokio::task::spawn_blocking(move || sha256_file(&path)).await;
        let (message, tone) = match hashed {
            Ok(Ok(actual)) if actual.eq_ignore_ascii_case(&expected) => {
                ("Hash verified.".to_owned(), ToastTone::Success)
            }
            Ok(Ok(_)) => ("Hash mismatch.".to_owned(), ToastTone::Error),
            Ok(Err(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                ("File not found.".to_owned(), ToastTone::Error)
            }
            Ok(Err(error)) => (error.to_string(), ToastTone::Error),
            Err(error) => (error.to_string(), ToastTone::Error),
        };
        tracing::info!(transfer_id = %transfer.id, outcome = %message, "hash verification finished");
        self.stores.show_toast(message, tone);
    }

    pub fn accept_request(&self, request: &IncomingRequest, save_dir: &Path) {
        let file_path = save_dir.join(&request.file_name);
        let transfer = Transfer::new(
            TransferDirection::Receive,
            request.peer_id.as_str(),
            request.file_name.as_str(),
            request.file_size,
        )
        .with_file_path(file_path.to_string_lossy());
        tracing::info!(request_id = %request.id, transfer_id = %transfer.id, "incoming request accepted");
        self.stores.transfers.update(|transfers| transfers.add(transfer));
        self.stores.receive.update(|receive| {
            receive.remove_request(&request.id);
        });
        self.stores.modal.update(|modal| modal.close());
        self.stores.sync_activity_selection();
        self.stores.show_toast(
            format!("Accepted {} into {}", request.file_name, save_dir.display()),
            ToastTone::Info,
        );
    }

    pub fn decline_request(&self, request_id: &str) {
        let removed = self
            .stores
            .receive
            .update(|receive| receive.remove_request(request_id));
        if removed.is_some() {
            tracing::info!(request_id, "incoming request declined");
            self.stores.sync_activity_selection();
        }
    }

    pub async fn cancel_transfer(&self, transfer_id: &str) {
        let cancelled = self
            .stores
            .transfers
            .update(|transfers| transfers.cancel(transfer_id));
        if cancelled {
            tracing::info!(transfer_id, "transfer cancelled");
            self.stores.sync_activity_selection();
            self.persist_history().await;
        }
    }

    // Receive listener

    pub async fn toggle_listening(&self) {
        if let Err(error) = self.receive.toggle().await {
            self.stores.show_toast(error.user_message(), ToastTone::Error);
        }
    }

    pub async fn start_listening(&self) {
        if let Err(error) = self.receive.start_default().await {
            self.stores.show_toast(error.user_message(), ToastTone::Error);
        }
    }

    pub async fn stop_listening(&self) {
        self.receive.stop().await;
        self.persist_history().await;
    }

    // History

    pub async fn load_history(&self) {
        match self.services.history.load().await {
            Ok(history) => {
                tracing::info!(count = history.len(), "transfer history loaded");
                self.stores
                    .transfers
                    .update(|transfers| transfers.load_history(history));
                self.stores.sync_activity_selection();
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to load transfer history");
                self.stores
                    .show_toast(error.user_message(), ToastTone::Warning);
            }
        }
    }

    pub async fn persist_history(&self) {
        let finished = self.stores.transfers.with(|transfers| {
            transfers
                .history()
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        });
        if let Err(error) = self.services.history.save(&finished).await {
            tracing::warn!(error = %error, "failed to persist transfer history");
        }
    }
}

fn peer_from_info(info: PeerInfo) -> Peer {
    Peer {
        id: info.name.clone(),
        address: info.address,
        public_key: info.public_key,
        fingerprint: info.fingerprint,
        label: Some(info.name),
        trust_level: TrustLevel::from_engine(&info.trust),
    }
}

use std::path::Path;

use async_trait::async_trait;
use hermes_core::{
    DecryptMethod, IncomingRequest, ModalData, Peer, SendEncryption, Transfer, Workflows,
};

/// The workflow operations key handlers trigger. [`Workflows`] is the real
/// implementation; tests substitute a recorder.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn create_identity(&self);
    async fn export_identity(&self);
    fn copy_fingerprint(&self);

    async fn trust_peer(&self, peer: &Peer);
    async fn block_peer(&self, peer_id: &str);
    async fn remove_peer(&self, peer_id: &str);

    async fn send_file(&self, peer: &Peer, file_path: &str, encryption: &SendEncryption);
    async fn decrypt_file(&self, file_path: &str, method: &DecryptMethod);
    fn decrypt_target(&self, transfer: &Transfer) -> Option<ModalData>;
    async fn verify_transfer_hash(&self, transfer: &Transfer);
    async fn cancel_transfer(&self, transfer_id: &str);

    fn accept_request(&self, request: &IncomingRequest, save_dir: &Path);
    fn decline_request(&self, request_id: &str);
    async fn toggle_listening(&self);
    async fn stop_listening(&self);
}

#[async_trait]
impl WorkflowRunner for Workflows {
    async fn create_identity(&self) {
        Workflows::create_identity(self).await;
    }

    async fn export_identity(&self) {
        Workflows::export_identity(self).await;
    }

    fn copy_fingerprint(&self) {
        Workflows::copy_fingerprint(self);
    }

    async fn trust_peer(&self, peer: &Peer) {
        Workflows::trust_peer(self, peer).await;
    }

    async fn block_peer(&self, peer_id: &str) {
        Workflows::block_peer(self, peer_id).await;
    }

    async fn remove_peer(&self, peer_id: &str) {
        Workflows::remove_peer(self, peer_id).await;
    }

    async fn send_file(&self, peer: &Peer, file_path: &str, encryption: &SendEncryption) {
        Workflows::send_file(self, peer, file_path, encryption).await;
    }

    async fn decrypt_file(&self, file_path: &str, method: &DecryptMethod) {
        Workflows::decrypt_file(self, file_path, method).await;
    }

    fn decrypt_target(&self, transfer: &Transfer) -> Option<ModalData> {
        Workflows::decrypt_target(self, transfer)
    }

    async fn verify_transfer_hash(&self, transfer: &Transfer) {
        Workflows::verify_transfer_hash(self, transfer).await;
    }

    async fn cancel_transfer(&self, transfer_id: &str) {
        Workflows::cancel_transfer(self, transfer_id).await;
    }

    fn accept_request(&self, request: &IncomingRequest, save_dir: &Path) {
        Workflows::accept_request(self, request, save_dir);
    }

    fn decline_request(&self, request_id: &str) {
        Workflows::decline_request(self, request_id);
    }

    async fn toggle_listening(&self) {
        Workflows::toggle_listening(self).await;
    }

    async fn stop_listening(&self) {
        Workflows::stop_listening(self).await;
    }
}

#![cfg(unix)]

mod support;

use chrono::Utc;
use hermes_core::{
    fingerprint_of, sha256_file, DecryptMethod, Identity, IncomingRequest, ModalData, ModalKind,
    Peer, SendEncryption, ToastTone, Transfer, TransferDirection, TransferStatus, TrustLevel,
};
use hermes_ipc::Binary;
use support::{FakeEngines, Harness, RecordingClipboard};

fn bob() -> Peer {
    Peer {
        id: "bob".to_owned(),
        address: "10.0.0.2:7654".to_owned(),
        public_key: "BOBKEY".to_owned(),
        fingerprint: "bobfp".to_owned(),
        label: Some("Bob".to_owned()),
        trust_level: TrustLevel::Trusted,
    }
}

fn identity() -> Identity {
    Identity {
        public_key: "PK".to_owned(),
        fingerprint: "ab:cd/ef".to_owned(),
        created_at: Utc::now(),
    }
}

fn completed_receive(harness: &Harness, file_path: Option<String>, hash: &str) -> Transfer {
    let mut transfer = Transfer::new(TransferDirection::Receive, "bob", "notes.txt", 5);
    transfer.file_path = file_path;
    let id = transfer.id.clone();
    harness.stores.transfers.update(|transfers| {
        transfers.add(transfer);
        transfers.complete(&id, hash);
    });
    harness
        .stores
        .transfers
        .with(|transfers| transfers.get(&id).cloned())
        .expect("transfer stored")
}

#[tokio::test]
async fn missing_identity_is_not_an_error() {
    let engines = FakeEngines::new();
    engines.install(Binary::Zend, r#"echo '{"event":"peer_list","peers":[]}'"#);
    let harness = Harness::new(&engines);

    harness.workflows.load_identity().await;

    let state = harness.stores.identity.get();
    assert!(!state.has_identity());
    assert!(!state.is_loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn loading_identity_also_refreshes_peers() {
    let engines = FakeEngines::new();
    engines.install(
        Binary::Zend,
        r#"case "$1 $2" in
  "id show") echo '{"event":"identity_loaded","public_key":"PK","fingerprint":"FP"}' ;;
  "peer list") echo '{"event":"peer_list","peers":[{"name":"bob","public_key":"K","address":"10.0.0.2:7654","fingerprint":"F","trust":"trusted"}]}' ;;
  *) exit 2 ;;
esac"#,
    );
    let harness = Harness::new(&engines);

    harness.workflows.load_identity().await;

    assert_eq!(
        harness
            .stores
            .identity
            .with(|state| state.identity.as_ref().map(|i| i.fingerprint.clone())),
        Some("FP".to_owned())
    );
    let peers = harness.stores.peers.get();
    assert_eq!(peers.peers.len(), 1);
    assert_eq!(peers.selected_peer_id.as_deref(), Some("bob"));
    assert!(peers.peers[0].is_trusted());
}

#[tokio::test]
async fn password_send_encrypts_then_ships_the_encrypted_copy() {
    let engines = FakeEngines::new();
    let log = engines.scratch_path("zend.log");
    engines.install(
        Binary::Zenc,
        r#"cat > /dev/null
echo "{\"event\":\"done\",\"output\":\"$2.zenc\",\"hash\":\"ench\"}""#,
    );
    engines.install(
        Binary::Zend,
        &format!(
            r#"echo "$@" > {}
echo '{{"event":"progress","bytes":5,"percent":100}}'
echo '{{"event":"transfer_complete","file":"a.txt.zenc","hash":"sendhash"}}'"#,
            log.display()
        ),
    );
    let source = engines.scratch_path("a.txt");
    std::fs::write(&source, "hello").expect("source file");
    let harness = Harness::new(&engines);

    harness
        .workflows
        .send_file(
            &bob(),
            &source.to_string_lossy(),
            &SendEncryption::Password("pw".to_owned()),
        )
        .await;

    let transfers = harness.stores.transfers.with(|t| t.transfers.clone());
    assert_eq!(transfers.len(), 1);
    let transfer = &transfers[0];
    assert_eq!(transfer.direction, TransferDirection::Send);
    assert_eq!(transfer.status, TransferStatus::Completed);
    assert_eq!(transfer.progress, 100);
    assert_eq!(transfer.file_size, 5);
    assert_eq!(transfer.hash.as_deref(), Some("sendhash"));
    assert_eq!(harness.toast().as_deref(), Some("Sent a.txt to Bob"));

    let sent_args = std::fs::read_to_string(&log).expect("zend args logged");
    assert_eq!(
        sent_args.trim(),
        format!("send {}.zenc bob", source.display())
    );
    assert_eq!(harness.history.saved.lock().expect("history").len(), 1);
}

#[tokio::test]
async fn failed_send_marks_transfer_failed_with_engine_message() {
    let engines = FakeEngines::new();
    engines.install(
        Binary::Zend,
        r#"echo '{"event":"error","code":"peer_not_found","message":"Peer bob not found"}'
exit 1"#,
    );
    let harness = Harness::new(&engines);

    harness
        .workflows
        .send_file(&bob(), "/nonexistent/a.txt", &SendEncryption::None)
        .await;

    let transfer = harness.stores.transfers.with(|t| t.transfers[0].clone());
    assert_eq!(transfer.status, TransferStatus::Failed);
    assert_eq!(transfer.error.as_deref(), Some("Peer bob not found"));
    assert_eq!(transfer.file_size, 0);
    let tone = harness
        .stores
        .toast
        .with(|toast| toast.current.as_ref().map(|t| t.tone));
    assert_eq!(tone, Some(ToastTone::Error));
}

#[tokio::test]
async fn copy_fingerprint_reports_through_identity_notice() {
    let engines = FakeEngines::new();
    let harness = Harness::new(&engines);

    harness.workflows.copy_fingerprint();
    let notice = harness.stores.identity.with(|s| s.notice.clone()).expect("notice");
    assert_eq!(notice.tone, ToastTone::Error);

    harness
        .stores
        .identity
        .update(|state| state.set_identity(identity()));
    harness.workflows.copy_fingerprint();
    let notice = harness.stores.identity.with(|s| s.notice.clone()).expect("notice");
    assert_eq!(notice.message, "Fingerprint copied to clipboard.");
    assert_eq!(notice.tone, ToastTone::Success);
    assert_eq!(
        *harness.clipboard.writes.lock().expect("writes"),
        vec!["ab:cd/ef".to_owned()]
    );

    let failing = Harness::with_clipboard(
        &engines,
        RecordingClipboard {
            fail: true,
            ..RecordingClipboard::default()
        },
    );
    failing
        .stores
        .identity
        .update(|state| state.set_identity(identity()));
    failing.workflows.copy_fingerprint();
    let notice = failing.stores.identity.with(|s| s.notice.clone()).expect("notice");
    assert_eq!(notice.message, "clipboard unavailable: no display");
    assert_eq!(notice.tone, ToastTone::Error);
}

#[tokio::test]
async fn export_writes_a_sanitized_identity_document() {
    let engines = FakeEngines::new();
    let harness = Harness::new(&engines);
    harness
        .stores
        .identity
        .update(|state| state.set_identity(identity()));

    harness.workflows.export_identity().await;

    let path = engines
        .scratch_path("config")
        .join("hermes-identity-abcdef.json");
    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("export written"))
            .expect("export is json");
    assert_eq!(document["publicKey"], "PK");
    assert_eq!(document["fingerprint"], "ab:cd/ef");
    assert!(document["createdAt"].is_string());
    assert!(harness
        .toast()
        .is_some_and(|toast| toast.starts_with("Identity exported to ")));
}

#[tokio::test]
async fn hash_verification_reports_each_outcome() {
    let engines = FakeEngines::new();
    let harness = Harness::new(&engines);
    let file = engines.scratch_path("notes.txt");
    std::fs::write(&file, "hello").expect("file");
    let actual = sha256_file(&file).expect("hash");
    let path = Some(file.to_string_lossy().to_string());

    let transfer = completed_receive(&harness, path.clone(), &actual);
    harness.workflows.verify_transfer_hash(&transfer).await;
    assert_eq!(harness.toast().as_deref(), Some("Hash verified."));

    let transfer = completed_receive(&harness, path, &fingerprint_of(b"other"));
    harness.workflows.verify_transfer_hash(&transfer).await;
    assert_eq!(harness.toast().as_deref(), Some("Hash mismatch."));

    // Falls back to the default save directory, which does not exist.
    let transfer = completed_receive(&harness, None, &actual);
    harness.workflows.verify_transfer_hash(&transfer).await;
    assert_eq!(harness.toast().as_deref(), Some("File not found."));

    let pending = Transfer::new(TransferDirection::Receive, "bob", "x", 1);
    harness.workflows.verify_transfer_hash(&pending).await;
    assert_eq!(
        harness.toast().as_deref(),
        Some("Hash verification requires a completed transfer.")
    );

    let transfer = completed_receive(&harness, None, "");
    harness.workflows.verify_transfer_hash(&transfer).await;
    assert_eq!(
        harness.toast().as_deref(),
        Some("No hash available for this transfer.")
    );
}

#[tokio::test]
async fn device_key_decrypt_feeds_encoded_key_on_stdin() {
    let engines = FakeEngines::new();
    let captured = engines.scratch_path("stdin.txt");
    engines.install(
        Binary::Zenc,
        &format!(
            r#"cat > {}
echo '{{"event":"done","output":"/tmp/notes.txt","hash":"h"}}'"#,
            captured.display()
        ),
    );
    std::fs::write(engines.scratch_path("identity"), [9_u8; 64]).expect("device key");
    let harness = Harness::new(&engines);

    harness
        .workflows
        .decrypt_file("/tmp/notes.txt.zenc", &DecryptMethod::DeviceKey)
        .await;

    assert_eq!(harness.toast().as_deref(), Some("Decrypted to /tmp/notes.txt"));
    let secret = std::fs::read_to_string(&captured).expect("stdin captured");
    assert_eq!(secret.len(), 88);
}

#[tokio::test]
async fn device_key_decrypt_without_key_file_fails_before_spawning() {
    let engines = FakeEngines::new();
    let harness = Harness::new(&engines);

    harness
        .workflows
        .decrypt_file("a.zenc", &DecryptMethod::DeviceKey)
        .await;

    assert_eq!(
        harness.toast().as_deref(),
        Some("Device identity key not found")
    );
}

#[tokio::test]
async fn decrypt_target_only_accepts_completed_receives() {
    let engines = FakeEngines::new();
    let harness = Harness::new(&engines);

    let sent = Transfer::new(TransferDirection::Send, "bob", "a.txt", 1)
        .with_status(TransferStatus::Completed);
    assert!(harness.workflows.decrypt_target(&sent).is_none());
    assert_eq!(
        harness.toast().as_deref(),
        Some("Decrypt works only for received files.")
    );

    let running = Transfer::new(TransferDirection::Receive, "bob", "a.txt", 1);
    assert!(harness.workflows.decrypt_target(&running).is_none());
    assert_eq!(
        harness.toast().as_deref(),
        Some("Only completed transfers can be decrypted.")
    );

    let done = completed_receive(&harness, None, "h");
    let expected = engines
        .scratch_path("downloads")
        .join("notes.txt")
        .to_string_lossy()
        .to_string();
    assert_eq!(
        harness.workflows.decrypt_target(&done),
        Some(ModalData::DecryptTarget {
            file_name: "notes.txt".to_owned(),
            file_path: expected,
        })
    );
}

#[tokio::test]
async fn accepting_a_request_queues_a_pending_receive() {
    let engines = FakeEngines::new();
    let harness = Harness::new(&engines);
    let request = IncomingRequest {
        id: "req-1".to_owned(),
        peer_id: "bob".to_owned(),
        peer_fingerprint: "bobfp".to_owned(),
        file_name: "photo.png".to_owned(),
        file_size: 42,
        received_at: Utc::now(),
    };
    harness
        .stores
        .receive
        .update(|receive| receive.add_request(request.clone()));
    harness.stores.modal.update(|modal| {
        modal.open(ModalKind::ReceiveRequest, ModalData::Request(request.clone()))
    });

    let save_dir = engines.scratch_path("inbox");
    harness.workflows.accept_request(&request, &save_dir);

    assert!(harness
        .stores
        .receive
        .with(|receive| receive.incoming_requests.is_empty()));
    assert!(!harness.stores.modal.with(|modal| modal.is_open()));
    let transfer = harness.stores.transfers.with(|t| t.transfers[0].clone());
    assert_eq!(transfer.status, TransferStatus::Pending);
    assert_eq!(transfer.file_size, 42);
    assert_eq!(
        transfer.file_path.as_deref(),
        Some(save_dir.join("photo.png").to_string_lossy().as_ref())
    );

    harness
        .stores
        .receive
        .update(|receive| receive.add_request(request.clone()));
    harness.workflows.decline_request("req-1");
    assert!(harness
        .stores
        .receive
        .with(|receive| receive.incoming_requests.is_empty()));
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub public_key: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Trusted,
    Pending,
    Blocked,
}

impl TrustLevel {
    /// Maps the trust string reported by `zend peer list`.
    pub fn from_engine(raw: &str) -> Self {
        if raw == "blocked" {
            Self::Blocked
        } else {
            Self::Trusted
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Pending => "pending",
            Self::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub id: String,
    pub address: String,
    pub public_key: String,
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub trust_level: TrustLevel,
}

impl Peer {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn is_trusted(&self) -> bool {
        self.trust_level == TrustLevel::Trusted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Send,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn is_finished(self) -> bool {
        !self.is_active()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    pub direction: TransferDirection,
    pub peer_id: String,
    pub file_name: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub progress: u8,
    pub status: TransferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Transfer {
    pub fn new(
        direction: TransferDirection,
        peer_id: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            direction,
            peer_id: peer_id.into(),
            file_name: file_name.into(),
            file_size,
            file_path: None,
            progress: 0,
            status: TransferStatus::Pending,
            hash: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn with_status(mut self, status: TransferStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequest {
    pub id: String,
    pub peer_id: String,
    pub peer_fingerprint: String,
    pub file_name: String,
    pub file_size: u64,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiveStatus {
    #[default]
    Idle,
    Listening,
    Receiving,
}

impl ReceiveStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Receiving => "receiving",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Section {
    #[default]
    Identity,
    Peers,
    Activity,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Identity, Section::Peers, Section::Activity];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Peers => "peers",
            Self::Activity => "activity",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::Peers => "Peers",
            Self::Activity => "Activity",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self, 1)
    }

    pub fn prev(self) -> Self {
        cycle(&Self::ALL, self, Self::ALL.len() - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pane {
    #[default]
    Navigation,
    Main,
    Inspect,
}

impl Pane {
    pub const ALL: [Pane; 3] = [Pane::Navigation, Pane::Main, Pane::Inspect];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Main => "main",
            Self::Inspect => "inspect",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self, 1)
    }

    pub fn prev(self) -> Self {
        cycle(&Self::ALL, self, Self::ALL.len() - 1)
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, step: usize) -> T {
    let index = all.iter().position(|item| *item == current).unwrap_or(0);
    all[(index + step) % all.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModalKind {
    #[default]
    None,
    Error,
    SaveLocation,
    ReceiveRequest,
    ConfirmSend,
    DecryptFile,
    EncryptionOptions,
    SelectFile,
    TrustPeer,
    AddPeer,
    Help,
}

impl ModalKind {
    /// Modal kinds ordered from highest to lowest keymap priority.
    pub const ALL: [ModalKind; 10] = [
        ModalKind::Error,
        ModalKind::SaveLocation,
        ModalKind::ReceiveRequest,
        ModalKind::ConfirmSend,
        ModalKind::DecryptFile,
        ModalKind::EncryptionOptions,
        ModalKind::SelectFile,
        ModalKind::TrustPeer,
        ModalKind::AddPeer,
        ModalKind::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Error => "error",
            Self::SaveLocation => "save_location",
            Self::ReceiveRequest => "receive_request",
            Self::ConfirmSend => "confirm_send",
            Self::DecryptFile => "decrypt_file",
            Self::EncryptionOptions => "encryption_options",
            Self::SelectFile => "select_file",
            Self::TrustPeer => "trust_peer",
            Self::AddPeer => "add_peer",
            Self::Help => "help",
        }
    }

    pub fn is_open(self) -> bool {
        self != Self::None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SendEncryption {
    #[default]
    None,
    PublicKey,
    Password(String),
}

impl SendEncryption {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PublicKey => "peer public key",
            Self::Password(_) => "password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptMethod {
    DeviceKey,
    Password(String),
}

/// Payload carried by the open modal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModalData {
    #[default]
    None,
    Peer(Peer),
    SendTarget {
        peer: Option<Peer>,
    },
    SendFile {
        peer: Option<Peer>,
        file_path: String,
    },
    SendPlan {
        peer: Peer,
        file_path: String,
        encryption: SendEncryption,
    },
    Request(IncomingRequest),
    DecryptTarget {
        file_name: String,
        file_path: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastTone {
    Success,
    Error,
    Info,
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_and_panes_wrap_in_both_directions() {
        assert_eq!(Section::Identity.next(), Section::Peers);
        assert_eq!(Section::Activity.next(), Section::Identity);
        assert_eq!(Section::Identity.prev(), Section::Activity);
        assert_eq!(Pane::Inspect.next(), Pane::Navigation);
        assert_eq!(Pane::Navigation.prev(), Pane::Inspect);
    }

    #[test]
    fn transfers_serialize_with_camel_case_fields() {
        let transfer = Transfer::new(TransferDirection::Receive, "alice", "a.txt", 10)
            .with_status(TransferStatus::InProgress);
        let json = serde_json::to_value(&transfer).expect("serialize");
        assert_eq!(json["peerId"], "alice");
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["direction"], "receive");
        assert!(json.get("completedAt").is_none());
    }

    #[test]
    fn engine_trust_maps_everything_but_blocked_to_trusted() {
        assert_eq!(TrustLevel::from_engine("blocked"), TrustLevel::Blocked);
        assert_eq!(TrustLevel::from_engine("trusted"), TrustLevel::Trusted);
        assert_eq!(TrustLevel::from_engine("unknown"), TrustLevel::Trusted);
    }
}

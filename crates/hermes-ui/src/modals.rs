use std::path::{Path, PathBuf};

use hermes_core::{
    AppStores, CoreError, DecryptMethod, IncomingRequest, ModalData, ModalKind, Peer,
    SendEncryption, Workflows,
};

use crate::keymap::KeyChord;

/// Work a modal asks the controller to perform before the modal closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalTask {
    TrustPeer(Peer),
    Send {
        peer: Peer,
        file_path: String,
        encryption: SendEncryption,
    },
    Decrypt {
        file_path: String,
        method: DecryptMethod,
    },
    AcceptRequest {
        request: IncomingRequest,
        save_dir: PathBuf,
    },
    DeclineRequest(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalOutcome {
    /// Keep the modal open, usually with an inline error.
    Stay,
    Close,
    Open { kind: ModalKind, data: ModalData },
    /// Open the error modal on top of the form.
    Error(String),
    /// Run the task, then close.
    Run(ModalTask),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub label: &'static str,
    pub value: String,
    pub focused: bool,
}

/// What the renderer needs to draw a modal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModalView {
    pub title: String,
    pub body: Vec<String>,
    pub fields: Vec<FieldView>,
    pub error: Option<String>,
    pub hint: &'static str,
}

/// Confirm/cancel behavior of the open modal. Registered when the modal mounts
/// and dropped when it unmounts.
pub trait ModalHandlers: Send {
    fn kind(&self) -> ModalKind;

    fn confirm(&mut self, stores: &AppStores) -> ModalOutcome;

    fn cancel(&mut self, _stores: &AppStores) -> ModalOutcome {
        ModalOutcome::Close
    }

    fn next_field(&mut self) {}

    fn prev_field(&mut self) {}

    /// Handles a key no binding claimed. Returns whether it was consumed.
    fn input(&mut self, _chord: &KeyChord) -> bool {
        false
    }

    fn view(&self) -> ModalView;
}

/// Builds the handler for a freshly opened modal. Error and help have none.
pub fn mount(kind: ModalKind, data: &ModalData, stores: &AppStores) -> Option<Box<dyn ModalHandlers>> {
    let handlers: Box<dyn ModalHandlers> = match (kind, data) {
        (ModalKind::AddPeer, _) => Box::new(AddPeerForm::default()),
        (ModalKind::TrustPeer, ModalData::Peer(peer)) => Box::new(TrustPeerPrompt {
            peer: peer.clone(),
        }),
        (ModalKind::SelectFile, ModalData::SendTarget { peer }) => {
            Box::new(SelectFileForm::new(peer.clone()))
        }
        (ModalKind::SelectFile, _) => Box::new(SelectFileForm::new(None)),
        (ModalKind::EncryptionOptions, ModalData::SendFile { peer: Some(peer), file_path }) => {
            Box::new(EncryptionOptionsForm::new(peer.clone(), file_path.clone()))
        }
        (
            ModalKind::ConfirmSend,
            ModalData::SendPlan {
                peer,
                file_path,
                encryption,
            },
        ) => Box::new(ConfirmSendPrompt {
            peer: peer.clone(),
            file_path: file_path.clone(),
            encryption: encryption.clone(),
        }),
        (ModalKind::ReceiveRequest, ModalData::Request(request)) => Box::new(ReceiveRequestPrompt {
            request: request.clone(),
        }),
        (ModalKind::SaveLocation, ModalData::Request(request)) => {
            let default_dir = stores
                .receive
                .with(|receive| receive.default_save_path.clone());
            Box::new(SaveLocationForm::new(request.clone(), &default_dir))
        }
        (
            ModalKind::DecryptFile,
            ModalData::DecryptTarget {
                file_name,
                file_path,
            },
        ) => Box::new(DecryptFileForm::new(file_name.clone(), file_path.clone())),
        (kind, _) => {
            if kind.is_open() && !matches!(kind, ModalKind::Error | ModalKind::Help) {
                tracing::warn!(modal = kind.as_str(), "modal opened without matching payload");
            }
            return None;
        }
    };
    Some(handlers)
}

/// Single-line text input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    value: String,
}

impl TextField {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Applies a typed character or backspace.
    pub fn edit(&mut self, chord: &KeyChord) -> bool {
        if chord.key == "backspace" && !chord.ctrl && !chord.alt && !chord.meta {
            self.value.pop();
            return true;
        }
        match chord.printable() {
            Some(ch) => {
                self.value.push(ch);
                true
            }
            None => false,
        }
    }
}

fn cycle(index: usize, len: usize, forward: bool) -> usize {
    if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}

#[derive(Debug, Default)]
pub struct AddPeerForm {
    name: TextField,
    address: TextField,
    public_key: TextField,
    focus: usize,
    error: Option<String>,
}

impl AddPeerForm {
    const LABELS: [&'static str; 3] = ["Name", "Address", "Public key"];

    fn field_mut(&mut self) -> &mut TextField {
        match self.focus {
            0 => &mut self.name,
            1 => &mut self.address,
            _ => &mut self.public_key,
        }
    }
}

impl ModalHandlers for AddPeerForm {
    fn kind(&self) -> ModalKind {
        ModalKind::AddPeer
    }

    fn confirm(&mut self, _stores: &AppStores) -> ModalOutcome {
        match Workflows::pending_peer(
            self.name.value(),
            self.address.value(),
            self.public_key.value(),
        ) {
            Ok(peer) => ModalOutcome::Open {
                kind: ModalKind::TrustPeer,
                data: ModalData::Peer(peer),
            },
            Err(CoreError::Validation(error)) => ModalOutcome::Error(error.to_string()),
            Err(error) => {
                self.error = Some(error.user_message());
                ModalOutcome::Stay
            }
        }
    }

    fn next_field(&mut self) {
        self.focus = cycle(self.focus, Self::LABELS.len(), true);
    }

    fn prev_field(&mut self) {
        self.focus = cycle(self.focus, Self::LABELS.len(), false);
    }

    fn input(&mut self, chord: &KeyChord) -> bool {
        let consumed = self.field_mut().edit(chord);
        if consumed {
            self.error = None;
        }
        consumed
    }

    fn view(&self) -> ModalView {
        let values = [&self.name, &self.address, &self.public_key];
        ModalView {
            title: "Add Peer".to_owned(),
            body: Vec::new(),
            fields: Self::LABELS
                .iter()
                .zip(values)
                .enumerate()
                .map(|(index, (label, field))| FieldView {
                    label,
                    value: field.value().to_owned(),
                    focused: index == self.focus,
                })
                .collect(),
            error: self.error.clone(),
            hint: "Tab next field · Enter continue · Esc cancel",
        }
    }
}

#[derive(Debug)]
pub struct TrustPeerPrompt {
    peer: Peer,
}

impl ModalHandlers for TrustPeerPrompt {
    fn kind(&self) -> ModalKind {
        ModalKind::TrustPeer
    }

    fn confirm(&mut self, _stores: &AppStores) -> ModalOutcome {
        ModalOutcome::Run(ModalTask::TrustPeer(self.peer.clone()))
    }

    fn view(&self) -> ModalView {
        ModalView {
            title: "Trust Peer".to_owned(),
            body: vec![
                format!("Name: {}", self.peer.display_name()),
                format!("Address: {}", self.peer.address),
                format!("Fingerprint: {}", self.peer.fingerprint),
                String::new(),
                "Only trust this peer if the fingerprint matches what they told you.".to_owned(),
            ],
            fields: Vec::new(),
            error: None,
            hint: "Enter trust · Esc cancel",
        }
    }
}

#[derive(Debug)]
pub struct SelectFileForm {
    peer: Option<Peer>,
    path: TextField,
    error: Option<String>,
}

impl SelectFileForm {
    fn new(peer: Option<Peer>) -> Self {
        Self {
            peer,
            path: TextField::default(),
            error: None,
        }
    }
}

impl ModalHandlers for SelectFileForm {
    fn kind(&self) -> ModalKind {
        ModalKind::SelectFile
    }

    fn confirm(&mut self, stores: &AppStores) -> ModalOutcome {
        let path = self.path.value().trim().to_owned();
        if path.is_empty() || !Path::new(&path).is_file() {
            self.error = Some(format!("File not found: {path}"));
            return ModalOutcome::Stay;
        }
        let peer = self.peer.clone().or_else(|| {
            stores
                .peers
                .with(|peers| peers.selected().filter(|peer| peer.is_trusted()).cloned())
        });
        let Some(peer) = peer else {
            self.error = Some("Select a trusted peer first".to_owned());
            return ModalOutcome::Stay;
        };
        ModalOutcome::Open {
            kind: ModalKind::EncryptionOptions,
            data: ModalData::SendFile {
                peer: Some(peer),
                file_path: path,
            },
        }
    }

    fn input(&mut self, chord: &KeyChord) -> bool {
        let consumed = self.path.edit(chord);
        if consumed {
            self.error = None;
        }
        consumed
    }

    fn view(&self) -> ModalView {
        let target = match &self.peer {
            Some(peer) => format!("To: {}", peer.display_name()),
            None => "To: selected trusted peer".to_owned(),
        };
        ModalView {
            title: "Send File".to_owned(),
            body: vec![target],
            fields: vec![FieldView {
                label: "Path",
                value: self.path.value().to_owned(),
                focused: true,
            }],
            error: self.error.clone(),
            hint: "Enter continue · Esc cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionChoice {
    #[default]
    None,
    PublicKey,
    Password,
}

impl EncryptionChoice {
    const ALL: [EncryptionChoice; 3] = [Self::None, Self::PublicKey, Self::Password];

    fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::PublicKey => "Peer public key",
            Self::Password => "Password",
        }
    }

    fn shift(self, forward: bool) -> Self {
        let index = Self::ALL.iter().position(|choice| *choice == self).unwrap_or(0);
        Self::ALL[cycle(index, Self::ALL.len(), forward)]
    }
}

#[derive(Debug)]
pub struct EncryptionOptionsForm {
    peer: Peer,
    file_path: String,
    choice: EncryptionChoice,
    password: TextField,
    /// 0 is the method selector, 1 the password field.
    focus: usize,
    error: Option<String>,
}

impl EncryptionOptionsForm {
    fn new(peer: Peer, file_path: String) -> Self {
        Self {
            peer,
            file_path,
            choice: EncryptionChoice::default(),
            password: TextField::default(),
            focus: 0,
            error: None,
        }
    }

    pub fn choice(&self) -> EncryptionChoice {
        self.choice
    }
}

impl ModalHandlers for EncryptionOptionsForm {
    fn kind(&self) -> ModalKind {
        ModalKind::EncryptionOptions
    }

    fn confirm(&mut self, _stores: &AppStores) -> ModalOutcome {
        let encryption = match self.choice {
            EncryptionChoice::None => SendEncryption::None,
            EncryptionChoice::PublicKey => SendEncryption::PublicKey,
            EncryptionChoice::Password if self.password.value().is_empty() => {
                self.error = Some("Password is required".to_owned());
                return ModalOutcome::Stay;
            }
            EncryptionChoice::Password => {
                SendEncryption::Password(self.password.value().to_owned())
            }
        };
        ModalOutcome::Open {
            kind: ModalKind::ConfirmSend,
            data: ModalData::SendPlan {
                peer: self.peer.clone(),
                file_path: self.file_path.clone(),
                encryption,
            },
        }
    }

    fn next_field(&mut self) {
        self.focus = cycle(self.focus, 2, true);
    }

    fn prev_field(&mut self) {
        self.focus = cycle(self.focus, 2, false);
    }

    fn input(&mut self, chord: &KeyChord) -> bool {
        if self.focus == 0 {
            if chord.has_modifiers() {
                return false;
            }
            return match chord.key.as_str() {
                "left" => {
                    self.choice = self.choice.shift(false);
                    true
                }
                "right" => {
                    self.choice = self.choice.shift(true);
                    true
                }
                _ => false,
            };
        }
        if self.choice != EncryptionChoice::Password {
            return false;
        }
        let consumed = self.password.edit(chord);
        if consumed {
            self.error = None;
        }
        consumed
    }

    fn view(&self) -> ModalView {
        let selector = EncryptionChoice::ALL
            .iter()
            .map(|choice| {
                if *choice == self.choice {
                    format!("[{}]", choice.label())
                } else {
                    format!(" {} ", choice.label())
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let mut fields = vec![FieldView {
            label: "Method",
            value: selector,
            focused: self.focus == 0,
        }];
        if self.choice == EncryptionChoice::Password {
            fields.push(FieldView {
                label: "Password",
                value: "*".repeat(self.password.value().chars().count()),
                focused: self.focus == 1,
            });
        }
        ModalView {
            title: "Encryption".to_owned(),
            body: vec![format!("File: {}", self.file_path)],
            fields,
            error: self.error.clone(),
            hint: "←/→ method · Tab next field · Enter continue · Esc cancel",
        }
    }
}

#[derive(Debug)]
pub struct ConfirmSendPrompt {
    peer: Peer,
    file_path: String,
    encryption: SendEncryption,
}

impl ModalHandlers for ConfirmSendPrompt {
    fn kind(&self) -> ModalKind {
        ModalKind::ConfirmSend
    }

    fn confirm(&mut self, _stores: &AppStores) -> ModalOutcome {
        ModalOutcome::Run(ModalTask::Send {
            peer: self.peer.clone(),
            file_path: self.file_path.clone(),
            encryption: self.encryption.clone(),
        })
    }

    fn view(&self) -> ModalView {
        ModalView {
            title: "Confirm Send".to_owned(),
            body: vec![
                format!("File: {}", self.file_path),
                format!("To: {}", self.peer.display_name()),
                format!("Encryption: {}", self.encryption.label()),
            ],
            fields: Vec::new(),
            error: None,
            hint: "Enter send · Esc cancel",
        }
    }
}

#[derive(Debug)]
pub struct ReceiveRequestPrompt {
    request: IncomingRequest,
}

impl ModalHandlers for ReceiveRequestPrompt {
    fn kind(&self) -> ModalKind {
        ModalKind::ReceiveRequest
    }

    fn confirm(&mut self, _stores: &AppStores) -> ModalOutcome {
        ModalOutcome::Open {
            kind: ModalKind::SaveLocation,
            data: ModalData::Request(self.request.clone()),
        }
    }

    fn cancel(&mut self, _stores: &AppStores) -> ModalOutcome {
        ModalOutcome::Run(ModalTask::DeclineRequest(self.request.id.clone()))
    }

    fn view(&self) -> ModalView {
        ModalView {
            title: "Incoming File".to_owned(),
            body: vec![
                format!("From: {}", self.request.peer_id),
                format!("Fingerprint: {}", self.request.peer_fingerprint),
                format!(
                    "File: {} ({})",
                    self.request.file_name,
                    crate::render::format_size(self.request.file_size)
                ),
            ],
            fields: Vec::new(),
            error: None,
            hint: "Enter accept · Esc decline",
        }
    }
}

#[derive(Debug)]
pub struct SaveLocationForm {
    request: IncomingRequest,
    path: TextField,
    error: Option<String>,
}

impl SaveLocationForm {
    fn new(request: IncomingRequest, default_dir: &Path) -> Self {
        Self {
            request,
            path: TextField::with_value(default_dir.to_string_lossy()),
            error: None,
        }
    }
}

impl ModalHandlers for SaveLocationForm {
    fn kind(&self) -> ModalKind {
        ModalKind::SaveLocation
    }

    fn confirm(&mut self, _stores: &AppStores) -> ModalOutcome {
        let path = self.path.value().trim();
        if path.is_empty() {
            self.error = Some("Save location is required".to_owned());
            return ModalOutcome::Stay;
        }
        ModalOutcome::Run(ModalTask::AcceptRequest {
            request: self.request.clone(),
            save_dir: PathBuf::from(path),
        })
    }

    fn input(&mut self, chord: &KeyChord) -> bool {
        let consumed = self.path.edit(chord);
        if consumed {
            self.error = None;
        }
        consumed
    }

    fn view(&self) -> ModalView {
        ModalView {
            title: "Save Location".to_owned(),
            body: vec![format!("File: {}", self.request.file_name)],
            fields: vec![FieldView {
                label: "Directory",
                value: self.path.value().to_owned(),
                focused: true,
            }],
            error: self.error.clone(),
            hint: "Enter accept · Esc cancel",
        }
    }
}

#[derive(Debug)]
pub struct DecryptFileForm {
    file_name: String,
    file_path: String,
    use_password: bool,
    password: TextField,
    focus: usize,
    error: Option<String>,
}

impl DecryptFileForm {
    fn new(file_name: String, file_path: String) -> Self {
        Self {
            file_name,
            file_path,
            use_password: false,
            password: TextField::default(),
            focus: 0,
            error: None,
        }
    }
}

impl ModalHandlers for DecryptFileForm {
    fn kind(&self) -> ModalKind {
        ModalKind::DecryptFile
    }

    fn confirm(&mut self, _stores: &AppStores) -> ModalOutcome {
        let method = if self.use_password {
            if self.password.value().is_empty() {
                self.error = Some("Password is required".to_owned());
                return ModalOutcome::Stay;
            }
            DecryptMethod::Password(self.password.value().to_owned())
        } else {
            DecryptMethod::DeviceKey
        };
        ModalOutcome::Run(ModalTask::Decrypt {
            file_path: self.file_path.clone(),
            method,
        })
    }

    fn next_field(&mut self) {
        self.focus = cycle(self.focus, 2, true);
    }

    fn prev_field(&mut self) {
        self.focus = cycle(self.focus, 2, false);
    }

    fn input(&mut self, chord: &KeyChord) -> bool {
        if self.focus == 0 {
            let toggles = !chord.has_modifiers()
                && matches!(chord.key.as_str(), "left" | "right" | "space");
            if toggles {
                self.use_password = !self.use_password;
            }
            return toggles;
        }
        if !self.use_password {
            return false;
        }
        let consumed = self.password.edit(chord);
        if consumed {
            self.error = None;
        }
        consumed
    }

    fn view(&self) -> ModalView {
        let method = if self.use_password {
            " Device key  [Password]"
        } else {
            "[Device key]  Password "
        };
        let mut fields = vec![FieldView {
            label: "Method",
            value: method.to_owned(),
            focused: self.focus == 0,
        }];
        if self.use_password {
            fields.push(FieldView {
                label: "Password",
                value: "*".repeat(self.password.value().chars().count()),
                focused: self.focus == 1,
            });
        }
        ModalView {
            title: "Decrypt File".to_owned(),
            body: vec![format!("File: {}", self.file_name)],
            fields,
            error: self.error.clone(),
            hint: "←/→ method · Tab next field · Enter decrypt · Esc cancel",
        }
    }
}

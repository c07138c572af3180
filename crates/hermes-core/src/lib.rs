//! Domain state and effectful workflows behind the Hermes terminal UI.
//!
//! State lives in [`StateCell`]s bundled into [`AppStores`]. Everything that
//! mutates state, from key handlers to the receive listener, goes through a
//! shared `Arc<AppStores>`.

mod cell;
mod crypto;
mod error;
mod history;
mod receive;
mod reducer;
mod state;
mod stores;
mod types;
mod workflows;

pub use cell::StateCell;
pub use crypto::{
    fingerprint_of, parse_ed25519_public_key, read_device_secret_key, sha256_file, ParsedPublicKey,
    ValidationError,
};
pub use error::{CoreError, CoreResult};
pub use history::{HistoryStore, JsonFileHistoryStore};
pub use receive::ReceiveController;
pub use reducer::{ReceiveReducer, PROVISIONAL_FILE_NAME, UNKNOWN_PEER};
pub use state::{
    ActivityEntry, ActivityItem, ActivityKind, ActivitySections, ActivityState, FocusState,
    IdentityNotice, IdentityState, ModalState, NavigationState, PeersState, ReceiveState, Toast,
    ToastState, TransfersState, NOTICE_DURATION, TOAST_DURATION,
};
pub use stores::AppStores;
pub use types::{
    DecryptMethod, Identity, IncomingRequest, ModalData, ModalKind, Pane, Peer, ReceiveStatus,
    Section, SendEncryption, ToastTone, Transfer, TransferDirection, TransferStatus, TrustLevel,
};
pub use workflows::{Clipboard, Services, Workflows};

use std::path::PathBuf;
use std::time::Instant;

use crate::{
    ActivitySections, ActivityState, FocusState, IdentityState, ModalState, NavigationState,
    PeersState, ReceiveState, StateCell, ToastState, ToastTone, TransfersState,
};

/// Every state container of one running instance.
#[derive(Debug, Default)]
pub struct AppStores {
    pub identity: StateCell<IdentityState>,
    pub peers: StateCell<PeersState>,
    pub transfers: StateCell<TransfersState>,
    pub receive: StateCell<ReceiveState>,
    pub modal: StateCell<ModalState>,
    pub navigation: StateCell<NavigationState>,
    pub focus: StateCell<FocusState>,
    pub activity: StateCell<ActivityState>,
    pub toast: StateCell<ToastState>,
}

impl AppStores {
    pub fn new(default_save_path: PathBuf) -> Self {
        Self {
            receive: StateCell::new(ReceiveState::new(default_save_path)),
            ..Self::default()
        }
    }

    /// Sum of all cell versions; changes whenever any container was written.
    pub fn version(&self) -> u64 {
        self.identity.version()
            + self.peers.version()
            + self.transfers.version()
            + self.receive.version()
            + self.modal.version()
            + self.navigation.version()
            + self.focus.version()
            + self.activity.version()
            + self.toast.version()
    }

    pub fn has_identity(&self) -> bool {
        self.identity.with(IdentityState::has_identity)
    }

    pub fn is_listening(&self) -> bool {
        self.receive.with(ReceiveState::is_listening)
    }

    pub fn activity_sections(&self) -> ActivitySections {
        let requests = self.receive.with(|receive| receive.incoming_requests.clone());
        self.transfers
            .with(|transfers| ActivitySections::build(&requests, &transfers.transfers))
    }

    /// Re-anchors the activity selection after requests or transfers changed.
    pub fn sync_activity_selection(&self) {
        let items = self.activity_sections().items();
        let stale = self.activity.with(|activity| {
            let mut probe = activity.clone();
            probe.sync_selection(&items)
        });
        if stale {
            self.activity.update(|activity| {
                activity.sync_selection(&items);
            });
        }
    }

    pub fn show_toast(&self, message: impl Into<String>, tone: ToastTone) {
        let message = message.into();
        self.toast
            .update(|toast| toast.show(message, tone, Instant::now()));
    }

    pub fn show_error_modal(&self, message: impl Into<String>) {
        let message = message.into();
        self.modal.update(|modal| modal.error(message));
    }

    /// Expires toasts and identity notices. Returns whether anything was dropped.
    pub fn expire_timed(&self, now: Instant) -> bool {
        let toast_due = self
            .toast
            .with(|toast| toast.current.as_ref().is_some_and(|t| t.expires_at <= now));
        if toast_due {
            self.toast.update(|toast| toast.expire(now));
        }
        let notice_due = self.identity.with(|identity| {
            identity
                .notice
                .as_ref()
                .is_some_and(|notice| notice.expires_at <= now)
        });
        if notice_due {
            self.identity.update(|identity| identity.expire_notice(now));
        }
        toast_due || notice_due
    }
}

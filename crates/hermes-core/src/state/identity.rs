use std::time::{Duration, Instant};

use crate::{Identity, ToastTone};

pub const NOTICE_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityNotice {
    pub message: String,
    pub tone: ToastTone,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    pub identity: Option<Identity>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub notice: Option<IdentityNotice>,
}

impl IdentityState {
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn set_loading(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
        self.is_loading = false;
        self.error = None;
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.is_loading = false;
        self.error = Some(error.into());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn show_notice(&mut self, message: impl Into<String>, tone: ToastTone, now: Instant) {
        self.notice = Some(IdentityNotice {
            message: message.into(),
            tone,
            expires_at: now + NOTICE_DURATION,
        });
    }

    /// Drops an expired notice. Returns whether anything changed.
    pub fn expire_notice(&mut self, now: Instant) -> bool {
        if self.notice.as_ref().is_some_and(|notice| notice.expires_at <= now) {
            self.notice = None;
            return true;
        }
        false
    }
}

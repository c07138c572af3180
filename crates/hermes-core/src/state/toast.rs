use std::time::{Duration, Instant};

use crate::ToastTone;

pub const TOAST_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub tone: ToastTone,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToastState {
    pub current: Option<Toast>,
}

impl ToastState {
    pub fn show(&mut self, message: impl Into<String>, tone: ToastTone, now: Instant) {
        self.current = Some(Toast {
            message: message.into(),
            tone,
            expires_at: now + TOAST_DURATION,
        });
    }

    /// Drops an expired toast. Returns whether anything changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.current.as_ref().is_some_and(|toast| toast.expires_at <= now) {
            self.current = None;
            return true;
        }
        false
    }
}

//! Plain state structs held by the cells in [`crate::AppStores`].
//!
//! Every mutation is a method on the struct, applied through
//! [`crate::StateCell::update`], so the transitions stay testable without
//! any cell or runtime.

mod activity;
mod identity;
mod modal;
mod navigation;
mod peers;
mod receive;
mod toast;
mod transfers;

pub use activity::{ActivityEntry, ActivityItem, ActivityKind, ActivitySections, ActivityState};
pub use identity::{IdentityNotice, IdentityState, NOTICE_DURATION};
pub use modal::ModalState;
pub use navigation::{FocusState, NavigationState};
pub use peers::PeersState;
pub use receive::ReceiveState;
pub use toast::{Toast, ToastState, TOAST_DURATION};
pub use transfers::TransfersState;

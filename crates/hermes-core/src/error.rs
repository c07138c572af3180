use hermes_ipc::IpcError;
use thiserror::Error;

use crate::ValidationError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("{0}")]
    Message(String),
}

impl CoreError {
    /// Text suitable for a toast or error modal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Ipc(error) => error.user_message(),
            other => other.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

use thiserror::Error;

use crate::Binary;

/// Error codes synthesized on this side of the process boundary. Codes reported
/// by the engines themselves are passed through verbatim.
pub mod codes {
    pub const NO_IDENTITY: &str = "no_identity";
    pub const MISSING_OPTION: &str = "missing_option";
    pub const MISSING_EVENT: &str = "missing_event";
    pub const MISSING_DONE: &str = "missing_done";
    pub const TRANSFER_INCOMPLETE: &str = "transfer_incomplete";
    pub const SPAWN_ERROR: &str = "spawn_error";
    pub const TIMEOUT: &str = "timeout";
    pub const UNKNOWN: &str = "unknown";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpcError {
    #[error("{binary} binary not found at {path}")]
    BinaryNotFound { binary: Binary, path: String },
    #[error("{binary} failed with {code}: {message}")]
    BinaryExecution {
        binary: Binary,
        code: String,
        message: String,
    },
    #[error("{binary} produced malformed JSON ({error}): {line}")]
    JsonParse {
        binary: Binary,
        line: String,
        error: String,
    },
}

pub type IpcResult<T> = Result<T, IpcError>;

impl IpcError {
    pub fn execution(binary: Binary, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BinaryExecution {
            binary,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn json(binary: Binary, line: impl Into<String>, error: impl ToString) -> Self {
        Self::JsonParse {
            binary,
            line: line.into(),
            error: error.to_string(),
        }
    }

    pub fn binary(&self) -> Binary {
        match self {
            Self::BinaryNotFound { binary, .. }
            | Self::BinaryExecution { binary, .. }
            | Self::JsonParse { binary, .. } => *binary,
        }
    }

    /// Execution error code, if this is a [`IpcError::BinaryExecution`].
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::BinaryExecution { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn has_code(&self, expected: &str) -> bool {
        self.code() == Some(expected)
    }

    /// Short text suitable for a toast or error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::BinaryNotFound { binary, path } => {
                format!("{binary} binary not found at {path}")
            }
            Self::BinaryExecution { message, .. } => message.clone(),
            Self::JsonParse { binary, error, .. } => {
                format!("Invalid output from {binary}: {error}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_engine_message_for_execution_errors() {
        let error = IpcError::execution(Binary::Zend, "peer_not_found", "Peer 'bob' not found");
        assert_eq!(error.user_message(), "Peer 'bob' not found");
        assert!(error.has_code("peer_not_found"));
        assert_eq!(error.binary(), Binary::Zend);
    }

    #[test]
    fn not_found_message_names_binary_and_path() {
        let error = IpcError::BinaryNotFound {
            binary: Binary::Zenc,
            path: "/opt/hermes/bin/zenc".to_owned(),
        };
        assert_eq!(
            error.user_message(),
            "zenc binary not found at /opt/hermes/bin/zenc"
        );
        assert_eq!(error.code(), None);
    }
}

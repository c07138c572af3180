//! Subprocess bridge to the `zend` transport engine and the `zenc` encryption engine.
//!
//! Both engines speak line-delimited JSON on stdout. One-shot invocations run to
//! completion through [`OneShotRunner`]; the long-lived `zend receive` listener is
//! owned by [`StreamBridge`] and surfaces its output as a cancellable event stream.

mod binary;
mod error;
mod event;
mod launcher;
mod parse;
mod runner;
mod stream;
mod zenc;
mod zend;

pub use binary::{Binary, BinaryPaths};
pub use error::{codes, IpcError, IpcResult};
pub use event::{event_kind, IpcEvent, PeerRecord};
pub use launcher::{ProcessLauncher, ProcessOutput, ProcessRequest, TokioProcessLauncher};
pub use parse::{exit_failure, parse_output, salvage_output};
pub use runner::{CollectedOutput, OneShotRunner};
pub use stream::{ListenerKiller, ReceiveHandle, StreamBridge};
pub use zenc::{
    DecryptOptions, DecryptResult, EncryptOptions, EncryptResult, EncryptionMethod, KeyPair,
    ZencService,
};
pub use zend::{
    AddPeerResult, IdentityInfo, PeerInfo, PeerTrustSetting, ProgressSample, ReceiveOptions,
    SendResult, ZendService, DEFAULT_RECEIVE_PORT, DEFAULT_SEND_TIMEOUT,
};

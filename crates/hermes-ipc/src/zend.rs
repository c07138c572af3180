use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::codes;
use crate::{
    Binary, IpcError, IpcEvent, IpcResult, OneShotRunner, ProcessLauncher, ProcessRequest,
    ReceiveHandle, StreamBridge,
};

pub const DEFAULT_RECEIVE_PORT: u16 = 7654;
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityInfo {
    pub public_key: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub name: String,
    pub public_key: String,
    pub address: String,
    pub fingerprint: String,
    pub trust: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPeerResult {
    pub name: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerTrustSetting {
    Trusted,
    Blocked,
}

impl PeerTrustSetting {
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub bytes: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendResult {
    pub file: String,
    pub hash: String,
    pub peer: String,
    pub progress: Vec<ProgressSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub port: Option<u16>,
    pub output_dir: Option<PathBuf>,
}

impl ReceiveOptions {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["receive".to_owned()];
        if let Some(port) = self.port {
            args.push("--port".to_owned());
            args.push(port.to_string());
        }
        if let Some(output_dir) = self.output_dir.as_ref() {
            args.push("--output-dir".to_owned());
            args.push(output_dir.display().to_string());
        }
        args
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_RECEIVE_PORT)
    }
}

/// Identity, peer and transport operations backed by the `zend` binary.
pub struct ZendService {
    runner: OneShotRunner,
    bridge: StreamBridge,
    send_timeout: Duration,
}

impl ZendService {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            runner: OneShotRunner::new(Arc::clone(&launcher)),
            bridge: StreamBridge::new(launcher, Binary::Zend),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub async fn init_identity(&self) -> IpcResult<IdentityInfo> {
        let event = self
            .runner
            .first_of_type(request(["id", "init"]), "identity_created")
            .await?;
        identity_from_event(event)
    }

    /// Existing identity; fails with `no_identity` when none has been created.
    pub async fn show_identity(&self) -> IpcResult<IdentityInfo> {
        let collected = self.runner.collect_all(request(["id", "show"])).await?;
        for kind in ["identity_loaded", "identity_created"] {
            if let Some(event) = collected.first_of_type(kind)? {
                return identity_from_event(event);
            }
        }
        Err(IpcError::execution(
            Binary::Zend,
            codes::NO_IDENTITY,
            "No identity found. Run 'zend id init' first.",
        ))
    }

    pub async fn add_peer(
        &self,
        name: &str,
        public_key: &str,
        address: &str,
    ) -> IpcResult<AddPeerResult> {
        let event = self
            .runner
            .first_of_type(request(["peer", "add", name, public_key, address]), "peer_added")
            .await?;
        match event {
            IpcEvent::PeerAdded { name, fingerprint } => Ok(AddPeerResult { name, fingerprint }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn remove_peer(&self, name: &str) -> IpcResult<String> {
        let event = self
            .runner
            .first_of_type(request(["peer", "remove", name]), "peer_removed")
            .await?;
        match event {
            IpcEvent::PeerRemoved { name } => Ok(name),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set_peer_trust(&self, name: &str, trust: PeerTrustSetting) -> IpcResult<String> {
        let event = self
            .runner
            .first_of_type(
                request(["peer", "trust", name, trust.as_arg()]),
                "peer_trust_updated",
            )
            .await?;
        match event {
            IpcEvent::PeerTrustUpdated { trust, .. } => Ok(trust),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_peers(&self) -> IpcResult<Vec<PeerInfo>> {
        let event = self
            .runner
            .first_of_type(request(["peer", "list"]), "peer_list")
            .await?;
        let IpcEvent::PeerList { peers } = event else {
            return Err(unexpected(event));
        };
        Ok(peers
            .into_iter()
            .map(|peer| PeerInfo {
                name: peer.name,
                public_key: peer.public_key,
                address: peer.address,
                fingerprint: peer.fingerprint,
                trust: peer.trust,
            })
            .collect())
    }

    pub async fn send_file(&self, file_path: &str, peer_name: &str) -> IpcResult<SendResult> {
        let collected = self
            .runner
            .collect_all(request(["send", file_path, peer_name]).with_timeout(self.send_timeout))
            .await?;

        let mut progress = Vec::new();
        let mut completed = None;
        for event in collected.typed_events()? {
            match event {
                IpcEvent::Progress { bytes, percent } => {
                    progress.push(ProgressSample { bytes, percent })
                }
                IpcEvent::TransferComplete { file, hash } if completed.is_none() => {
                    completed = Some((file, hash));
                }
                _ => {}
            }
        }

        let Some((file, hash)) = completed else {
            return Err(IpcError::execution(
                Binary::Zend,
                codes::TRANSFER_INCOMPLETE,
                "File transfer did not complete successfully",
            ));
        };
        Ok(SendResult {
            file,
            hash,
            peer: peer_name.to_owned(),
            progress,
        })
    }

    /// Starts `zend receive`, replacing any listener that is already running.
    pub async fn start_receiving(&self, options: &ReceiveOptions) -> IpcResult<ReceiveHandle> {
        self.bridge.start(options.args()).await
    }

    pub async fn stop_receiving(&self) -> bool {
        self.bridge.stop().await
    }

    pub async fn is_receiving(&self) -> bool {
        self.bridge.is_running().await
    }
}

fn request<const N: usize>(args: [&str; N]) -> ProcessRequest {
    ProcessRequest::new(Binary::Zend, args)
}

fn identity_from_event(event: IpcEvent) -> IpcResult<IdentityInfo> {
    match event {
        IpcEvent::IdentityCreated {
            public_key,
            fingerprint,
        }
        | IpcEvent::IdentityLoaded {
            public_key,
            fingerprint,
        } => Ok(IdentityInfo {
            public_key,
            fingerprint,
        }),
        other => Err(unexpected(other)),
    }
}

fn unexpected(event: IpcEvent) -> IpcError {
    IpcError::execution(
        Binary::Zend,
        codes::MISSING_EVENT,
        format!("Unexpected '{}' event in output", event.kind()),
    )
}

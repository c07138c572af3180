use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::codes;
use crate::launcher::spawn_failure;
use crate::{Binary, IpcError, IpcEvent, IpcResult, ProcessLauncher};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Owns the single long-running listener process of one engine.
pub struct StreamBridge {
    launcher: Arc<dyn ProcessLauncher>,
    binary: Binary,
    active: AsyncMutex<Option<ListenerSession>>,
    next_session_id: AtomicU64,
}

struct ListenerSession {
    session_id: u64,
    cancel: CancellationToken,
    producer: JoinHandle<()>,
}

impl ListenerSession {
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(error) = self.producer.await {
            tracing::warn!(session_id = self.session_id, error = %error, "listener task ended abnormally");
        }
    }
}

/// Consumer side of one listener session.
///
/// `next_event` yields `Ok(Some(_))` per decoded event and `Ok(None)` once the
/// session was killed. A listener that dies on its own or prints malformed JSON
/// ends the sequence with `Err(IpcError::JsonParse { .. })`.
pub struct ReceiveHandle {
    session_id: u64,
    receiver: mpsc::Receiver<IpcResult<IpcEvent>>,
    killer: ListenerKiller,
    finished: bool,
}

/// Cloneable termination switch for one listener session.
#[derive(Debug, Clone)]
pub struct ListenerKiller {
    cancel: CancellationToken,
}

impl ListenerKiller {
    pub fn kill(&self) {
        self.cancel.cancel();
    }

    pub fn is_killed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl ReceiveHandle {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn killer(&self) -> ListenerKiller {
        self.killer.clone()
    }

    pub fn kill(&self) {
        self.killer.kill();
    }

    pub async fn next_event(&mut self) -> IpcResult<Option<IpcEvent>> {
        if self.finished {
            return Ok(None);
        }
        match self.receiver.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(error)) => {
                self.finished = true;
                Err(error)
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }
}

impl StreamBridge {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, binary: Binary) -> Self {
        Self {
            launcher,
            binary,
            active: AsyncMutex::new(None),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Spawns the listener. A session that is still running is terminated and
    /// reaped before the new process starts.
    pub async fn start(&self, args: Vec<String>) -> IpcResult<ReceiveHandle> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            tracing::info!(binary = %self.binary, session_id = previous.session_id, "replacing running listener");
            previous.shutdown().await;
        }

        let path = self.launcher.binary_path(self.binary)?;
        let mut command = Command::new(&path);
        command.args(&args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|error| spawn_failure(self.binary, &path, error))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            IpcError::execution(
                self.binary,
                codes::SPAWN_ERROR,
                format!("{} listener stdout unavailable", self.binary),
            )
        })?;
        let stderr = child.stderr.take();

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let producer = tokio::spawn(run_listener_loop(
            self.binary,
            session_id,
            child,
            stdout,
            stderr,
            sender,
            cancel.clone(),
        ));
        tracing::info!(binary = %self.binary, session_id, args = ?args, "listener started");

        *active = Some(ListenerSession {
            session_id,
            cancel: cancel.clone(),
            producer,
        });

        Ok(ReceiveHandle {
            session_id,
            receiver,
            killer: ListenerKiller { cancel },
            finished: false,
        })
    }

    /// Terminates the running listener, if any. Returns whether one was running.
    pub async fn stop(&self) -> bool {
        let session = self.active.lock().await.take();
        match session {
            Some(session) => {
                tracing::info!(binary = %self.binary, session_id = session.session_id, "stopping listener");
                session.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| !session.producer.is_finished())
    }
}

enum ListenerExit {
    Killed,
    Abandoned,
    Failed(IpcError),
}

async fn run_listener_loop(
    binary: Binary,
    session_id: u64,
    mut child: Child,
    stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    sender: mpsc::Sender<IpcResult<IpcEvent>>,
    cancel: CancellationToken,
) {
    if let Some(stderr) = stderr {
        tokio::spawn(drain_stderr(binary, session_id, stderr));
    }

    let mut lines = BufReader::new(stdout).lines();
    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ListenerExit::Killed,
            line = lines.next_line() => line,
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break ListenerExit::Failed(IpcError::json(binary, "", "listener closed stdout")),
            Err(error) => break ListenerExit::Failed(IpcError::json(binary, "", error)),
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match IpcEvent::from_line(binary, line.as_str()) {
            Ok(event) => event,
            Err(error) => break ListenerExit::Failed(error),
        };
        tracing::debug!(binary = %binary, session_id, event = event.kind(), "listener event");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break ListenerExit::Killed,
            sent = sender.send(Ok(event)) => {
                if sent.is_err() {
                    break ListenerExit::Abandoned;
                }
            }
        }
    };

    let _ = child.start_kill();
    let _ = child.wait().await;

    match exit {
        ListenerExit::Killed => {
            tracing::info!(binary = %binary, session_id, "listener killed");
        }
        ListenerExit::Abandoned => {
            tracing::debug!(binary = %binary, session_id, "listener consumer dropped");
        }
        ListenerExit::Failed(error) => {
            tracing::warn!(binary = %binary, session_id, error = %error, "listener stream failed");
            let _ = sender.send(Err(error)).await;
        }
    }
}

async fn drain_stderr(binary: Binary, session_id: u64, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            tracing::debug!(binary = %binary, session_id, line = line.as_str(), "listener stderr");
        }
    }
}

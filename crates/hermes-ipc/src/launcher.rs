use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::codes;
use crate::{Binary, BinaryPaths, IpcError, IpcResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub binary: Binary,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

impl ProcessRequest {
    pub fn new<I, S>(binary: Binary, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            binary,
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            timeout: None,
        }
    }

    pub fn with_stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Path the binary will be launched from. Fails when nothing exists there.
    fn binary_path(&self, binary: Binary) -> IpcResult<PathBuf>;

    /// Runs the process to completion and captures its output.
    async fn run(&self, request: ProcessRequest) -> IpcResult<ProcessOutput>;
}

#[derive(Debug, Clone, Default)]
pub struct TokioProcessLauncher {
    paths: BinaryPaths,
}

impl TokioProcessLauncher {
    pub fn new(paths: BinaryPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &BinaryPaths {
        &self.paths
    }
}

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    fn binary_path(&self, binary: Binary) -> IpcResult<PathBuf> {
        let path = self.paths.path(binary);
        if !path.exists() {
            return Err(IpcError::BinaryNotFound {
                binary,
                path: path.display().to_string(),
            });
        }
        Ok(path.to_path_buf())
    }

    async fn run(&self, request: ProcessRequest) -> IpcResult<ProcessOutput> {
        let path = self.binary_path(request.binary)?;
        let binary = request.binary;

        let mut command = Command::new(&path);
        command.args(&request.args);
        command.stdin(if request.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        tracing::debug!(binary = %binary, args = ?request.args, "spawning engine process");
        let mut child = command
            .spawn()
            .map_err(|error| spawn_failure(binary, &path, error))?;

        if let Some(payload) = request.stdin.as_deref() {
            if let Some(mut stdin) = child.stdin.take() {
                // A process may exit without draining stdin; its exit status
                // carries the real outcome in that case.
                if let Err(error) = stdin.write_all(payload.as_bytes()).await {
                    tracing::warn!(binary = %binary, error = %error, "failed to write engine stdin");
                }
                let _ = stdin.shutdown().await;
            }
        }

        let completion = child.wait_with_output();
        let output = match request.timeout {
            Some(limit) => match tokio::time::timeout(limit, completion).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(binary = %binary, timeout_secs = limit.as_secs(), "engine process timed out");
                    return Err(IpcError::execution(
                        binary,
                        codes::TIMEOUT,
                        format!("{binary} timed out after {}s", limit.as_secs()),
                    ));
                }
            },
            None => completion.await,
        }
        .map_err(|error| spawn_failure(binary, &path, error))?;

        let exit_code = output.status.code().unwrap_or(-1);
        tracing::debug!(binary = %binary, exit_code, "engine process exited");
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}

pub(crate) fn spawn_failure(binary: Binary, path: &Path, error: io::Error) -> IpcError {
    IpcError::execution(
        binary,
        codes::SPAWN_ERROR,
        format!("failed to run {binary} at '{}': {error}", path.display()),
    )
}

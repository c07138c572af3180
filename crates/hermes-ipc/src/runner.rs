use std::sync::Arc;

use serde_json::Value;

use crate::error::codes;
use crate::parse::error_from_event;
use crate::{
    event_kind, exit_failure, parse_output, salvage_output, Binary, IpcError, IpcEvent, IpcResult,
    ProcessLauncher, ProcessRequest,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedOutput {
    pub binary: Binary,
    pub events: Vec<Value>,
    pub exit_code: i32,
}

impl CollectedOutput {
    /// Decodes the first event with the given discriminant, if any.
    pub fn first_of_type(&self, kind: &str) -> IpcResult<Option<IpcEvent>> {
        self.events
            .iter()
            .find(|event| event_kind(event) == Some(kind))
            .map(|event| IpcEvent::from_value(self.binary, event))
            .transpose()
    }

    pub fn typed_events(&self) -> IpcResult<Vec<IpcEvent>> {
        self.events
            .iter()
            .map(|event| IpcEvent::from_value(self.binary, event))
            .collect()
    }
}

/// Runs engine invocations to completion. No call is retried here.
#[derive(Clone)]
pub struct OneShotRunner {
    launcher: Arc<dyn ProcessLauncher>,
}

impl OneShotRunner {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &Arc<dyn ProcessLauncher> {
        &self.launcher
    }

    pub async fn collect_all(&self, request: ProcessRequest) -> IpcResult<CollectedOutput> {
        let binary = request.binary;
        let output = self.launcher.run(request).await?;

        if output.exit_code != 0 {
            // A malformed line must not hide an error event printed before it.
            let events = salvage_output(&output.stdout);
            let error = exit_failure(binary, &events, &output.stderr, output.exit_code);
            tracing::warn!(binary = %binary, exit_code = output.exit_code, error = %error, "engine call failed");
            return Err(error);
        }

        let events = parse_output(binary, &output.stdout)?;
        Ok(CollectedOutput {
            binary,
            events,
            exit_code: output.exit_code,
        })
    }

    pub async fn first_of_type(&self, request: ProcessRequest, kind: &str) -> IpcResult<IpcEvent> {
        let binary = request.binary;
        let collected = self.collect_all(request).await?;
        collected.first_of_type(kind)?.ok_or_else(|| {
            IpcError::execution(
                binary,
                codes::MISSING_EVENT,
                format!("Expected event '{kind}' not found in output"),
            )
        })
    }

    /// Last `done` event, or the first reported `error` when no `done` exists.
    pub async fn terminal(&self, request: ProcessRequest) -> IpcResult<IpcEvent> {
        let binary = request.binary;
        let collected = self.collect_all(request).await?;

        if let Some(done) = collected
            .events
            .iter()
            .rev()
            .find(|event| event_kind(event) == Some("done"))
        {
            return IpcEvent::from_value(binary, done);
        }

        if let Some(error) = collected
            .events
            .iter()
            .find(|event| event_kind(event) == Some("error"))
        {
            return Err(error_from_event(binary, error));
        }

        Err(IpcError::execution(
            binary,
            codes::MISSING_DONE,
            "Expected 'done' event not found in output",
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ProcessOutput;

    struct ScriptedLauncher {
        output: ProcessOutput,
        requests: Mutex<Vec<ProcessRequest>>,
    }

    impl ScriptedLauncher {
        fn new(stdout: &str, stderr: &str, exit_code: i32) -> Arc<Self> {
            Arc::new(Self {
                output: ProcessOutput {
                    stdout: stdout.to_owned(),
                    stderr: stderr.to_owned(),
                    exit_code,
                },
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProcessLauncher for ScriptedLauncher {
        fn binary_path(&self, binary: Binary) -> IpcResult<std::path::PathBuf> {
            Ok(std::path::PathBuf::from(binary.name()))
        }

        async fn run(&self, request: ProcessRequest) -> IpcResult<ProcessOutput> {
            self.requests.lock().expect("requests lock").push(request);
            Ok(self.output.clone())
        }
    }

    fn runner(launcher: Arc<ScriptedLauncher>) -> OneShotRunner {
        OneShotRunner::new(launcher)
    }

    #[tokio::test]
    async fn collect_all_returns_events_and_exit_code() {
        let launcher = ScriptedLauncher::new(
            "{\"event\":\"done\",\"output\":\"x\",\"hash\":\"h\"}\n",
            "",
            0,
        );
        let collected = runner(launcher.clone())
            .collect_all(ProcessRequest::new(Binary::Zenc, ["encrypt", "a.txt"]))
            .await
            .expect("collect");

        assert_eq!(collected.events.len(), 1);
        assert_eq!(collected.exit_code, 0);
        let requests = launcher.requests.lock().expect("requests lock");
        assert_eq!(requests[0].args, vec!["encrypt".to_owned(), "a.txt".to_owned()]);
    }

    #[tokio::test]
    async fn non_zero_exit_with_garbage_stdout_reports_exit_error() {
        let launcher = ScriptedLauncher::new("panic: oh no", "segfault", 139);
        let error = runner(launcher)
            .collect_all(ProcessRequest::new(Binary::Zend, ["peer", "list"]))
            .await
            .expect_err("non-zero exit");
        assert_eq!(error, IpcError::execution(Binary::Zend, "exit_139", "segfault"));
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_error_event_before_garbage() {
        let launcher = ScriptedLauncher::new(
            "{\"event\":\"error\",\"code\":\"peer_offline\",\"message\":\"Peer is offline\"}\npanic: connection reset\n",
            "segfault",
            1,
        );
        let error = runner(launcher)
            .collect_all(ProcessRequest::new(Binary::Zend, ["send", "a.txt", "bob"]))
            .await
            .expect_err("non-zero exit");
        assert_eq!(
            error,
            IpcError::execution(Binary::Zend, "peer_offline", "Peer is offline")
        );
    }

    #[tokio::test]
    async fn first_of_type_reports_missing_event() {
        let launcher = ScriptedLauncher::new("{\"event\":\"listening\",\"port\":1}\n", "", 0);
        let error = runner(launcher)
            .first_of_type(ProcessRequest::new(Binary::Zend, ["id", "init"]), "identity_created")
            .await
            .expect_err("missing");
        assert_eq!(
            error,
            IpcError::execution(
                Binary::Zend,
                "missing_event",
                "Expected event 'identity_created' not found in output"
            )
        );
    }

    #[tokio::test]
    async fn terminal_takes_last_done_event() {
        let launcher = ScriptedLauncher::new(
            "{\"event\":\"done\",\"output\":\"first\",\"hash\":\"1\"}\n{\"event\":\"progress\",\"bytes\":1,\"percent\":1}\n{\"event\":\"done\",\"output\":\"second\",\"hash\":\"2\"}\n",
            "",
            0,
        );
        let done = runner(launcher)
            .terminal(ProcessRequest::new(Binary::Zenc, ["decrypt", "a.zenc"]))
            .await
            .expect("terminal");
        assert_eq!(
            done,
            IpcEvent::Done {
                output: "second".to_owned(),
                hash: "2".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn terminal_surfaces_error_event_then_missing_done() {
        let with_error = ScriptedLauncher::new(
            "{\"event\":\"error\",\"code\":\"bad_password\",\"message\":\"Wrong password\"}\n",
            "",
            0,
        );
        let error = runner(with_error)
            .terminal(ProcessRequest::new(Binary::Zenc, ["decrypt", "a.zenc"]))
            .await
            .expect_err("error event");
        assert_eq!(
            error,
            IpcError::execution(Binary::Zenc, "bad_password", "Wrong password")
        );

        let silent = ScriptedLauncher::new("", "", 0);
        let error = runner(silent)
            .terminal(ProcessRequest::new(Binary::Zenc, ["decrypt", "a.zenc"]))
            .await
            .expect_err("no done");
        assert!(error.has_code("missing_done"));
    }
}

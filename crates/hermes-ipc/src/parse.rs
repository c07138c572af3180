use serde_json::Value;

use crate::error::codes;
use crate::{event_kind, Binary, IpcError, IpcResult};

/// Splits engine stdout into JSON values.
///
/// Every non-blank line is parsed on its own first. If any line fails, the whole
/// trimmed text is retried as a single document holding either one object or an
/// array of objects. Only when both attempts fail is the output malformed.
pub fn parse_output(binary: Binary, stdout: &str) -> IpcResult<Vec<Value>> {
    let mut events = Vec::new();
    let mut failed_line = None;

    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => events.push(value),
            Err(_) => {
                failed_line = Some(line);
                break;
            }
        }
    }

    let Some(failed_line) = failed_line else {
        return Ok(events);
    };

    let trimmed = stdout.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(value) => Ok(vec![value]),
        Err(error) => {
            tracing::warn!(binary = %binary, line = failed_line, "unparseable engine output");
            Err(IpcError::json(binary, failed_line, error))
        }
    }
}

/// Lenient variant of [`parse_output`] for failed runs: keeps every line that
/// parses and drops the rest, falling back to the whole document only when no
/// single line is valid JSON.
pub fn salvage_output(stdout: &str) -> Vec<Value> {
    let events: Vec<Value> = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .collect();
    if !events.is_empty() {
        return events;
    }
    match serde_json::from_str::<Value>(stdout.trim()) {
        Ok(Value::Array(items)) => items,
        Ok(value) => vec![value],
        Err(_) => Vec::new(),
    }
}

/// Builds the error for a non-zero exit, preferring the most specific source:
/// an `error` event on stdout, then an `error` JSON line on stderr, then the
/// raw stderr text under an `exit_<code>` code.
pub fn exit_failure(binary: Binary, events: &[Value], stderr: &str, exit_code: i32) -> IpcError {
    if let Some(event) = events.iter().find(|event| event_kind(event) == Some("error")) {
        return error_from_event(binary, event);
    }

    let stderr_error = stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .find(|value| event_kind(value) == Some("error"));
    if let Some(event) = stderr_error {
        return error_from_event(binary, &event);
    }

    let detail = stderr.trim();
    let message = if detail.is_empty() {
        format!("Process exited with code {exit_code}")
    } else {
        detail.to_owned()
    };
    IpcError::execution(binary, format!("exit_{exit_code}"), message)
}

pub(crate) fn error_from_event(binary: Binary, event: &Value) -> IpcError {
    let code = event
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or(codes::UNKNOWN);
    let message = event
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error");
    IpcError::execution(binary, code, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_valid_line_yields_one_event() {
        let events = parse_output(
            Binary::Zenc,
            "{\"event\":\"done\",\"output\":\"x\",\"hash\":\"h\"}\n",
        )
        .expect("parse");
        assert_eq!(events, vec![json!({"event": "done", "output": "x", "hash": "h"})]);
    }

    #[test]
    fn blank_lines_are_skipped_and_empty_output_is_empty() {
        let events = parse_output(Binary::Zend, "\n{\"a\":1}\n\n  \n{\"b\":2}\n").expect("parse");
        assert_eq!(events.len(), 2);
        assert!(parse_output(Binary::Zend, "   \n").expect("parse").is_empty());
    }

    #[test]
    fn pretty_printed_object_falls_back_to_whole_document() {
        let stdout = "{\n  \"event\": \"peer_list\",\n  \"peers\": []\n}\n";
        let events = parse_output(Binary::Zend, stdout).expect("parse");
        assert_eq!(events, vec![json!({"event": "peer_list", "peers": []})]);
    }

    #[test]
    fn multi_line_array_is_flattened() {
        let stdout = "[\n {\"event\":\"start\"},\n {\"event\":\"done\"}\n]";
        let events = parse_output(Binary::Zenc, stdout).expect("parse");
        assert_eq!(events.len(), 2);
        assert_eq!(event_kind(&events[1]), Some("done"));
    }

    #[test]
    fn malformed_line_without_blank_fallback_is_a_parse_error() {
        let error = parse_output(Binary::Zend, "{\"a\":1}\n{\"b\":").expect_err("malformed");
        match error {
            IpcError::JsonParse { binary, line, .. } => {
                assert_eq!(binary, Binary::Zend);
                assert_eq!(line, "{\"b\":");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn salvage_keeps_valid_lines_around_garbage() {
        let stdout = "{\"event\":\"error\",\"code\":\"peer_offline\",\"message\":\"gone\"}\nthread panicked\n";
        let events = salvage_output(stdout);
        assert_eq!(events.len(), 1);
        assert_eq!(event_kind(&events[0]), Some("error"));

        assert!(salvage_output("not json at all").is_empty());
        let pretty = salvage_output("{\n  \"event\": \"error\"\n}");
        assert_eq!(pretty, vec![json!({"event": "error"})]);
    }

    #[test]
    fn exit_failure_prefers_stdout_error_event() {
        let events = vec![
            json!({"event": "progress", "percent": 10}),
            json!({"event": "error", "code": "peer_not_found", "message": "no such peer"}),
        ];
        let error = exit_failure(
            Binary::Zend,
            &events,
            "{\"event\":\"error\",\"code\":\"other\",\"message\":\"ignored\"}",
            1,
        );
        assert_eq!(
            error,
            IpcError::execution(Binary::Zend, "peer_not_found", "no such peer")
        );
    }

    #[test]
    fn exit_failure_falls_back_to_stderr_error_line() {
        let error = exit_failure(
            Binary::Zend,
            &[],
            "warning: plain text\n{\"event\":\"error\",\"message\":\"bad key\"}\n",
            2,
        );
        assert_eq!(error, IpcError::execution(Binary::Zend, "unknown", "bad key"));
    }

    #[test]
    fn exit_failure_synthesizes_exit_code_error() {
        let with_stderr = exit_failure(Binary::Zenc, &[], "  disk full \n", 3);
        assert_eq!(with_stderr, IpcError::execution(Binary::Zenc, "exit_3", "disk full"));

        let silent = exit_failure(Binary::Zenc, &[], "", 9);
        assert_eq!(
            silent,
            IpcError::execution(Binary::Zenc, "exit_9", "Process exited with code 9")
        );
    }
}

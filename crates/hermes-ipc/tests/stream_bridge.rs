#![cfg(unix)]

mod support;

use hermes_ipc::{Binary, IpcError, IpcEvent, StreamBridge};
use support::{FakeEngines, TEST_TIMEOUT};

const LISTENER: &str = r#"echo '{"event":"listening","port":7654}'
sleep 30"#;

#[tokio::test]
async fn kill_ends_the_stream_without_error() {
    let engines = FakeEngines::new();
    engines.install(Binary::Zend, LISTENER);
    let bridge = StreamBridge::new(engines.launcher(), Binary::Zend);

    let mut handle = bridge
        .start(vec!["receive".to_owned()])
        .await
        .expect("listener started");
    let first = tokio::time::timeout(TEST_TIMEOUT, handle.next_event())
        .await
        .expect("first event")
        .expect("decoded");
    assert_eq!(first, Some(IpcEvent::Listening { port: 7654 }));

    handle.kill();
    let next = tokio::time::timeout(TEST_TIMEOUT, handle.next_event())
        .await
        .expect("stream ended");
    assert_eq!(next, Ok(None));
    assert_eq!(handle.next_event().await, Ok(None));
}

#[tokio::test]
async fn listener_exiting_on_its_own_is_a_parse_failure() {
    let engines = FakeEngines::new();
    engines.install(
        Binary::Zend,
        r#"echo '{"event":"listening","port":7654}'"#,
    );
    let bridge = StreamBridge::new(engines.launcher(), Binary::Zend);

    let mut handle = bridge.start(vec!["receive".to_owned()]).await.expect("start");
    let first = tokio::time::timeout(TEST_TIMEOUT, handle.next_event())
        .await
        .expect("first event");
    assert!(matches!(first, Ok(Some(IpcEvent::Listening { .. }))));

    let end = tokio::time::timeout(TEST_TIMEOUT, handle.next_event())
        .await
        .expect("stream ended");
    match end {
        Err(IpcError::JsonParse { binary, error, .. }) => {
            assert_eq!(binary, Binary::Zend);
            assert_eq!(error, "listener closed stdout");
        }
        other => panic!("unexpected stream end: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_line_terminates_the_stream() {
    let engines = FakeEngines::new();
    engines.install(
        Binary::Zend,
        r#"echo 'not json at all'
sleep 30"#,
    );
    let bridge = StreamBridge::new(engines.launcher(), Binary::Zend);

    let mut handle = bridge.start(vec!["receive".to_owned()]).await.expect("start");
    let end = tokio::time::timeout(TEST_TIMEOUT, handle.next_event())
        .await
        .expect("stream ended");
    match end {
        Err(IpcError::JsonParse { line, .. }) => assert_eq!(line, "not json at all"),
        other => panic!("unexpected stream end: {other:?}"),
    }
    assert_eq!(handle.next_event().await, Ok(None));
}

#[tokio::test]
async fn restarting_replaces_the_previous_session() {
    let engines = FakeEngines::new();
    engines.install(Binary::Zend, LISTENER);
    let bridge = StreamBridge::new(engines.launcher(), Binary::Zend);

    let mut first = bridge.start(vec!["receive".to_owned()]).await.expect("first");
    let second = bridge.start(vec!["receive".to_owned()]).await.expect("second");
    assert_ne!(first.session_id(), second.session_id());

    let drained = tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            match first.next_event().await {
                Ok(Some(_)) => continue,
                other => break other,
            }
        }
    })
    .await
    .expect("first session ended");
    assert_eq!(drained, Ok(None));
    assert!(first.killer().is_killed());
    assert!(bridge.is_running().await);

    assert!(bridge.stop().await);
    assert!(!bridge.is_running().await);
    assert!(!bridge.stop().await);
}

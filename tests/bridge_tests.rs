//! Remote-control bridge behavior against a scripted session

mod common;

use common::FakeSession;
use mnbot_worker::capture::CaptureError;
use mnbot_worker::session::BrowserSession;
use mnbot_worker::RemoteControlBridge;
use serde_json::json;
use std::time::{Duration, Instant};

fn bridge() -> RemoteControlBridge {
    RemoteControlBridge::new(Duration::from_secs(2), Duration::from_millis(5))
}

fn running_session() -> FakeSession {
    let mut session = FakeSession::new();
    session.start("http://warcprox:8000", None).unwrap();
    session
}

#[test]
fn test_reply_is_correlated_to_its_command() {
    let session = running_session();

    let first = bridge().call(&session, "Browser.getVersion", json!({})).unwrap();
    let second = bridge().call(&session, "DOM.getDocument", json!({})).unwrap();

    assert_eq!(first["id"], json!(1));
    assert!(first.pointer("/result/userAgent").is_some());
    assert_eq!(second["id"], json!(2));
    assert_eq!(second.pointer("/result/root/nodeId"), Some(&json!(1)));
}

#[test]
fn test_params_reach_the_engine() {
    let session = running_session();

    bridge()
        .call(&session, "DOM.getOuterHTML", json!({"nodeId": 7}))
        .unwrap();

    let state = session.state.lock();
    let (_, method, params) = state.sent.last().unwrap();
    assert_eq!(method, "DOM.getOuterHTML");
    assert_eq!(params, &json!({"nodeId": 7}));
}

#[test]
fn test_error_replies_are_returned_not_raised() {
    let session = running_session();

    let reply = bridge().call(&session, "Unknown.method", json!({})).unwrap();

    assert!(reply.get("result").is_none());
    assert_eq!(reply.pointer("/error/message"), Some(&json!("method not found")));
}

#[test]
fn test_silent_command_times_out() {
    let session = running_session().with(|s| {
        s.silent.insert("Page.hang".to_string());
    });
    let bridge = RemoteControlBridge::new(Duration::from_millis(50), Duration::from_millis(5));

    let started = Instant::now();
    let err = bridge.call(&session, "Page.hang", json!({})).unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(50));
    match err {
        CaptureError::Timeout { method, timeout } => {
            assert_eq!(method, "Page.hang");
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn test_explicit_timeout_overrides_default() {
    let session = running_session().with(|s| {
        s.silent.insert("Page.hang".to_string());
    });

    let err = bridge()
        .send_and_wait(&session, "Page.hang", json!({}), Duration::from_millis(20))
        .unwrap_err();

    assert!(matches!(err, CaptureError::Timeout { timeout, .. } if timeout == Duration::from_millis(20)));
}

#[test]
fn test_closed_session_fails_fast() {
    let session = running_session().with(|s| s.crash_on_send = true);

    let started = Instant::now();
    let err = bridge().call(&session, "Browser.getVersion", json!({})).unwrap_err();

    assert!(matches!(err, CaptureError::SessionClosed { ref method } if method == "Browser.getVersion"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_send_on_stopped_session_is_engine_error() {
    let session = FakeSession::new();

    let err = bridge().call(&session, "Browser.getVersion", json!({})).unwrap_err();

    assert!(matches!(err, CaptureError::Browser(_)));
    assert!(session.state.lock().expected.is_empty());
}

#[test]
fn test_unexpected_id_is_still_correlated() {
    let session = running_session().with(|s| s.id_skew = 10);

    let reply = bridge().call(&session, "Browser.getVersion", json!({})).unwrap();

    assert_eq!(reply["id"], json!(11));
    let state = session.state.lock();
    assert!(state.received.is_empty());
    assert!(state.expected.is_empty());
}

#[test]
fn test_unregistered_replies_are_discarded() {
    let session = running_session();

    // Bypass the bridge: nobody registered interest in this id
    let id = session.send("Browser.getVersion", json!({})).unwrap();

    assert!(!session.has_result(id));
    assert!(session.pop_result(id).is_none());
}

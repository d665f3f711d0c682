//! Action handling and single-fire response object tests

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use feedme_server::{ActionResponder, ServerError, ServerEvent};
use feedme_test_utils::{wait_for, TestServer, DEFAULT_TIMEOUT};

fn action_frame(callback_id: &str) -> serde_json::Value {
    json!({
        "MessageType": "Action",
        "ActionName": "do-something",
        "ActionArgs": {"x": 1},
        "CallbackId": callback_id,
    })
}

/// Registers an action handler that stashes every responder it receives.
fn stash_responders(server: &TestServer) -> Arc<Mutex<Vec<ActionResponder>>> {
    let stash: Arc<Mutex<Vec<ActionResponder>>> = Arc::new(Mutex::new(Vec::new()));
    let inner = stash.clone();
    server.server.on_action(move |_request, responder| {
        inner.lock().push(responder);
    });
    stash
}

#[tokio::test]
async fn action_without_handler_fails_internal_error() {
    let server = TestServer::start().await;
    let (mut client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    let response = client.recv_json().await;
    assert_eq!(response["MessageType"], "ActionResponse");
    assert_eq!(response["CallbackId"], "cb1");
    assert_eq!(response["Success"], false);
    assert_eq!(response["ErrorCode"], "INTERNAL_ERROR");
    assert_eq!(response["ErrorData"], json!({}));
}

#[tokio::test]
async fn action_success_roundtrip() {
    let server = TestServer::start().await;
    server.server.on_action(move |request, responder| {
        assert_eq!(request.action_name, "do-something");
        assert_eq!(request.action_args.get("x"), Some(&json!(1)));
        responder.success(json!({"result": "done"})).unwrap();
    });
    let (mut client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    let response = client.recv_json().await;
    assert_eq!(response["MessageType"], "ActionResponse");
    assert_eq!(response["CallbackId"], "cb1");
    assert_eq!(response["Success"], true);
    assert_eq!(response["ActionData"], json!({"result": "done"}));
}

#[tokio::test]
async fn action_failure_allows_empty_error_code() {
    let server = TestServer::start().await;
    server.server.on_action(move |_request, responder| {
        responder.failure("", json!("free-form detail")).unwrap();
    });
    let (mut client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    let response = client.recv_json().await;
    assert_eq!(response["Success"], false);
    assert_eq!(response["ErrorCode"], "");
    assert_eq!(response["ErrorData"], json!("free-form detail"));
}

#[tokio::test]
async fn action_success_requires_an_object() {
    let server = TestServer::start().await;
    let stash = stash_responders(&server);
    let (mut client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    assert!(wait_for(|| !stash.lock().is_empty(), DEFAULT_TIMEOUT).await);

    let responder = stash.lock().pop().unwrap();
    assert!(matches!(
        responder.success(json!([1, 2, 3])),
        Err(ServerError::InvalidArgument(_))
    ));
    // A rejected argument does not consume the response.
    responder.success(json!({"ok": true})).unwrap();
    let response = client.recv_json().await;
    assert_eq!(response["Success"], true);
}

#[tokio::test]
async fn responding_twice_fails() {
    let server = TestServer::start().await;
    let stash = stash_responders(&server);
    let (mut client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    assert!(wait_for(|| !stash.lock().is_empty(), DEFAULT_TIMEOUT).await);

    let responder = stash.lock().pop().unwrap();
    responder.success(json!({})).unwrap();
    assert!(matches!(
        responder.failure("X", json!({})),
        Err(ServerError::AlreadyResponded)
    ));

    let response = client.recv_json().await;
    assert_eq!(response["Success"], true);
    assert!(client.silent_for(Duration::from_millis(100)).await);
}

#[tokio::test]
async fn pending_callback_id_collision_is_a_violation() {
    let server = TestServer::start().await;
    let stash = stash_responders(&server);
    let (mut client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    assert!(wait_for(|| !stash.lock().is_empty(), DEFAULT_TIMEOUT).await);

    client.send_json(&action_frame("cb1"));
    let response = client.recv_json().await;
    assert_eq!(response["MessageType"], "ViolationResponse");
    assert_eq!(response["Diagnostics"]["Problem"], "callback-id-in-use");

    // Answering frees the id for reuse.
    let responder = stash.lock().pop().unwrap();
    responder.success(json!({})).unwrap();
    let response = client.recv_json().await;
    assert_eq!(response["MessageType"], "ActionResponse");

    client.send_json(&action_frame("cb1"));
    assert!(wait_for(|| !stash.lock().is_empty(), DEFAULT_TIMEOUT).await);
}

#[tokio::test]
async fn distinct_callback_ids_may_be_pending_together() {
    let server = TestServer::start().await;
    let stash = stash_responders(&server);
    let (mut client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    client.send_json(&action_frame("cb2"));
    assert!(wait_for(|| stash.lock().len() == 2, DEFAULT_TIMEOUT).await);

    for responder in stash.lock().drain(..) {
        responder.success(json!({})).unwrap();
    }
    let first = client.recv_json().await;
    let second = client.recv_json().await;
    let mut ids = vec![
        first["CallbackId"].as_str().unwrap().to_string(),
        second["CallbackId"].as_str().unwrap().to_string(),
    ];
    ids.sort();
    assert_eq!(ids, vec!["cb1", "cb2"]);
}

#[tokio::test]
async fn response_after_disconnect_is_a_silent_noop() {
    let mut server = TestServer::start().await;
    let stash = stash_responders(&server);
    let (client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    assert!(wait_for(|| !stash.lock().is_empty(), DEFAULT_TIMEOUT).await);

    client.close(None);
    match server.next_event().await {
        ServerEvent::Disconnect { .. } => {}
        other => panic!("unexpected event: {:?}", other),
    }

    // The client is gone; the late answer succeeds as a no-op, and the
    // double-response rule still applies afterwards.
    let responder = stash.lock().pop().unwrap();
    responder.success(json!({})).unwrap();
    assert!(matches!(
        responder.success(json!({})),
        Err(ServerError::AlreadyResponded)
    ));
}

#[tokio::test]
async fn response_after_stop_is_a_silent_noop() {
    let mut server = TestServer::start().await;
    let stash = stash_responders(&server);
    let (mut client, _id) = server.connect_handshaken().await;

    client.send_json(&action_frame("cb1"));
    assert!(wait_for(|| !stash.lock().is_empty(), DEFAULT_TIMEOUT).await);

    server.server.stop().await.unwrap();
    loop {
        match server.next_event().await {
            ServerEvent::Stopped(_) => break,
            ServerEvent::Stopping(_) => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert!(client.closed().await);

    let responder = stash.lock().pop().unwrap();
    responder.success(json!({})).unwrap();
}

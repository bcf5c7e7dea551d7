//! Integration tests for the signed transport
//!
//! Verifies the Authorization header, status mapping and the single
//! re-authentication retry on 401.

use std::sync::Arc;

use mirrorfm_core::domain::FmError;
use mirrorfm_core::ports::{ISecretStore, MemorySecretStore};
use mirrorfm_http::{signing, SignedTransport};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, ScriptedChallenge, ENDPOINT_PATH};

// ============================================================================
// Signing
// ============================================================================

#[tokio::test]
async fn test_request_is_signed_over_body() {
    let (server, transport) = common::setup(Some("hunter2")).await;
    common::mount_action(&server, "slist", ResponseTemplate::new(200).set_body_json(json!([]))).await;

    let entries: Vec<Value> = transport
        .call_json("slist", &json!({"path": "/docs/"}))
        .await
        .expect("call succeeds");
    assert!(entries.is_empty());

    let requests = common::requests(&server).await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(common::action_of(request).as_deref(), Some("slist"));
    assert_eq!(
        serde_json::from_slice::<Value>(&request.body).unwrap(),
        json!({"path": "/docs/"})
    );
    let header = common::authorization(request);
    assert!(!header.is_empty());
    assert_eq!(header, signing::sign(Some("hunter2"), &request.body));
}

#[tokio::test]
async fn test_request_without_secret_has_empty_signature() {
    let (server, transport) = common::setup(None).await;
    common::mount_action(&server, "touch", ResponseTemplate::new(200).set_body_string("ok")).await;

    let reply = transport
        .call_text("touch", &json!({"files": ["/a"]}))
        .await
        .unwrap();
    assert_eq!(reply, "ok");

    let requests = common::requests(&server).await;
    assert_eq!(common::authorization(&requests[0]), "");
}

// ============================================================================
// Status mapping
// ============================================================================

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let (server, transport) = common::setup(Some("k")).await;
    common::mount_action(&server, "delete", ResponseTemplate::new(400).set_body_string("bad files")).await;
    common::mount_action(&server, "mkdir", ResponseTemplate::new(403).set_body_string("read-only")).await;
    common::mount_action(&server, "copy", ResponseTemplate::new(500).set_body_string("boom")).await;

    let err = transport.call_text("delete", &json!({})).await.unwrap_err();
    assert_eq!(err, FmError::MalformedRequest("bad files".into()));

    let err = transport.call_text("mkdir", &json!({})).await.unwrap_err();
    assert_eq!(err, FmError::PermissionDenied("read-only".into()));

    let err = transport.call_text("copy", &json!({})).await.unwrap_err();
    assert_eq!(
        err,
        FmError::Request {
            status: 500,
            detail: "boom".into()
        }
    );

    // None of these are retried
    assert_eq!(common::requests(&server).await.len(), 3);
}

#[tokio::test]
async fn test_undecodable_json_is_server_decode_error() {
    let (server, transport) = common::setup(Some("k")).await;
    common::mount_action(&server, "stat", ResponseTemplate::new(200).set_body_string("<html>")).await;

    let err = transport
        .call_json::<_, Value>("stat", &json!({"path": "/a"}))
        .await
        .unwrap_err();
    assert!(matches!(err, FmError::ServerDecode(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let transport = SignedTransport::new("http://127.0.0.1:1/api").unwrap();
    let err = transport.call_text("list", &json!({})).await.unwrap_err();
    assert!(matches!(err, FmError::Network(_)));
}

// ============================================================================
// Re-authentication
// ============================================================================

#[tokio::test]
async fn test_unauthorized_triggers_one_challenge_and_retry() {
    let (server, transport) = common::setup(Some("stale")).await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(query_param("action", "list"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_action(&server, "list", ResponseTemplate::new(200).set_body_json(json!(["a", "b/"]))).await;

    let challenge = ScriptedChallenge::new(Some("fresh"));
    let store = Arc::new(MemorySecretStore::new());
    let transport = transport
        .with_challenge(challenge.clone())
        .with_secret_store(store.clone());

    let names: Vec<String> = transport
        .call_json("list", &json!({"path": "/"}))
        .await
        .expect("retry succeeds");
    assert_eq!(names, vec!["a", "b/"]);

    assert_eq!(challenge.calls(), 1);
    assert_eq!(transport.secret().as_deref(), Some("fresh"));
    assert_eq!(store.load().unwrap().as_deref(), Some("fresh"));

    let requests = common::requests(&server).await;
    assert_eq!(requests.len(), 2);
    assert_eq!(
        common::authorization(&requests[0]),
        signing::sign(Some("stale"), &requests[0].body)
    );
    assert_eq!(
        common::authorization(&requests[1]),
        signing::sign(Some("fresh"), &requests[1].body)
    );
}

#[tokio::test]
async fn test_second_unauthorized_is_authentication_error() {
    let (server, transport) = common::setup(Some("stale")).await;
    common::mount_action(&server, "list", ResponseTemplate::new(401)).await;

    let challenge = ScriptedChallenge::new(Some("still-wrong"));
    let transport = transport.with_challenge(challenge.clone());

    let err = transport.call_text("list", &json!({})).await.unwrap_err();
    assert!(matches!(err, FmError::Authentication(_)));
    assert_eq!(challenge.calls(), 1);
    assert_eq!(common::requests(&server).await.len(), 2);
}

#[tokio::test]
async fn test_cancelled_challenge_does_not_retry() {
    let (server, transport) = common::setup(Some("stale")).await;
    common::mount_action(&server, "list", ResponseTemplate::new(401)).await;

    let challenge = ScriptedChallenge::new(None);
    let transport = transport.with_challenge(challenge.clone());

    let err = transport.call_text("list", &json!({})).await.unwrap_err();
    assert!(matches!(err, FmError::Authentication(_)));
    assert_eq!(challenge.calls(), 1);
    assert_eq!(common::requests(&server).await.len(), 1);
    assert_eq!(transport.secret().as_deref(), Some("stale"));
}

#[tokio::test]
async fn test_unauthorized_without_challenge_fails() {
    let (server, transport) = common::setup(None).await;
    common::mount_action(&server, "list", ResponseTemplate::new(401)).await;

    let err = transport.call_text("list", &json!({})).await.unwrap_err();
    assert!(matches!(err, FmError::Authentication(_)));
    assert_eq!(common::requests(&server).await.len(), 1);
}

//! Integration tests for the two-step upload

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use mirrorfm_core::domain::FmError;
use mirrorfm_core::ports::IRemoteStore;
use mirrorfm_http::{signing, HttpRemoteStore};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, ENDPOINT_PATH};

async fn mount_put(server: &MockServer, token: &str, response: ResponseTemplate) {
    Mock::given(method("PUT"))
        .and(path(ENDPOINT_PATH))
        .and(query_param("action", "upload"))
        .and(query_param("token", token))
        .respond_with(response)
        .mount(server)
        .await;
}

fn recorder() -> (Arc<Mutex<Vec<(u64, u64)>>>, mirrorfm_core::ports::ProgressFn) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (
        seen,
        Box::new(move |sent, total| sink.lock().unwrap().push((sent, total))),
    )
}

#[tokio::test]
async fn test_upload_announces_then_puts_signed_bytes() {
    let (server, transport) = common::setup(Some("s3cret")).await;
    common::mount_action(&server, "upload", ResponseTemplate::new(200).set_body_string("tok-1\n")).await;
    mount_put(&server, "tok-1", ResponseTemplate::new(200)).await;

    let store = HttpRemoteStore::new(Arc::new(transport)).with_chunk_size(4);
    let data = Bytes::from_static(b"hello world");
    let (seen, progress) = recorder();

    store
        .upload("/docs/hello.txt", data.clone(), Some(progress))
        .await
        .expect("upload succeeds");

    let requests = common::requests(&server).await;
    assert_eq!(requests.len(), 2);

    let announce = &requests[0];
    assert_eq!(announce.method.to_string(), "POST");
    assert_eq!(
        serde_json::from_slice::<Value>(&announce.body).unwrap(),
        json!({"path": "/docs/hello.txt", "size": 11})
    );

    let put = &requests[1];
    assert_eq!(put.method.to_string(), "PUT");
    assert_eq!(put.body, data.to_vec());
    assert_eq!(
        put.headers
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/octet-stream")
    );
    assert_eq!(common::authorization(put), signing::sign(Some("s3cret"), &data));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.last(), Some(&(11, 11)));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn test_empty_file_reports_completion() {
    let (server, transport) = common::setup(None).await;
    common::mount_action(&server, "upload", ResponseTemplate::new(200).set_body_string("t0")).await;
    mount_put(&server, "t0", ResponseTemplate::new(200)).await;

    let store = HttpRemoteStore::new(Arc::new(transport));
    let (seen, progress) = recorder();
    store
        .upload("/empty", Bytes::new(), Some(progress))
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().as_slice(), &[(0, 0)]);
}

#[tokio::test]
async fn test_empty_token_is_decode_error() {
    let (server, transport) = common::setup(None).await;
    common::mount_action(&server, "upload", ResponseTemplate::new(200).set_body_string("  ")).await;

    let store = HttpRemoteStore::new(Arc::new(transport));
    let err = store
        .upload("/a.txt", Bytes::from_static(b"x"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FmError::ServerDecode(_)));
    assert_eq!(common::requests(&server).await.len(), 1);
}

#[tokio::test]
async fn test_rejected_body_surfaces_status() {
    let (server, transport) = common::setup(None).await;
    common::mount_action(&server, "upload", ResponseTemplate::new(200).set_body_string("tok")).await;
    mount_put(&server, "tok", ResponseTemplate::new(403).set_body_string("quota")).await;

    let store = HttpRemoteStore::new(Arc::new(transport));
    let err = store
        .upload("/a.txt", Bytes::from_static(b"abc"), None)
        .await
        .unwrap_err();

    assert_eq!(err, FmError::PermissionDenied("quota".into()));
}

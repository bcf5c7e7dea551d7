//! Integration tests for the remote store adapter

use std::sync::Arc;

use mirrorfm_core::domain::FmError;
use mirrorfm_core::ports::{EntryDescriptor, IRemoteStore, RenamePair};
use mirrorfm_http::HttpRemoteStore;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, ENDPOINT_PATH};

async fn store(secret: Option<&str>) -> (MockServer, HttpRemoteStore) {
    let (server, transport) = common::setup(secret).await;
    (server, HttpRemoteStore::new(Arc::new(transport)))
}

fn body_of(request: &wiremock::Request) -> Value {
    serde_json::from_slice(&request.body).expect("json body")
}

// ============================================================================
// Listings
// ============================================================================

#[tokio::test]
async fn test_list_detailed_parses_entries() {
    let (server, store) = store(Some("k")).await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(query_param("action", "slist"))
        .and(body_json(json!({"path": "/docs/"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "img", "type": "dir", "size": 4096, "ctime": 1700000000},
            {"name": "notes.txt", "type": "file", "size": 42, "ctime": 1700000100}
        ])))
        .mount(&server)
        .await;

    let entries = store.list_detailed("/docs/").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].is_dir());
    assert_eq!(entries[0].name, "img");
    assert_eq!(entries[0].size, 0);
    assert_eq!(entries[1].name, "notes.txt");
    assert_eq!(entries[1].size, 42);
    assert_eq!(
        entries[1].created.map(|c| c.timestamp()),
        Some(1_700_000_100)
    );
}

#[tokio::test]
async fn test_list_names_returns_raw_names() {
    let (server, store) = store(None).await;
    common::mount_action(
        &server,
        "list",
        ResponseTemplate::new(200).set_body_json(json!(["a.txt", "sub/"])),
    )
    .await;

    let names = store.list_names("/").await.unwrap();
    assert_eq!(names, vec!["a.txt", "sub/"]);
    assert_eq!(body_of(&common::requests(&server).await[0]), json!({"path": "/"}));
}

#[tokio::test]
async fn test_stat_missing_path_is_request_error() {
    let (server, store) = store(None).await;
    common::mount_action(&server, "stat", ResponseTemplate::new(404).set_body_string("no such file")).await;

    let err = store.stat("/nope").await.unwrap_err();
    assert_eq!(
        err,
        FmError::Request {
            status: 404,
            detail: "no such file".into()
        }
    );
}

#[tokio::test]
async fn test_stat_decodes_single_entry() {
    let (server, store) = store(None).await;
    common::mount_action(
        &server,
        "stat",
        ResponseTemplate::new(200).set_body_json(json!({"name": "a.txt", "type": "file", "size": 7})),
    )
    .await;

    let entry = store.stat("/a.txt").await.unwrap();
    assert_eq!(entry, EntryDescriptor::file("a.txt", 7));
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_mutation_bodies() {
    let (server, store) = store(Some("k")).await;
    for action in ["delete", "mkdir", "touch", "copy"] {
        common::mount_action(&server, action, ResponseTemplate::new(200).set_body_string("ok")).await;
    }

    store.delete(&["/a".into(), "/b/".into()]).await.unwrap();
    store.mkdir(&["/new/".into()], Some(0o755)).await.unwrap();
    store.touch(&["/empty.txt".into()]).await.unwrap();
    store.copy(&["/a".into()], "/dst/").await.unwrap();

    let requests = common::requests(&server).await;
    let bodies: Vec<(Option<String>, Value)> = requests
        .iter()
        .map(|r| (common::action_of(r), body_of(r)))
        .collect();
    assert_eq!(
        bodies,
        vec![
            (Some("delete".into()), json!({"files": ["/a", "/b/"]})),
            (Some("mkdir".into()), json!({"files": ["/new/"], "mode": 493})),
            (Some("touch".into()), json!({"files": ["/empty.txt"]})),
            (Some("copy".into()), json!({"files": ["/a"], "to": "/dst/"})),
        ]
    );
    for request in &requests {
        assert_eq!(
            common::authorization(request),
            mirrorfm_http::signing::sign(Some("k"), &request.body)
        );
    }
}

#[tokio::test]
async fn test_mkdir_without_mode_omits_field() {
    let (server, store) = store(None).await;
    common::mount_action(&server, "mkdir", ResponseTemplate::new(200)).await;

    store.mkdir(&["/x/".into()], None).await.unwrap();
    assert_eq!(
        body_of(&common::requests(&server).await[0]),
        json!({"files": ["/x/"]})
    );
}

#[tokio::test]
async fn test_move_selects_action_by_depth() {
    let (server, store) = store(None).await;
    common::mount_action(&server, "move", ResponseTemplate::new(200)).await;
    common::mount_action(&server, "fmove", ResponseTemplate::new(200)).await;

    store.move_to(&["/a".into()], "/d/", false).await.unwrap();
    store.move_to(&["/b/".into()], "/d/", true).await.unwrap();

    let actions: Vec<Option<String>> = common::requests(&server)
        .await
        .iter()
        .map(common::action_of)
        .collect();
    assert_eq!(actions, vec![Some("move".into()), Some("fmove".into())]);
}

#[tokio::test]
async fn test_rename_sends_from_to_map() {
    let (server, store) = store(None).await;
    common::mount_action(&server, "rename", ResponseTemplate::new(200)).await;

    store
        .rename(&[
            RenamePair::new("/a.txt", "/b.txt"),
            RenamePair::new("/dir/", "/renamed/"),
        ])
        .await
        .unwrap();

    assert_eq!(
        body_of(&common::requests(&server).await[0]),
        json!({"files": {"/a.txt": "/b.txt", "/dir/": "/renamed/"}})
    );
}

#[tokio::test]
async fn test_forbidden_mutation_is_permission_denied() {
    let (server, store) = store(None).await;
    common::mount_action(&server, "delete", ResponseTemplate::new(403).set_body_string("locked")).await;

    let err = store.delete(&["/a".into()]).await.unwrap_err();
    assert_eq!(err, FmError::PermissionDenied("locked".into()));
}

//! Shared test helpers for the backend integration tests
//!
//! Each helper starts a wiremock server standing in for the backend's
//! single endpoint (`/api`) and returns a transport pointing at it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mirrorfm_core::ports::IAuthChallenge;
use mirrorfm_http::SignedTransport;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const ENDPOINT_PATH: &str = "/api";

/// Starts a mock backend and a transport signing with `secret`
pub async fn setup(secret: Option<&str>) -> (MockServer, SignedTransport) {
    let server = MockServer::start().await;
    let mut transport = SignedTransport::new(&format!("{}{ENDPOINT_PATH}", server.uri()))
        .expect("valid endpoint");
    if let Some(secret) = secret {
        transport = transport.with_secret(secret);
    }
    (server, transport)
}

/// Mounts a POST handler for `action`
pub async fn mount_action(server: &MockServer, action: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(query_param("action", action))
        .respond_with(response)
        .mount(server)
        .await;
}

/// All requests received so far
pub async fn requests(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

pub fn authorization(request: &Request) -> String {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn action_of(request: &Request) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "action")
        .map(|(_, v)| v.into_owned())
}

/// Challenge answering with a fixed secret (or cancelling) and counting calls
pub struct ScriptedChallenge {
    answer: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedChallenge {
    pub fn new(answer: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.map(str::to_string),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IAuthChallenge for ScriptedChallenge {
    async fn request_secret(&self) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

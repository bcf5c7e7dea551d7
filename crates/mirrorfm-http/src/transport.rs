//! Signed transport to the backend endpoint
//!
//! The backend exposes a single URL; the operation is selected with an
//! `action` query parameter and described by a JSON body. Every request
//! carries the body signature from [`crate::signing`].
//!
//! ## Status handling
//!
//! | Status  | Result                                              |
//! |---------|-----------------------------------------------------|
//! | 2xx     | success                                             |
//! | 400     | [`FmError::MalformedRequest`]                       |
//! | 401     | one interactive re-authentication, then one retry   |
//! | 403     | [`FmError::PermissionDenied`]                       |
//! | other   | [`FmError::Request`] with the response body         |

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context;
use mirrorfm_core::config::ServerConfig;
use mirrorfm_core::domain::FmError;
use mirrorfm_core::ports::{IAuthChallenge, ISecretStore};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::signing;

/// HTTP client for the signed single-endpoint protocol
pub struct SignedTransport {
    client: Client,
    endpoint: Url,
    secret: RwLock<Option<String>>,
    challenge: Option<Arc<dyn IAuthChallenge>>,
    secret_store: Option<Arc<dyn ISecretStore>>,
}

impl SignedTransport {
    /// Creates a transport for `endpoint` with default client settings
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid endpoint URL: {endpoint}"))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            secret: RwLock::new(None),
            challenge: None,
            secret_store: None,
        })
    }

    /// Creates a transport from the `server` configuration section
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        let mut transport = Self::new(&config.endpoint)?;
        transport.client = client;
        Ok(transport)
    }

    /// Sets the initial shared secret
    pub fn with_secret(self, secret: impl Into<String>) -> Self {
        self.set_secret(secret.into());
        self
    }

    /// Sets the callback asked for a new secret after a 401
    pub fn with_challenge(mut self, challenge: Arc<dyn IAuthChallenge>) -> Self {
        self.challenge = Some(challenge);
        self
    }

    /// Attaches durable secret storage
    ///
    /// A stored secret becomes the current one unless a secret was already
    /// set. Secrets obtained by re-authentication are written back.
    pub fn with_secret_store(mut self, store: Arc<dyn ISecretStore>) -> Self {
        if self.secret().is_none() {
            match store.load() {
                Ok(Some(secret)) => {
                    debug!("Loaded shared secret from secret store");
                    self.set_secret(secret);
                }
                Ok(None) => debug!("No shared secret stored yet"),
                Err(e) => warn!(error = %e, "Failed to load shared secret"),
            }
        }
        self.secret_store = Some(store);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The secret currently used for signing
    pub fn secret(&self) -> Option<String> {
        self.secret
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_secret(&self, secret: String) {
        *self.secret.write().unwrap_or_else(PoisonError::into_inner) = Some(secret);
    }

    /// Endpoint URL for `action`, with extra query parameters
    pub fn action_url(&self, action: &str, extra: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        url
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Posts `payload` and decodes the JSON response
    pub async fn call_json<T, R>(&self, action: &str, payload: &T) -> Result<R, FmError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.post(action, payload).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FmError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            debug!(action, error = %e, "Undecodable response body");
            FmError::ServerDecode(format!("{action}: {e}"))
        })
    }

    /// Posts `payload` and returns the response body as text
    pub async fn call_text<T>(&self, action: &str, payload: &T) -> Result<String, FmError>
    where
        T: Serialize + ?Sized,
    {
        let response = self.post(action, payload).await?;
        response
            .text()
            .await
            .map_err(|e| FmError::ServerDecode(format!("{action}: {e}")))
    }

    async fn post<T>(&self, action: &str, payload: &T) -> Result<Response, FmError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)
            .map_err(|e| FmError::MalformedRequest(format!("{action}: {e}")))?;
        let url = self.action_url(action, &[]);

        self.execute(action, &body, |client, signature| {
            client
                .post(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, signature)
                .body(body.clone())
        })
        .await
    }

    /// Sends a request built by `build`, retrying once after a 401
    ///
    /// `build` receives the signature for `signed_body` and must produce a
    /// fresh request each time it is called.
    pub async fn execute<F>(
        &self,
        action: &str,
        signed_body: &[u8],
        build: F,
    ) -> Result<Response, FmError>
    where
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let mut reauthenticated = false;
        loop {
            let signature = signing::sign(self.secret().as_deref(), signed_body);
            debug!(action, attempt = u8::from(reauthenticated) + 1, "Sending request");

            let response = build(&self.client, signature)
                .send()
                .await
                .map_err(|e| FmError::Network(format!("{action}: {e}")))?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }
            if status == StatusCode::UNAUTHORIZED {
                if reauthenticated {
                    warn!(action, "Request rejected again after re-authentication");
                    return Err(FmError::Authentication(format!(
                        "{action}: secret rejected after re-authentication"
                    )));
                }
                self.reauthenticate(action).await?;
                reauthenticated = true;
                continue;
            }

            let detail = response.text().await.unwrap_or_default();
            debug!(action, status = status.as_u16(), "Request failed");
            return Err(classify(status, detail));
        }
    }

    async fn reauthenticate(&self, action: &str) -> Result<(), FmError> {
        let Some(challenge) = &self.challenge else {
            return Err(FmError::Authentication(format!(
                "{action}: unauthenticated and no challenge configured"
            )));
        };
        let secret = challenge.request_secret().await.ok_or_else(|| {
            FmError::Authentication(format!("{action}: re-authentication cancelled"))
        })?;

        if let Some(store) = &self.secret_store {
            if let Err(e) = store.store(&secret) {
                warn!(error = %e, "Failed to persist shared secret");
            }
        }
        self.set_secret(secret);
        info!(action, "Re-authenticated, retrying request");
        Ok(())
    }
}

/// Maps a non-success, non-401 status onto the error taxonomy
pub(crate) fn classify(status: StatusCode, detail: String) -> FmError {
    match status {
        StatusCode::BAD_REQUEST => FmError::MalformedRequest(detail),
        StatusCode::UNAUTHORIZED => FmError::Authentication(detail),
        StatusCode::FORBIDDEN => FmError::PermissionDenied(detail),
        other => FmError::Request {
            status: other.as_u16(),
            detail,
        },
    }
}

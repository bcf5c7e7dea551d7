//! MirrorFM HTTP - signed backend adapter
//!
//! Implements the core's [`IRemoteStore`](mirrorfm_core::ports::IRemoteStore)
//! port against a single-endpoint HTTP backend:
//! - HMAC-SHA1 request signatures keyed by the shared secret
//! - one interactive re-authentication and retry on 401
//! - two-step uploads with streamed, progress-reporting bodies
//!
//! ## Modules
//!
//! - [`signing`] - Signature derivation
//! - [`transport`] - Signed requests and status mapping
//! - [`store`] - The remote store adapter and wire types
//! - [`upload`] - Upload pre-flight and body transfer
//! - [`secret`] - Keyring-backed secret storage

pub mod secret;
pub mod signing;
pub mod store;
pub mod transport;
pub mod upload;

pub use secret::KeyringSecretStore;
pub use store::HttpRemoteStore;
pub use transport::SignedTransport;

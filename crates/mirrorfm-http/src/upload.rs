//! File upload over the signed protocol
//!
//! Uploading takes two requests:
//! 1. a pre-flight `POST ?action=upload` announcing `{path, size}`, answered
//!    with an opaque token
//! 2. `PUT ?action=upload&token=<token>` carrying the raw bytes, signed over
//!    those bytes
//!
//! The body is streamed in chunks so progress can be reported as it is
//! consumed by the connection.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream;
use mirrorfm_core::domain::FmError;
use mirrorfm_core::ports::ProgressFn;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Body;
use serde::Serialize;
use tracing::debug;

use crate::transport::SignedTransport;

/// Default body chunk size: 64 KiB
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Pre-flight announcement of an upload
#[derive(Debug, Serialize)]
struct UploadAnnouncement<'a> {
    path: &'a str,
    size: u64,
}

/// Splits `data` into chunks of at most `chunk_size` bytes (zero-copy)
pub(crate) fn chunks(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    let chunk_size = chunk_size.max(1);
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect()
}

/// A streamed body reporting cumulative progress per chunk
fn progress_body(data: &Bytes, chunk_size: usize, progress: Option<Arc<ProgressFn>>) -> Body {
    let total = data.len() as u64;
    let mut sent = 0u64;
    let parts = chunks(data, chunk_size).into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(progress) = &progress {
            progress(sent, total);
        }
        Ok::<Bytes, std::io::Error>(chunk)
    });
    Body::wrap_stream(stream::iter(parts))
}

/// Uploads `data` to `path`
pub async fn upload(
    transport: &SignedTransport,
    path: &str,
    data: Bytes,
    chunk_size: usize,
    progress: Option<ProgressFn>,
) -> Result<(), FmError> {
    let total = data.len() as u64;
    let token = transport
        .call_text("upload", &UploadAnnouncement { path, size: total })
        .await?;
    let token = token.trim();
    if token.is_empty() {
        return Err(FmError::ServerDecode(format!(
            "upload: empty token for {path}"
        )));
    }
    debug!(path, size = total, "Upload pre-flight accepted");

    let url = transport.action_url("upload", &[("token", token)]);
    let progress = progress.map(Arc::new);

    transport
        .execute("upload", &data, |client, signature| {
            client
                .put(url.clone())
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(AUTHORIZATION, signature)
                .body(progress_body(&data, chunk_size, progress.clone()))
        })
        .await?;

    if total == 0 {
        if let Some(progress) = &progress {
            progress(0, 0);
        }
    }
    debug!(path, size = total, "Upload body transferred");
    Ok(())
}

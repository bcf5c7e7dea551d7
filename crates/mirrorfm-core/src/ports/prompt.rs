//! Interactive prompt ports (driving UI callbacks)
//!
//! The core never talks to a user directly. Whenever an operation needs a
//! decision (a new shared secret, permission to overwrite, a file
//! selection) it asks one of these capabilities, which the embedding UI
//! implements.

use std::path::PathBuf;

/// Asks the user for the shared secret after the backend rejected a request
#[async_trait::async_trait]
pub trait IAuthChallenge: Send + Sync {
    /// Returns the new secret, or `None` if the user cancelled
    async fn request_secret(&self) -> Option<String>;
}

/// Asks the user whether existing files may be overwritten
#[async_trait::async_trait]
pub trait IConfirmPrompt: Send + Sync {
    /// `paths` lists every colliding destination of the batch
    async fn confirm_overwrite(&self, paths: &[String]) -> bool;
}

/// A native "open file" dialog
#[async_trait::async_trait]
pub trait IFilePicker: Send + Sync {
    /// Returns the chosen files, or `None` if the dialog was cancelled
    async fn pick_files(&self) -> Option<Vec<PathBuf>>;
}

/// Confirmation prompt with a fixed answer, for non-interactive use
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirm(pub bool);

#[async_trait::async_trait]
impl IConfirmPrompt for FixedConfirm {
    async fn confirm_overwrite(&self, _paths: &[String]) -> bool {
        self.0
    }
}

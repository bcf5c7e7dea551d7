//! Secret store port (driven/secondary port)
//!
//! Durable storage for the shared secret used to sign backend requests.
//! The transport reads it once at startup and writes it back after a
//! successful re-authentication.

use std::sync::{Mutex, PoisonError};

/// Port trait for persisting the shared signing secret
pub trait ISecretStore: Send + Sync {
    /// Loads the stored secret, `Ok(None)` if nothing was stored yet
    fn load(&self) -> anyhow::Result<Option<String>>;

    /// Replaces the stored secret
    fn store(&self, secret: &str) -> anyhow::Result<()>;

    /// Removes the stored secret
    fn clear(&self) -> anyhow::Result<()>;
}

/// Process-local secret store, lost on exit
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secret: Mutex<Option<String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Mutex::new(Some(secret.into())),
        }
    }
}

impl ISecretStore for MemorySecretStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .secret
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, secret: &str) -> anyhow::Result<()> {
        *self.secret.lock().unwrap_or_else(PoisonError::into_inner) = Some(secret.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.secret.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

//! Keyring-backed shared secret storage
//!
//! Stores the signing secret in the OS credential store (GNOME Keyring,
//! KDE Wallet, macOS Keychain) under a configurable service/user pair.

use anyhow::{Context, Result};
use mirrorfm_core::config::AuthConfig;
use mirrorfm_core::ports::ISecretStore;
use tracing::{debug, info};

/// [`ISecretStore`] backed by the system keyring
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
    user: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.keyring_service.clone(), config.keyring_user.clone())
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.user).context("Failed to create keyring entry")
    }
}

impl ISecretStore for KeyringSecretStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                debug!(service = %self.service, user = %self.user, "Loaded secret from keyring");
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(service = %self.service, user = %self.user, "No secret in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn store(&self, secret: &str) -> Result<()> {
        self.entry()?
            .set_password(secret)
            .context("Failed to store secret in keyring")?;
        debug!(service = %self.service, user = %self.user, "Stored secret in keyring");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(service = %self.service, user = %self.user, "Cleared secret from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

//! Remembered passwords for `moneytrack login --remember`.
//!
//! Entries are scoped to the backend they were accepted by, so the same
//! username on a local and a hosted backend keeps two separate passwords.

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_PREFIX: &str = "moneytrack";

/// Keychain service name for one backend.
fn service_name(backend_url: &str) -> String {
    let backend = backend_url.trim().trim_end_matches('/');
    format!("{}@{}", SERVICE_PREFIX, backend)
}

/// OS keychain entries for one backend, keyed by username.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    service: String,
}

impl CredentialStore {
    pub fn for_backend(backend_url: &str) -> Self {
        Self {
            service: service_name(backend_url),
        }
    }

    fn entry(&self, username: &str) -> Result<Entry> {
        Entry::new(&self.service, username).context("Failed to open keychain entry")
    }

    pub fn remember(&self, username: &str, password: &str) -> Result<()> {
        self.entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        debug!(service = %self.service, username, "Password remembered");
        Ok(())
    }

    /// The remembered password, or `None` when there is none.
    pub fn recall(&self, username: &str) -> Result<Option<String>> {
        match self.entry(username)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read password from keychain"),
        }
    }

    /// Returns whether an entry was removed.
    pub fn forget(&self, username: &str) -> Result<bool> {
        match self.entry(username)?.delete_credential() {
            Ok(()) => {
                debug!(service = %self.service, username, "Password forgotten");
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_is_per_backend() {
        assert_eq!(
            service_name("http://localhost:5000/"),
            "moneytrack@http://localhost:5000"
        );
        assert_eq!(
            CredentialStore::for_backend("https://api.example.com").service,
            CredentialStore::for_backend(" https://api.example.com/ ").service
        );
        assert_ne!(
            service_name("http://localhost:5000"),
            service_name("https://api.example.com")
        );
    }
}

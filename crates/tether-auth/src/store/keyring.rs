//! System keyring-based token storage (feature-gated).

use async_trait::async_trait;
use tether_core::TokenPair;
use tracing::debug;

use super::{StoreError, TokenStore};

/// Token storage in the OS credential store (Secret Service / Keychain /
/// Credential Manager).
///
/// The keyring API is blocking, so every call runs on the blocking pool.
#[derive(Clone, Debug)]
pub struct KeyringTokenStore {
    service: String,
    account: String,
}

impl KeyringTokenStore {
    /// Store under `service` / `account`.
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    async fn with_entry<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> Result<T, StoreError> + Send + 'static,
    {
        let service = self.service.clone();
        let account = self.account.clone();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &account)
                .map_err(|e| StoreError::Keyring(e.to_string()))?;
            op(entry)
        })
        .await
        .map_err(|e| StoreError::Keyring(format!("keyring task failed: {e}")))?
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        self.with_entry(|entry| match entry.get_password() {
            Ok(json) => match serde_json::from_str::<TokenPair>(&json) {
                Ok(pair) => {
                    debug!("token pair loaded from keyring");
                    Ok(Some(pair))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable keyring entry, ignoring");
                    Ok(None)
                }
            },
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring(e.to_string())),
        })
        .await
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let json = serde_json::to_string(pair)?;
        self.with_entry(move |entry| {
            entry
                .set_password(&json)
                .map_err(|e| StoreError::Keyring(e.to_string()))?;
            debug!("token pair saved to keyring");
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.with_entry(|entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keyring(e.to_string())),
        })
        .await
    }

    fn name(&self) -> &str {
        "keyring"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

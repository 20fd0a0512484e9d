//! Secure token storage.
//!
//! Provides the [`TokenStore`] trait and implementations:
//! - [`FileTokenStore`] - JSON envelope written atomically with 0600 permissions
//! - [`MemoryTokenStore`] - process-local slot (tests, ephemeral sessions)
//! - [`KeyringTokenStore`] - OS credential store (feature-gated)
//!
//! Each store holds a single slot: the token pair of this installation.

mod file;
mod memory;

#[cfg(feature = "keyring")]
mod keyring;

use std::sync::Arc;

use async_trait::async_trait;
use tether_core::{AuthError, TokenPair};
use tether_settings::{StorageBackend, StorageSettings};

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

#[cfg(feature = "keyring")]
pub use keyring::KeyringTokenStore;

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored entry could not be encoded.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// OS credential store error.
    #[error("keyring error: {0}")]
    Keyring(String),

    /// The configured backend is not available in this build.
    #[error("unsupported storage backend: {0}")]
    Unsupported(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Persistence(err.to_string())
    }
}

/// Durable single-slot persistence of the current token pair.
///
/// `save` and `clear` confirm: an `Ok` means the change is durable, an `Err`
/// means the caller must not treat the session as established (or removed).
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the stored pair, `None` when nothing usable is stored.
    async fn load(&self) -> Result<Option<TokenPair>, StoreError>;

    /// Replace the stored pair.
    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError>;

    /// Remove the stored pair. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        (**self).load().await
    }
    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        (**self).save(pair).await
    }
    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Blanket impl for `Box<T>`.
#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Box<T> {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        (**self).load().await
    }
    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        (**self).save(pair).await
    }
    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Open the store selected by `settings`.
pub fn open_store(settings: &StorageSettings) -> Result<Arc<dyn TokenStore>, StoreError> {
    match settings.backend {
        StorageBackend::File => Ok(Arc::new(FileTokenStore::new(settings.token_file_path()))),
        StorageBackend::Memory => Ok(Arc::new(MemoryTokenStore::new())),
        StorageBackend::Keyring => open_keyring(settings),
    }
}

#[cfg(feature = "keyring")]
#[allow(clippy::unnecessary_wraps)]
fn open_keyring(settings: &StorageSettings) -> Result<Arc<dyn TokenStore>, StoreError> {
    Ok(Arc::new(KeyringTokenStore::new(
        &settings.keyring_service,
        &settings.keyring_account,
    )))
}

#[cfg(not(feature = "keyring"))]
fn open_keyring(_settings: &StorageSettings) -> Result<Arc<dyn TokenStore>, StoreError> {
    Err(StoreError::Unsupported(
        "keyring (build with the `keyring` feature)".to_string(),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

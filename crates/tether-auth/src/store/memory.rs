//! In-memory token storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use tether_core::TokenPair;

use super::{StoreError, TokenStore};

/// Token storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `pair`, as if saved by a previous run.
    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            slot: RwLock::new(Some(pair)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.slot.read().clone())
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        *self.slot.write() = Some(pair.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.slot.write() = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

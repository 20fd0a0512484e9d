//! File-based token storage with secure permissions.
//!
//! The pair is wrapped in a versioned envelope and written to a sibling temp
//! file (created 0600) which is then renamed over the target, so a crash
//! mid-write never leaves a torn entry behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tether_core::TokenPair;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{StoreError, TokenStore};

/// Current envelope version.
const STORE_VERSION: u32 = 1;

/// On-disk shape of the token file.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    version: u32,
    tokens: TokenPair,
    saved_at: String,
}

/// Token pair persisted as a JSON file readable only by the owner.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create storage at the specified path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<StoredSession>(&data) {
            Ok(stored) if stored.version == STORE_VERSION => Ok(Some(stored.tokens)),
            Ok(stored) => {
                warn!(version = stored.version, path = %self.path.display(), "unsupported token file version, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "unreadable token file, ignoring");
                Ok(None)
            }
        }
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let stored = StoredSession {
            version: STORE_VERSION,
            tokens: pair.clone(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_vec_pretty(&stored)?;

        let temp = self.temp_path();
        match tokio::fs::remove_file(&temp).await {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let mut options = tokio::fs::OpenOptions::new();
        let _ = options.write(true).create_new(true);
        #[cfg(unix)]
        {
            let _ = options.mode(0o600);
        }
        let mut file = options.open(&temp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), "token pair saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "token file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

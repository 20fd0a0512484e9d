//! Token storage settings.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which secure storage backend holds the token pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Owner-only JSON file under the data directory.
    #[default]
    File,
    /// OS credential store (Keychain, Secret Service, Credential Manager).
    Keyring,
    /// Process memory only; the session does not survive a restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// Where and how the token pair is persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Storage backend.
    pub backend: StorageBackend,
    /// Data directory; `~/.tether` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// File name of the token file inside the data directory.
    pub file_name: String,
    /// Keyring service name.
    pub keyring_service: String,
    /// Keyring account (the single slot for this installation).
    pub keyring_account: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            dir: None,
            file_name: "session.json".to_string(),
            keyring_service: "tether".to_string(),
            keyring_account: "session".to_string(),
        }
    }
}

impl StorageSettings {
    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(),
        }
    }

    /// Full path of the token file.
    pub fn token_file_path(&self) -> PathBuf {
        self.data_dir().join(&self.file_name)
    }
}

/// `~/.tether`, falling back to `/tmp/.tether` without a home directory.
pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tether")
}

//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may contain any subset of fields and the rest keep their defaults.

mod api;
mod session;
mod storage;

pub use api::*;
pub use session::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// Loaded from `~/.tether/settings.json` with defaults applied for missing
/// fields. Example:
///
/// ```json
/// {
///   "api": { "baseUrl": "https://api.example.com" },
///   "storage": { "backend": "keyring" },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TetherSettings {
    /// Settings schema version.
    pub version: String,
    /// Auth API endpoints and transport policy.
    pub api: ApiSettings,
    /// Where the token pair is persisted.
    pub storage: StorageSettings,
    /// Session lifecycle behavior.
    pub session: SessionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for TetherSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            api: ApiSettings::default(),
            storage: StorageSettings::default(),
            session: SessionSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

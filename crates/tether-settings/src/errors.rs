//! Settings error types.

use thiserror::Error;

/// Why a settings layer could not be applied.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("settings file unreadable: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON, or a value has the wrong shape.
    #[error("settings file malformed: {0}")]
    Json(#[from] serde_json::Error),
    /// A value parsed but cannot produce a working client.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// camelCase path of the offending field, e.g. `api.baseUrl`.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TetherSettings::default()`]
//! 2. If `~/.tether/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TETHER_*` environment variable overrides (highest priority)
//! 4. Reject values that cannot work at all (empty base URL, zero timeout)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{StorageBackend, TetherSettings, default_data_dir};

/// Resolve the path to the settings file (`~/.tether/settings.json`).
pub fn settings_path() -> PathBuf {
    default_data_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TetherSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TetherSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file_layer(path: &Path) -> Result<TetherSettings> {
    let defaults = serde_json::to_value(TetherSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning and the file/default value kept.
pub fn apply_env_overrides(settings: &mut TetherSettings) {
    if let Some(v) = read_env_string("TETHER_API_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = read_env_u64("TETHER_TIMEOUT_MS", 1000, 600_000) {
        settings.api.timeout_ms = v;
    }
    if let Some(v) = read_env_backend("TETHER_STORAGE_BACKEND") {
        settings.storage.backend = v;
    }
    if let Some(v) = read_env_string("TETHER_DATA_DIR") {
        settings.storage.dir = Some(v);
    }
    if let Some(v) = read_env_string("TETHER_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject settings that cannot produce a working client.
pub fn validate(settings: &TetherSettings) -> Result<()> {
    let invalid = |field: &'static str, reason: &'static str| -> Result<()> {
        Err(SettingsError::InvalidValue { field, reason })
    };
    if settings.api.base_url.trim().is_empty() {
        return invalid("api.baseUrl", "must not be empty");
    }
    if settings.api.timeout_ms == 0 {
        return invalid("api.timeoutMs", "must be positive");
    }
    if settings.storage.file_name.trim().is_empty() {
        return invalid("storage.fileName", "must not be empty");
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_backend(name: &str) -> Option<StorageBackend> {
    let val = std::env::var(name).ok()?;
    match val.parse() {
        Ok(backend) => Some(backend),
        Err(e) => {
            tracing::warn!(key = name, value = %val, error = %e, "invalid storage backend env var, ignoring");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "api": {"baseUrl": "http://localhost:3000", "timeoutMs": 30000}
        });
        let source = serde_json::json!({
            "api": {"baseUrl": "https://api.example.com"}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["api"]["baseUrl"], "https://api.example.com");
        assert_eq!(merged["api"]["timeoutMs"], 30000);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.api.base_url, "http://localhost:3000");
        assert_eq!(settings.storage.backend, StorageBackend::File);
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"storage": {"backend": "memory"}, "session": {"clearRetry": {"maxRetries": 2}}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.storage.file_name, "session.json");
        assert_eq!(settings.session.clear_retry.max_retries, 2);
        assert_eq!(settings.session.clear_retry.base_delay_ms, 1000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert_matches!(load_file_layer(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn unknown_backend_in_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"storage": {"backend": "sqlite"}}"#).unwrap();
        assert_matches!(load_file_layer(&path), Err(SettingsError::Json(_)));
    }

    // ── validate ────────────────────────────────────────────────────

    #[test]
    fn defaults_validate() {
        assert!(validate(&TetherSettings::default()).is_ok());
    }

    #[test]
    fn empty_base_url_rejected() {
        let mut settings = TetherSettings::default();
        settings.api.base_url = "  ".to_string();
        assert_matches!(
            validate(&settings),
            Err(SettingsError::InvalidValue { field: "api.baseUrl", .. })
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut settings = TetherSettings::default();
        settings.api.timeout_ms = 0;
        assert_matches!(
            validate(&settings),
            Err(SettingsError::InvalidValue { field: "api.timeoutMs", .. })
        );
    }

    // ── parse_u64_range ─────────────────────────────────────────────

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("30000", 1000, 600_000), Some(30_000));
        assert_eq!(parse_u64_range("500", 1000, 600_000), None);
        assert_eq!(parse_u64_range("700000", 1000, 600_000), None);
        assert_eq!(parse_u64_range("abc", 1000, 600_000), None);
    }
}

//! Auth API endpoint settings.

use serde::{Deserialize, Serialize};

/// Where the auth exchanges are sent, and the transport timeout applied to them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Scheme and host of the API, without a trailing path.
    pub base_url: String,
    /// Path of the login exchange.
    pub login_path: String,
    /// Path of the registration exchange.
    pub register_path: String,
    /// Path of the token refresh exchange.
    pub refresh_path: String,
    /// Transport-level timeout for every request, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            login_path: "/auth/login".to_string(),
            register_path: "/auth/register".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl ApiSettings {
    /// Same settings pointed at another host, e.g. a mock server in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Absolute URL of the login exchange.
    pub fn login_url(&self) -> String {
        self.join(&self.login_path)
    }

    /// Absolute URL of the registration exchange.
    pub fn register_url(&self) -> String {
        self.join(&self.register_path)
    }

    /// Absolute URL of the refresh exchange.
    pub fn refresh_url(&self) -> String {
        self.join(&self.refresh_path)
    }

    fn join(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

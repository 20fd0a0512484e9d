//! Session lifecycle settings.

use serde::{Deserialize, Serialize};
use tether_core::RetryConfig;

/// Session behavior settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Backoff for clearing stored tokens after a sign-out whose first clear
    /// attempt failed.
    pub clear_retry: RetryConfig,
}

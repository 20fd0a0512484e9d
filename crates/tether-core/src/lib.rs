//! # tether-core
//!
//! Foundation types shared by every Tether crate.
//!
//! - **Tokens**: [`TokenPair`], the atomic access/refresh credential pair
//! - **Credentials**: [`LoginCredentials`] and [`RegisterCredentials`], held only
//!   for the duration of a single exchange
//! - **Validation**: client-side checks run before any network call
//! - **Errors**: the closed [`AuthError`] taxonomy surfaced to screens
//! - **Retry**: backoff math used by background storage retries
//! - **Logging**: `tracing` subscriber bootstrap and log capture for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod retry;
pub mod types;
pub mod validation;

pub use errors::{AuthError, CONNECTIVITY_MESSAGE, ErrorKind};
pub use retry::RetryConfig;
pub use types::{LoginCredentials, RegisterCredentials, TokenPair};
pub use validation::{MIN_PASSWORD_LENGTH, check_password_confirmation};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

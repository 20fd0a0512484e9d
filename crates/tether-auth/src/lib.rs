//! # tether-auth
//!
//! Network auth exchanges and durable token storage.
//!
//! - [`AuthApi`] / [`AuthClient`]: login, register and refresh over HTTP,
//!   with every failure classified into [`tether_core::AuthError`]
//! - [`classify`]: the pure transport-outcome classifier behind it
//! - [`TokenStore`]: single-slot persistence with file, memory and keyring
//!   backends, selected by [`open_store`]
//!
//! Nothing in this crate touches session state; the session crate is the only
//! writer of the store.

#![deny(unsafe_code)]

pub mod classify;
pub mod client;
pub mod store;

pub use classify::{Exchange, TransportOutcome, parse_error_message};
pub use client::{AuthApi, AuthClient, MISSING_SESSION_MESSAGE};
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore, open_store};

#[cfg(feature = "keyring")]
pub use store::KeyringTokenStore;

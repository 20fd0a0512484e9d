//! # tether-session
//!
//! The session layer between auth exchanges and the rest of the app.
//!
//! - [`SessionState`] / [`SessionSubscription`]: the observable
//!   unknown/anonymous/authenticated value screens render from
//! - [`SessionManager`]: sign-in, sign-out, startup restore and coordinated
//!   refresh; the only writer of the token store
//! - [`RequestAuthorizer`]: bearer tokens on outgoing requests with a single
//!   refresh-and-retry on 401

#![deny(unsafe_code)]

pub mod authorizer;
pub mod manager;
pub mod state;

pub use authorizer::{RequestAuthorizer, RequestError};
pub use manager::SessionManager;
pub use state::{SessionPublisher, SessionState, SessionSubscription};

//! Transport outcome classification.
//!
//! Maps what came back from the wire (no response at all, or a status code
//! and a body) onto the closed [`AuthError`] taxonomy. Pure: no I/O, no
//! logging, so every row of the mapping is unit-testable.

use std::fmt;

use serde_json::Value;
use tether_core::AuthError;

/// Which auth exchange produced the outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exchange {
    /// Username/password login.
    Login,
    /// Invite-gated account registration.
    Register,
    /// Refresh-token exchange.
    Refresh,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::Refresh => "refresh",
        })
    }
}

/// What the transport observed for a failed exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The request never got a response (DNS, connect, TLS, timeout).
    NoResponse {
        /// Transport-level description, kept for logs.
        detail: String,
    },
    /// The server answered with a non-success status.
    Response {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

/// Classify a failed exchange.
pub fn classify(exchange: Exchange, outcome: TransportOutcome) -> AuthError {
    let (status, body) = match outcome {
        TransportOutcome::NoResponse { detail } => return AuthError::Network(detail),
        TransportOutcome::Response { status, body } => (status, body),
    };
    let message = parse_error_message(status, &body);

    match (exchange, status) {
        (Exchange::Refresh, 400 | 401 | 403 | 422) => AuthError::RefreshRejected(message),

        (Exchange::Login, 400 | 422) => AuthError::Validation(message),
        (Exchange::Login, 401 | 403) => AuthError::InvalidCredentials(message),

        (Exchange::Register, 400 | 422) if mentions_invite(&message) => {
            AuthError::InvalidInvite(message)
        }
        (Exchange::Register, 400 | 401 | 422) => AuthError::Validation(message),
        (Exchange::Register, 403) => AuthError::InvalidInvite(message),
        (Exchange::Register, 409) => AuthError::UsernameTaken(message),

        _ => AuthError::ServerError { status, message },
    }
}

/// Extract a displayable message from an error body.
///
/// `{"message": "..."}` yields the string, `{"message": ["a", "b"]}` yields
/// the entries joined by newlines. Anything else falls back to a generic
/// status line.
pub fn parse_error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("message") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Array(items)) => {
                let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                (!parts.is_empty()).then(|| parts.join("\n"))
            }
            _ => None,
        });

    parsed.unwrap_or_else(|| format!("Request failed with status code {status}"))
}

fn mentions_invite(message: &str) -> bool {
    message.to_lowercase().contains("invite")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Auth error taxonomy.
//!
//! Every failure that reaches a screen or the `SessionManager` is one of the
//! [`AuthError`] variants below. Raw transport errors are classified before
//! they leave the HTTP layer, and storage errors are converted at the session
//! boundary, so callers only ever match on this closed set.

use std::fmt;

/// Message shown when no response reached the server.
pub const CONNECTIVITY_MESSAGE: &str =
    "Unable to reach the server. Please check your internet connection and try again.";

/// Errors surfaced by authentication and session operations.
///
/// `Clone` so that a single refresh outcome can be handed to every caller
/// waiting on it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing input, detected client-side or rejected by the
    /// server as malformed.
    #[error("{0}")]
    Validation(String),

    /// The server rejected the username/password combination.
    #[error("{0}")]
    InvalidCredentials(String),

    /// The server rejected the invite code.
    #[error("{0}")]
    InvalidInvite(String),

    /// The username is already registered.
    #[error("{0}")]
    UsernameTaken(String),

    /// No response reached the server.
    #[error("network error: {0}")]
    Network(String),

    /// The server was reached but failed.
    #[error("server error ({status}): {message}")]
    ServerError {
        /// HTTP status code returned by the server.
        status: u16,
        /// Error description.
        message: String,
    },

    /// The refresh token is invalid, expired, or revoked.
    #[error("refresh rejected: {0}")]
    RefreshRejected(String),

    /// Secure storage could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// No authenticated session is present.
    #[error("not authenticated")]
    Unauthenticated,
}

/// Discriminant of [`AuthError`] without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`AuthError::Validation`].
    Validation,
    /// See [`AuthError::InvalidCredentials`].
    InvalidCredentials,
    /// See [`AuthError::InvalidInvite`].
    InvalidInvite,
    /// See [`AuthError::UsernameTaken`].
    UsernameTaken,
    /// See [`AuthError::Network`].
    Network,
    /// See [`AuthError::ServerError`].
    ServerError,
    /// See [`AuthError::RefreshRejected`].
    RefreshRejected,
    /// See [`AuthError::Persistence`].
    Persistence,
    /// See [`AuthError::Unauthenticated`].
    Unauthenticated,
}

impl AuthError {
    /// Error kind for matching without the payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Self::InvalidInvite(_) => ErrorKind::InvalidInvite,
            Self::UsernameTaken(_) => ErrorKind::UsernameTaken,
            Self::Network(_) => ErrorKind::Network,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::RefreshRejected(_) => ErrorKind::RefreshRejected,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
        }
    }

    /// Whether the user may simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ServerError { .. })
    }

    /// Text to render on a form or banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::InvalidCredentials(msg)
            | Self::InvalidInvite(msg)
            | Self::UsernameTaken(msg) => msg.clone(),
            Self::Network(_) => CONNECTIVITY_MESSAGE.to_string(),
            Self::ServerError { message, .. } => message.clone(),
            Self::RefreshRejected(_) => "Your session has expired. Please sign in again.".to_string(),
            Self::Persistence(_) => {
                "Your session could not be saved on this device. Please try again.".to_string()
            }
            Self::Unauthenticated => "Please sign in to continue.".to_string(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidInvite => "invalid_invite",
            Self::UsernameTaken => "username_taken",
            Self::Network => "network",
            Self::ServerError => "server_error",
            Self::RefreshRejected => "refresh_rejected",
            Self::Persistence => "persistence",
            Self::Unauthenticated => "unauthenticated",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

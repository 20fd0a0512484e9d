//! Token pair and credential types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

/// Access/refresh credential pair produced by a login, register, or refresh
/// exchange.
///
/// Both fields are non-empty, and the pair is only ever replaced as a whole.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTokenPair")]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
}

/// Unvalidated wire shape, checked on the way in.
#[derive(Deserialize)]
struct RawTokenPair {
    access_token: String,
    refresh_token: String,
}

impl TryFrom<RawTokenPair> for TokenPair {
    type Error = AuthError;

    fn try_from(raw: RawTokenPair) -> Result<Self, Self::Error> {
        Self::new(raw.access_token, raw.refresh_token)
    }
}

impl TokenPair {
    /// Build a pair, rejecting empty tokens.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.is_empty() {
            return Err(AuthError::Validation(
                "access token must not be empty".to_string(),
            ));
        }
        if refresh_token.is_empty() {
            return Err(AuthError::Validation(
                "refresh token must not be empty".to_string(),
            ));
        }
        Ok(Self {
            access_token,
            refresh_token,
        })
    }

    /// Short-lived bearer credential.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Long-lived credential used only to mint new access tokens.
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Username/password pair for the login exchange.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl LoginCredentials {
    /// Bundle a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration form payload.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredentials {
    /// Requested username.
    pub username: String,
    /// Chosen password.
    pub password: String,
    /// Invite code handed out by an existing member.
    pub invite_code: String,
}

impl RegisterCredentials {
    /// Bundle registration fields.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        invite_code: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            invite_code: invite_code.into(),
        }
    }
}

impl fmt::Debug for RegisterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("invite_code", &self.invite_code)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

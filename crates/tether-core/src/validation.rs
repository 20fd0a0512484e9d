//! Client-side credential checks.
//!
//! These run before any network activity so that obviously bad input never
//! leaves the device. Each check returns the first failing field as
//! [`AuthError::Validation`] with a message suitable for display.

use crate::errors::AuthError;
use crate::types::{LoginCredentials, RegisterCredentials};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

impl LoginCredentials {
    /// Check the fields before attempting a login.
    pub fn validate(&self) -> Result<(), AuthError> {
        check_username(&self.username)?;
        check_password(&self.password)
    }
}

impl RegisterCredentials {
    /// Check the fields before attempting a registration.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.invite_code.trim().is_empty() {
            return Err(invalid("Invite code is required"));
        }
        check_username(&self.username)?;
        check_password(&self.password)
    }
}

/// Check that the confirmation field of a registration form matches.
pub fn check_password_confirmation(password: &str, confirmation: &str) -> Result<(), AuthError> {
    if password == confirmation {
        Ok(())
    } else {
        Err(invalid("Passwords do not match"))
    }
}

fn check_username(username: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(invalid("Username is required"));
    }
    Ok(())
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(invalid("Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(invalid("Password must be at least 6 characters"));
    }
    Ok(())
}

fn invalid(message: &str) -> AuthError {
    AuthError::Validation(message.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

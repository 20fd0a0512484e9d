//! HTTP auth client.
//!
//! Performs the login, register and refresh exchanges against the auth API.
//! Every failure leaves this module already classified as an [`AuthError`];
//! `reqwest` errors never escape.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tether_core::{AuthError, LoginCredentials, RegisterCredentials, TokenPair};
use tether_settings::ApiSettings;
use tracing::{debug, warn};

use crate::classify::{Exchange, TransportOutcome, classify};

/// Message used when a 2xx response does not carry a usable token pair.
pub const MISSING_SESSION_MESSAGE: &str = "response did not include a session";

/// The three auth exchanges.
///
/// Implemented by [`AuthClient`] over HTTP; the session layer only depends on
/// this trait so tests can substitute a scripted fake.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange a username and password for a token pair.
    async fn login(&self, credentials: &LoginCredentials) -> Result<TokenPair, AuthError>;

    /// Create an account and receive its first token pair.
    async fn register(&self, credentials: &RegisterCredentials) -> Result<TokenPair, AuthError>;

    /// Mint a new token pair from a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
}

#[async_trait]
impl<T: AuthApi + ?Sized> AuthApi for Arc<T> {
    async fn login(&self, credentials: &LoginCredentials) -> Result<TokenPair, AuthError> {
        (**self).login(credentials).await
    }
    async fn register(&self, credentials: &RegisterCredentials) -> Result<TokenPair, AuthError> {
        (**self).register(credentials).await
    }
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        (**self).refresh(refresh_token).await
    }
}

/// Request body of the refresh exchange.
#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// `reqwest`-backed [`AuthApi`].
#[derive(Clone, Debug)]
pub struct AuthClient {
    http: reqwest::Client,
    api: ApiSettings,
}

impl AuthClient {
    /// Build a client whose requests time out after `api.timeout_ms`.
    pub fn from_settings(api: &ApiSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(api.timeout_ms))
            .build()?;
        Ok(Self::with_client(http, api.clone()))
    }

    /// Wrap an existing HTTP client (shared connection pool).
    pub fn with_client(http: reqwest::Client, api: ApiSettings) -> Self {
        Self { http, api }
    }

    /// Endpoint settings in use.
    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    #[tracing::instrument(skip_all, fields(exchange = %exchange))]
    async fn exchange<B: Serialize + Sync + ?Sized>(
        &self,
        exchange: Exchange,
        url: &str,
        body: &B,
    ) -> Result<TokenPair, AuthError> {
        let response = match self.http.post(url).json(body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "auth exchange got no response");
                return Err(classify(
                    exchange,
                    TransportOutcome::NoResponse {
                        detail: e.to_string(),
                    },
                ));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if status.is_success() => {
                warn!(status = status.as_u16(), error = %e, "auth response body unreadable");
                return Err(classify(
                    exchange,
                    TransportOutcome::NoResponse {
                        detail: e.to_string(),
                    },
                ));
            }
            Err(e) => {
                debug!(status = status.as_u16(), error = %e, "error body unreadable, classifying by status");
                String::new()
            }
        };

        if !status.is_success() {
            let err = classify(
                exchange,
                TransportOutcome::Response {
                    status: status.as_u16(),
                    body: text,
                },
            );
            warn!(status = status.as_u16(), kind = %err.kind(), "auth exchange rejected");
            return Err(err);
        }

        match serde_json::from_str::<TokenPair>(&text) {
            Ok(pair) => {
                debug!(status = status.as_u16(), "auth exchange succeeded");
                Ok(pair)
            }
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "auth response without a token pair");
                Err(AuthError::ServerError {
                    status: status.as_u16(),
                    message: MISSING_SESSION_MESSAGE.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, credentials: &LoginCredentials) -> Result<TokenPair, AuthError> {
        credentials.validate()?;
        self.exchange(Exchange::Login, &self.api.login_url(), credentials)
            .await
    }

    async fn register(&self, credentials: &RegisterCredentials) -> Result<TokenPair, AuthError> {
        credentials.validate()?;
        self.exchange(Exchange::Register, &self.api.register_url(), credentials)
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }
        self.exchange(
            Exchange::Refresh,
            &self.api.refresh_url(),
            &RefreshRequest { refresh_token },
        )
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

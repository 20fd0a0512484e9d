//! Bearer authorization for outgoing API requests.
//!
//! [`RequestAuthorizer::send`] attaches the current access token, and on a
//! 401 retries exactly once with a fresh token: either one another request
//! already obtained, or one from a coordinated refresh.

use reqwest::{RequestBuilder, Response, StatusCode};
use tether_core::AuthError;
use tracing::{debug, warn};

use crate::manager::SessionManager;

/// Failures of an authorized request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// No session to authorize the request with.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The request itself failed in transport.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP layer collaborator of the [`SessionManager`].
#[derive(Clone)]
pub struct RequestAuthorizer {
    session: SessionManager,
    client: reqwest::Client,
}

impl RequestAuthorizer {
    /// Authorize requests built on `client` with tokens from `session`.
    pub fn new(session: SessionManager, client: reqwest::Client) -> Self {
        Self { session, client }
    }

    /// Underlying HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Build, authorize and send a request.
    ///
    /// `build` is called once per attempt, so it must be repeatable. If the
    /// refresh after a 401 fails, or a different session was established
    /// while the request was in flight, the original 401 response is
    /// returned.
    pub async fn send<F>(&self, build: F) -> Result<Response, RequestError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let (generation, token) = self.session.held_access_token()?;
        let response = build(&self.client).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let retry_token = match self.session.held_access_token() {
            Ok((current_generation, _)) if current_generation != generation => {
                debug!("session replaced while request was in flight, not replaying");
                return Ok(response);
            }
            Ok((_, current)) if current != token => {
                debug!("access token rotated by another request, retrying");
                current
            }
            _ => match self.session.refresh_for(generation).await {
                Ok(pair) => pair.access_token().to_string(),
                Err(e) => {
                    warn!(kind = %e.kind(), "refresh after 401 failed, returning original response");
                    return Ok(response);
                }
            },
        };

        Ok(build(&self.client).bearer_auth(&retry_token).send().await?)
    }
}

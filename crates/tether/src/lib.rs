//! # tether
//!
//! Durable, refreshable sessions for an app's screens and HTTP calls.
//!
//! [`start`] wires the process-wide instance from settings: logging, the
//! auth client, the token store, and the [`SessionManager`], whose stored
//! session is resolved before `start` returns. Screens then use
//! [`Tether::log_in`] / [`Tether::register`] / [`Tether::sign_out`] and
//! render from [`Tether::subscribe`]; API calls go through
//! [`Tether::requests`].
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use tether::{LoginCredentials, start};
//!
//! let app = start(tether_settings::get_settings()).await?;
//! if !app.session.current().is_authenticated() {
//!     app.log_in(&LoginCredentials::new("alice", "secret123")).await?;
//! }
//! let profile = app.requests.send(|c| c.get("https://api.example.com/profile")).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

use std::sync::Arc;

use tether_auth::{AuthApi, AuthClient, StoreError, TokenStore, open_store};
use tether_settings::TetherSettings;
use tracing::{info, warn};

pub use tether_core::{AuthError, ErrorKind, LoginCredentials, RegisterCredentials, TokenPair};
pub use tether_session::{
    RequestAuthorizer, RequestError, SessionManager, SessionState, SessionSubscription,
};

/// Startup failures. Everything after startup reports [`AuthError`].
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured token store could not be opened.
    #[error("failed to open token store: {0}")]
    Store(#[from] StoreError),
}

/// The wired session stack.
#[derive(Clone)]
pub struct Tether {
    /// Auth exchanges.
    pub auth: Arc<AuthClient>,
    /// Session orchestrator.
    pub session: SessionManager,
    /// Authorized HTTP requests.
    pub requests: RequestAuthorizer,
}

/// Build the session stack from `settings` and resolve the stored session.
///
/// A store that cannot be read does not fail startup: the app starts
/// anonymous and the failure is logged.
pub async fn start(settings: &TetherSettings) -> Result<Tether, StartError> {
    tether_core::logging::init_subscriber(&settings.logging.level);

    let auth = Arc::new(AuthClient::from_settings(&settings.api)?);
    let store = open_store(&settings.storage)?;
    let backend = store.name().to_string();
    let session = SessionManager::with_settings(auth.clone(), store, &settings.session);

    match session.initialize().await {
        Ok(state) => info!(
            backend = %backend,
            authenticated = state.is_authenticated(),
            "session resolved"
        ),
        Err(e) => warn!(backend = %backend, error = %e, "starting anonymous, stored session unreadable"),
    }

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(settings.api.timeout_ms))
        .build()?;
    let requests = RequestAuthorizer::new(session.clone(), http);

    Ok(Tether {
        auth,
        session,
        requests,
    })
}

impl Tether {
    /// Log in and establish the session.
    ///
    /// On failure the state is unchanged, so the form can keep its input.
    #[tracing::instrument(skip_all)]
    pub async fn log_in(&self, credentials: &LoginCredentials) -> Result<(), AuthError> {
        let pair = self.auth.login(credentials).await?;
        self.session.sign_in(pair).await
    }

    /// Register an account and establish its session.
    #[tracing::instrument(skip_all)]
    pub async fn register(&self, credentials: &RegisterCredentials) -> Result<(), AuthError> {
        let pair = self.auth.register(credentials).await?;
        self.session.sign_in(pair).await
    }

    /// End the session.
    pub async fn sign_out(&self) {
        self.session.sign_out().await;
    }

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> SessionSubscription {
        self.session.subscribe()
    }
}

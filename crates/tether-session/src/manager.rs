//! Session lifecycle orchestration.
//!
//! [`SessionManager`] is the only writer of the token store and of the
//! published [`SessionState`]. It owns:
//!
//! - **Startup**: [`SessionManager::initialize`] reads the store once and
//!   resolves `Unknown` into `Authenticated` or `Anonymous`
//! - **Sign-in / sign-out**: persist first, then publish. Sign-out is
//!   fail-open and retries clearing the store in the background
//! - **Refresh coordination**: at most one refresh exchange is in flight;
//!   concurrent callers join it and receive the same outcome
//!
//! Every store write and state transition happens under one async writer
//! lock. A session generation counter, bumped on sign-in and sign-out, lets a
//! refresh detect that the session it started from is gone and discard its
//! result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tether_auth::{AuthApi, TokenStore};
use tether_core::{AuthError, RetryConfig, TokenPair};
use tether_settings::SessionSettings;
use tracing::{debug, error, info, warn};

use crate::state::{SessionPublisher, SessionState, SessionSubscription};

type RefreshFuture = Shared<BoxFuture<'static, Result<TokenPair, AuthError>>>;

/// The refresh currently in flight.
struct InFlight {
    id: u64,
    /// Session generation the exchange was started for.
    generation: u64,
    future: RefreshFuture,
}

/// In-memory copy of the held session.
#[derive(Default)]
struct Session {
    generation: u64,
    tokens: Option<TokenPair>,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    state: SessionPublisher,
    session: Mutex<Session>,
    writer: tokio::sync::Mutex<()>,
    inflight: Mutex<Option<InFlight>>,
    next_flight: AtomicU64,
    clear_retry: RetryConfig,
}

/// Process-wide session orchestrator.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Manager with default session settings.
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn TokenStore>) -> Self {
        Self::with_settings(api, store, &SessionSettings::default())
    }

    /// Manager configured from `settings`.
    pub fn with_settings(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn TokenStore>,
        settings: &SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                state: SessionPublisher::new(),
                session: Mutex::new(Session::default()),
                writer: tokio::sync::Mutex::new(()),
                inflight: Mutex::new(None),
                next_flight: AtomicU64::new(0),
                clear_retry: settings.clear_retry.clone(),
            }),
        }
    }

    /// Resolve the stored session. Only acts while the state is `Unknown`.
    ///
    /// A store read failure still resolves to `Anonymous`, and the failure is
    /// returned so the caller can report it.
    pub async fn initialize(&self) -> Result<SessionState, AuthError> {
        let inner = &self.inner;
        let _writer = inner.writer.lock().await;
        if inner.state.current().is_known() {
            return Ok(inner.state.current());
        }

        match inner.store.load().await {
            Ok(Some(pair)) => {
                let state = SessionState::authenticated(pair.access_token());
                inner.session.lock().tokens = Some(pair);
                let _ = inner.state.publish(state.clone());
                info!(backend = inner.store.name(), "restored stored session");
                Ok(state)
            }
            Ok(None) => {
                let _ = inner.state.publish(SessionState::Anonymous);
                debug!(backend = inner.store.name(), "no stored session");
                Ok(SessionState::Anonymous)
            }
            Err(e) => {
                warn!(backend = inner.store.name(), error = %e, "failed to read stored session");
                let _ = inner.state.publish(SessionState::Anonymous);
                Err(e.into())
            }
        }
    }

    /// Accept a token pair from a login or registration exchange.
    ///
    /// The pair is persisted before it is published; if persisting fails
    /// nothing changes and `Persistence` is returned. Signing in again with
    /// the held pair is a no-op.
    pub async fn sign_in(&self, pair: TokenPair) -> Result<(), AuthError> {
        let inner = &self.inner;
        let _writer = inner.writer.lock().await;

        if inner.session.lock().tokens.as_ref() == Some(&pair) {
            debug!("already signed in with this token pair");
            return Ok(());
        }

        if let Err(e) = inner.store.save(&pair).await {
            warn!(backend = inner.store.name(), error = %e, "failed to persist session");
            return Err(e.into());
        }

        let state = SessionState::authenticated(pair.access_token());
        {
            let mut session = inner.session.lock();
            session.generation += 1;
            session.tokens = Some(pair);
        }
        let _ = inner.state.publish(state);
        info!("signed in");
        Ok(())
    }

    /// End the session. Always succeeds from the caller's point of view.
    ///
    /// The state becomes `Anonymous` immediately. If the store cannot be
    /// cleared, clearing is retried in the background with backoff.
    pub async fn sign_out(&self) {
        let _writer = self.inner.writer.lock().await;
        self.inner.end_session().await;
        info!("signed out");
    }

    /// The current access token, without any network activity.
    pub fn valid_access_token(&self) -> Result<String, AuthError> {
        match self.inner.state.current() {
            SessionState::Authenticated { access_token } => Ok(access_token),
            _ => Err(AuthError::Unauthenticated),
        }
    }

    /// The held access token together with the generation of the session
    /// it belongs to.
    pub(crate) fn held_access_token(&self) -> Result<(u64, String), AuthError> {
        let session = self.inner.session.lock();
        match &session.tokens {
            Some(pair) => Ok((session.generation, pair.access_token().to_string())),
            None => Err(AuthError::Unauthenticated),
        }
    }

    /// Exchange the held refresh token for a new pair.
    ///
    /// If a refresh for the same session is already in flight this joins it
    /// instead of starting a second exchange; every caller receives the same
    /// outcome. A flight left over from an ended session is never joined. The
    /// exchange runs to completion even if all callers stop waiting.
    ///
    /// `RefreshRejected` ends the session. A result that arrives after the
    /// session it was started for has ended is discarded and reported as
    /// `Unauthenticated`.
    pub async fn refresh_session(&self) -> Result<TokenPair, AuthError> {
        self.refresh(None).await
    }

    /// Refresh only if the held session is still generation `generation`.
    pub(crate) async fn refresh_for(&self, generation: u64) -> Result<TokenPair, AuthError> {
        self.refresh(Some(generation)).await
    }

    async fn refresh(&self, expected: Option<u64>) -> Result<TokenPair, AuthError> {
        let future = {
            let mut slot = self.inner.inflight.lock();
            let (generation, refresh_token) = {
                let session = self.inner.session.lock();
                match &session.tokens {
                    Some(pair) if expected.is_none_or(|g| g == session.generation) => {
                        (session.generation, pair.refresh_token().to_string())
                    }
                    _ => return Err(AuthError::Unauthenticated),
                }
            };

            let joinable = slot
                .as_ref()
                .filter(|flight| flight.generation == generation)
                .map(|flight| (flight.id, flight.future.clone()));

            if let Some((id, future)) = joinable {
                debug!(flight = id, "joining in-flight refresh");
                future
            } else {
                if let Some(stale) = slot.as_ref() {
                    debug!(flight = stale.id, "in-flight refresh belongs to an ended session");
                }

                let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
                let inner = Arc::clone(&self.inner);
                let future = async move {
                    let result = inner.run_refresh(generation, refresh_token).await;
                    inner.finish_flight(id);
                    result
                }
                .boxed()
                .shared();

                *slot = Some(InFlight {
                    id,
                    generation,
                    future: future.clone(),
                });
                let _driver = tokio::spawn(future.clone());
                future
            }
        };
        future.await
    }

    /// Whether a refresh exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.inflight.lock().is_some()
    }

    /// Current session state.
    pub fn current(&self) -> SessionState {
        self.inner.state.current()
    }

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> SessionSubscription {
        self.inner.state.subscribe()
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        let session = self.session.lock();
        session.generation == generation && session.tokens.is_some()
    }

    fn finish_flight(&self, id: u64) {
        let mut slot = self.inflight.lock();
        if slot.as_ref().is_some_and(|flight| flight.id == id) {
            *slot = None;
        }
    }

    #[tracing::instrument(skip_all, fields(generation = generation))]
    async fn run_refresh(
        self: &Arc<Self>,
        generation: u64,
        refresh_token: String,
    ) -> Result<TokenPair, AuthError> {
        let outcome = self.api.refresh(&refresh_token).await;

        let _writer = self.writer.lock().await;
        if !self.is_current(generation) {
            debug!("session changed during refresh, discarding result");
            return match outcome {
                Ok(_) => Err(AuthError::Unauthenticated),
                Err(e) => Err(e),
            };
        }

        match outcome {
            Ok(pair) => {
                if let Err(e) = self.store.save(&pair).await {
                    warn!(backend = self.store.name(), error = %e, "failed to persist refreshed session");
                    return Err(e.into());
                }
                let state = SessionState::authenticated(pair.access_token());
                self.session.lock().tokens = Some(pair.clone());
                self.state.publish_always(state);
                info!("session refreshed");
                Ok(pair)
            }
            Err(err @ AuthError::RefreshRejected(_)) => {
                warn!(error = %err, "refresh token rejected, ending session");
                self.end_session().await;
                Err(err)
            }
            Err(err) => {
                warn!(kind = %err.kind(), error = %err, "refresh failed");
                Err(err)
            }
        }
    }

    /// Drop the held session and clear the store. Caller holds the writer.
    async fn end_session(self: &Arc<Self>) {
        let generation = {
            let mut session = self.session.lock();
            session.generation += 1;
            session.tokens = None;
            session.generation
        };
        let _ = self.state.publish(SessionState::Anonymous);

        if let Err(e) = self.store.clear().await {
            warn!(
                backend = self.store.name(),
                error = %e,
                "could not clear stored tokens, retrying in background"
            );
            let inner = Arc::clone(self);
            let _retry = tokio::spawn(async move { inner.retry_clear(generation).await });
        }
    }

    async fn retry_clear(&self, generation: u64) {
        let config = &self.clear_retry;
        for attempt in 0..config.max_retries {
            tokio::time::sleep(config.delay_for(attempt, rand::random::<f64>())).await;

            let _writer = self.writer.lock().await;
            if self.session.lock().generation != generation {
                debug!("new session since sign-out, abandoning clear retry");
                return;
            }
            match self.store.clear().await {
                Ok(()) => {
                    info!(attempt = attempt + 1, "stored tokens cleared after retry");
                    return;
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "retry of stored token clear failed");
                }
            }
        }
        error!(
            attempts = config.max_retries,
            backend = self.store.name(),
            "giving up clearing stored tokens; a stale session remains on this device"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use tether_auth::{MemoryTokenStore, StoreError};
    use tether_core::logging::capture_logs;
    use tether_core::{LoginCredentials, RegisterCredentials};
    use tokio::sync::Semaphore;
    use tracing::Level;

    use super::*;

    fn pair(access: &str) -> TokenPair {
        TokenPair::new(access, format!("{access}-refresh")).unwrap()
    }

    /// Auth API whose refresh outcome is scripted and optionally held until
    /// the test releases it.
    struct ScriptedApi {
        outcome: Mutex<Result<TokenPair, AuthError>>,
        gate: Option<Semaphore>,
        refresh_calls: AtomicUsize,
    }

    impl ScriptedApi {
        fn new(outcome: Result<TokenPair, AuthError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(outcome),
                gate: None,
                refresh_calls: AtomicUsize::new(0),
            })
        }

        fn gated(outcome: Result<TokenPair, AuthError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(outcome),
                gate: Some(Semaphore::new(0)),
                refresh_calls: AtomicUsize::new(0),
            })
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn calls(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthApi for ScriptedApi {
        async fn login(&self, _: &LoginCredentials) -> Result<TokenPair, AuthError> {
            Err(AuthError::Unauthenticated)
        }

        async fn register(&self, _: &RegisterCredentials) -> Result<TokenPair, AuthError> {
            Err(AuthError::Unauthenticated)
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, AuthError> {
            let _ = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            self.outcome.lock().clone()
        }
    }

    /// Memory store with injectable failures and call counters.
    #[derive(Default)]
    struct FlakyStore {
        slot: MemoryTokenStore,
        fail_load: AtomicBool,
        fail_save: AtomicBool,
        clear_failures: AtomicUsize,
        saves: AtomicUsize,
        clears: AtomicUsize,
    }

    impl FlakyStore {
        fn failing_clears(n: usize) -> Arc<Self> {
            let store = Self::default();
            store.clear_failures.store(n, Ordering::SeqCst);
            Arc::new(store)
        }
    }

    #[async_trait]
    impl TokenStore for FlakyStore {
        async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("keychain locked").into());
            }
            self.slot.load().await
        }

        async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
            let _ = self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.slot.save(pair).await
        }

        async fn clear(&self) -> Result<(), StoreError> {
            let _ = self.clears.fetch_add(1, Ordering::SeqCst);
            let remaining = self.clear_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.clear_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(std::io::Error::other("device busy").into());
            }
            self.slot.clear().await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    async fn yield_a_few() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ── initialize ──────────────────────────────────────────────────

    #[tokio::test]
    async fn initialize_restores_stored_pair() {
        let store = Arc::new(MemoryTokenStore::with_pair(pair("at-1")));
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store);
        assert_eq!(manager.current(), SessionState::Unknown);

        let state = manager.initialize().await.unwrap();
        assert_eq!(state, SessionState::authenticated("at-1"));
        assert_eq!(manager.valid_access_token().unwrap(), "at-1");
    }

    #[tokio::test]
    async fn initialize_empty_store_is_anonymous() {
        let manager = SessionManager::new(
            ScriptedApi::new(Ok(pair("x"))),
            Arc::new(MemoryTokenStore::new()),
        );
        assert_eq!(manager.initialize().await.unwrap(), SessionState::Anonymous);
        assert_eq!(manager.valid_access_token(), Err(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn initialize_read_failure_is_anonymous_and_reported() {
        let store = Arc::new(FlakyStore::default());
        store.fail_load.store(true, Ordering::SeqCst);
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store);

        assert_matches!(manager.initialize().await, Err(AuthError::Persistence(_)));
        assert_eq!(manager.current(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn initialize_only_acts_once() {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store.clone());
        let _ = manager.initialize().await.unwrap();

        store.save(&pair("planted")).await.unwrap();
        assert_eq!(manager.initialize().await.unwrap(), SessionState::Anonymous);
    }

    // ── sign_in ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn sign_in_persists_then_publishes() {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store.clone());
        let _ = manager.initialize().await.unwrap();
        let mut sub = manager.subscribe();

        manager.sign_in(pair("at-1")).await.unwrap();

        assert_eq!(sub.changed().await, Some(SessionState::authenticated("at-1")));
        assert_eq!(store.load().await.unwrap(), Some(pair("at-1")));
    }

    #[tokio::test]
    async fn sign_in_twice_is_idempotent() {
        let store = Arc::new(FlakyStore::default());
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store.clone());
        let _ = manager.initialize().await.unwrap();

        manager.sign_in(pair("at-1")).await.unwrap();
        let sub = manager.subscribe();
        manager.sign_in(pair("at-1")).await.unwrap();

        assert!(!sub.has_changed());
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(manager.current(), SessionState::authenticated("at-1"));
    }

    #[tokio::test]
    async fn sign_in_persistence_failure_changes_nothing() {
        let store = Arc::new(FlakyStore::default());
        store.fail_save.store(true, Ordering::SeqCst);
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store);
        let _ = manager.initialize().await.unwrap();
        let sub = manager.subscribe();

        assert_matches!(
            manager.sign_in(pair("at-1")).await,
            Err(AuthError::Persistence(_))
        );
        assert_eq!(manager.current(), SessionState::Anonymous);
        assert!(!sub.has_changed());
    }

    // ── sign_out ────────────────────────────────────────────────────

    #[tokio::test]
    async fn sign_out_clears_store_and_state() {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();

        manager.sign_out().await;

        assert_eq!(manager.current(), SessionState::Anonymous);
        assert_eq!(store.load().await.unwrap(), None);
        assert_matches!(manager.refresh_session().await, Err(AuthError::Unauthenticated));
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_retries_clear_in_background() {
        let (logs, _guard) = capture_logs();
        let store = FlakyStore::failing_clears(2);
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();

        manager.sign_out().await;
        assert_eq!(manager.current(), SessionState::Anonymous);
        assert!(logs.has_event(Level::WARN, "could not clear stored tokens"));

        for _ in 0..120 {
            if store.clears.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(store.clears.load(Ordering::SeqCst), 3);
        assert_eq!(store.load().await.unwrap(), None);
        assert!(logs.has_event(Level::INFO, "cleared after retry"));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_retry_gives_up_with_error() {
        let (logs, _guard) = capture_logs();
        let store = FlakyStore::failing_clears(usize::MAX);
        let settings = SessionSettings {
            clear_retry: RetryConfig {
                max_retries: 2,
                ..RetryConfig::default()
            },
        };
        let manager =
            SessionManager::with_settings(ScriptedApi::new(Ok(pair("x"))), store.clone(), &settings);
        manager.sign_in(pair("at-1")).await.unwrap();
        manager.sign_out().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        yield_a_few().await;

        assert_eq!(store.clears.load(Ordering::SeqCst), 3);
        assert!(logs.has_event(Level::ERROR, "giving up clearing stored tokens"));
        assert_eq!(manager.current(), SessionState::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_retry_abandoned_after_new_sign_in() {
        let store = FlakyStore::failing_clears(1);
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("x"))), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();
        manager.sign_out().await;

        manager.sign_in(pair("at-2")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        yield_a_few().await;

        assert_eq!(store.clears.load(Ordering::SeqCst), 1);
        assert_eq!(store.load().await.unwrap(), Some(pair("at-2")));
    }

    // ── refresh_session ─────────────────────────────────────────────

    #[tokio::test]
    async fn refresh_replaces_pair_and_notifies() {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("at-2"))), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();
        let mut sub = manager.subscribe();

        let refreshed = manager.refresh_session().await.unwrap();

        assert_eq!(refreshed, pair("at-2"));
        assert_eq!(sub.changed().await, Some(SessionState::authenticated("at-2")));
        assert_eq!(store.load().await.unwrap(), Some(pair("at-2")));
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn refresh_without_session_is_unauthenticated() {
        let api = ScriptedApi::new(Ok(pair("at-2")));
        let manager = SessionManager::new(api.clone(), Arc::new(MemoryTokenStore::new()));
        let _ = manager.initialize().await.unwrap();

        assert_eq!(manager.refresh_session().await, Err(AuthError::Unauthenticated));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_exchange() {
        let api = ScriptedApi::gated(Ok(pair("at-2")));
        let manager = SessionManager::new(api.clone(), Arc::new(MemoryTokenStore::new()));
        manager.sign_in(pair("at-1")).await.unwrap();

        let (first, second, ()) = tokio::join!(
            manager.refresh_session(),
            manager.refresh_session(),
            async {
                yield_a_few().await;
                api.release();
            }
        );

        assert_eq!(api.calls(), 1);
        assert_eq!(first, Ok(pair("at-2")));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_failure() {
        let api = ScriptedApi::gated(Err(AuthError::Network("timeout".to_string())));
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(api.clone(), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();

        let (first, second, ()) = tokio::join!(
            manager.refresh_session(),
            manager.refresh_session(),
            async {
                yield_a_few().await;
                api.release();
            }
        );

        assert_eq!(api.calls(), 1);
        assert_matches!(first, Err(AuthError::Network(_)));
        assert_eq!(first, second);
        assert_eq!(manager.current(), SessionState::authenticated("at-1"));
        assert_eq!(store.load().await.unwrap(), Some(pair("at-1")));
    }

    #[tokio::test]
    async fn sign_out_during_refresh_discards_result() {
        let api = ScriptedApi::gated(Ok(pair("at-2")));
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(api.clone(), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();

        let (result, ()) = tokio::join!(manager.refresh_session(), async {
            yield_a_few().await;
            manager.sign_out().await;
            api.release();
        });

        assert_eq!(result, Err(AuthError::Unauthenticated));
        assert_eq!(manager.current(), SessionState::Anonymous);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_in_during_refresh_keeps_new_session() {
        let api = ScriptedApi::gated(Ok(pair("stale")));
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(api.clone(), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();

        let (result, ()) = tokio::join!(manager.refresh_session(), async {
            yield_a_few().await;
            manager.sign_out().await;
            manager.sign_in(pair("other-user")).await.unwrap();
            api.release();
        });

        assert_eq!(result, Err(AuthError::Unauthenticated));
        assert_eq!(manager.current(), SessionState::authenticated("other-user"));
        assert_eq!(store.load().await.unwrap(), Some(pair("other-user")));
    }

    #[tokio::test]
    async fn new_session_does_not_join_previous_sessions_refresh() {
        let api = ScriptedApi::gated(Ok(pair("b2")));
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(api.clone(), store.clone());
        manager.sign_in(pair("a1")).await.unwrap();

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.refresh_session().await })
        };
        yield_a_few().await;
        assert_eq!(api.calls(), 1);

        manager.sign_out().await;
        manager.sign_in(pair("b1")).await.unwrap();

        let (second, ()) = tokio::join!(manager.refresh_session(), async {
            yield_a_few().await;
            api.release();
            api.release();
        });

        assert_eq!(api.calls(), 2);
        assert_eq!(second, Ok(pair("b2")));
        assert_eq!(first.await.unwrap(), Err(AuthError::Unauthenticated));
        assert_eq!(manager.current(), SessionState::authenticated("b2"));
        assert_eq!(store.load().await.unwrap(), Some(pair("b2")));
    }

    #[tokio::test]
    async fn refresh_for_ended_generation_is_unauthenticated() {
        let api = ScriptedApi::new(Ok(pair("b2")));
        let manager = SessionManager::new(api.clone(), Arc::new(MemoryTokenStore::new()));
        manager.sign_in(pair("a1")).await.unwrap();
        let (generation, _) = manager.held_access_token().unwrap();

        manager.sign_out().await;
        manager.sign_in(pair("b1")).await.unwrap();

        assert_eq!(
            manager.refresh_for(generation).await,
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(api.calls(), 0);
        assert_eq!(manager.current(), SessionState::authenticated("b1"));
    }

    #[tokio::test]
    async fn refresh_rejected_ends_session() {
        let api = ScriptedApi::new(Err(AuthError::RefreshRejected("expired".to_string())));
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(api, store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();

        assert_matches!(
            manager.refresh_session().await,
            Err(AuthError::RefreshRejected(_))
        );
        assert_eq!(manager.current(), SessionState::Anonymous);
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(manager.valid_access_token(), Err(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn refresh_persistence_failure_keeps_old_session() {
        let store = Arc::new(FlakyStore::default());
        let manager = SessionManager::new(ScriptedApi::new(Ok(pair("at-2"))), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();
        store.fail_save.store(true, Ordering::SeqCst);

        assert_matches!(
            manager.refresh_session().await,
            Err(AuthError::Persistence(_))
        );
        assert_eq!(manager.current(), SessionState::authenticated("at-1"));
    }

    #[tokio::test]
    async fn refresh_completes_after_caller_gives_up() {
        let api = ScriptedApi::gated(Ok(pair("at-2")));
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(api.clone(), store.clone());
        manager.sign_in(pair("at-1")).await.unwrap();
        let mut sub = manager.subscribe();

        let caller = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.refresh_session().await })
        };
        yield_a_few().await;
        assert!(manager.is_refreshing());
        caller.abort();
        api.release();

        assert_eq!(sub.changed().await, Some(SessionState::authenticated("at-2")));
        assert_eq!(store.load().await.unwrap(), Some(pair("at-2")));
    }

    #[tokio::test]
    async fn sequential_refreshes_each_exchange() {
        let api = ScriptedApi::new(Ok(pair("at-2")));
        let manager = SessionManager::new(api.clone(), Arc::new(MemoryTokenStore::new()));
        manager.sign_in(pair("at-1")).await.unwrap();

        let _ = manager.refresh_session().await.unwrap();
        let _ = manager.refresh_session().await.unwrap();
        assert_eq!(api.calls(), 2);
    }
}

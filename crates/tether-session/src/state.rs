//! Observable session state.
//!
//! [`SessionPublisher`] holds the single current [`SessionState`] and hands
//! out [`SessionSubscription`]s. Subscribers have latest-value semantics: a
//! slow subscriber may skip intermediate states but always observes the most
//! recent one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// Whether the app currently holds a session.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Stored tokens have not been read yet.
    #[default]
    Unknown,
    /// No valid token pair is held.
    Anonymous,
    /// A valid token pair is held.
    Authenticated {
        /// Current bearer credential.
        access_token: String,
    },
}

impl SessionState {
    /// State for a held access token.
    pub fn authenticated(access_token: impl Into<String>) -> Self {
        Self::Authenticated {
            access_token: access_token.into(),
        }
    }

    /// Whether a session is held.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Whether startup has resolved the stored session either way.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// The bearer credential, if authenticated.
    pub fn access_token(&self) -> Option<&str> {
        match self {
            Self::Authenticated { access_token } => Some(access_token),
            _ => None,
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("Unknown"),
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Authenticated { .. } => f.write_str("Authenticated(<redacted>)"),
        }
    }
}

/// Single writer of [`SessionState`].
///
/// Non-blocking: publishing never awaits and succeeds with zero subscribers.
pub struct SessionPublisher {
    tx: watch::Sender<SessionState>,
    publish_count: AtomicU64,
}

impl SessionPublisher {
    /// Create a publisher starting at [`SessionState::Unknown`].
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Unknown);
        Self {
            tx,
            publish_count: AtomicU64::new(0),
        }
    }

    /// Current value.
    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Publish `state` if it differs from the current value.
    ///
    /// Returns whether subscribers were notified.
    pub fn publish(&self, state: SessionState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            let _ = self.publish_count.fetch_add(1, Ordering::Relaxed);
        }
        changed
    }

    /// Publish `state` and notify subscribers even if it is unchanged.
    pub fn publish_always(&self, state: SessionState) {
        let _ = self.tx.send_replace(state);
        let _ = self.publish_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Subscribe to changes published after this call.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of notifications sent.
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }
}

impl Default for SessionPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end handed to screens and the request layer.
#[derive(Clone, Debug)]
pub struct SessionSubscription {
    rx: watch::Receiver<SessionState>,
}

impl SessionSubscription {
    /// Current value, without marking it seen.
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Whether a value was published since the last one this subscription saw.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next published value.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until startup has resolved the stored session.
    pub async fn wait_until_known(&mut self) -> Option<SessionState> {
        self.rx
            .wait_for(SessionState::is_known)
            .await
            .ok()
            .map(|state| state.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

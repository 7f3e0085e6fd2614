//! Session Mirror — reactive local copy of the authenticated user.
//!
//! ARCHITECTURE
//! ============
//! One mirror per long-lived client process. On construction it subscribes
//! to the backend's change-notification stream, then issues a single
//! current-session query; a driver task applies whichever resolves, with
//! notifications winning over the initial query since they are guaranteed
//! more current. State is observable through a watch channel: `Loading`
//! until the first resolution, then `Authenticated`/`Unauthenticated`,
//! never `Loading` again for this instance.
//!
//! TRADE-OFFS
//! ==========
//! Overlapping mutating calls are not coordinated — last write wins on both
//! the error slot and the resulting state. The UI driving these calls is
//! single-flight in practice (one active form), so coordination would add
//! machinery without changing observable behavior.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::backend::{AuthBackend, AuthError, Provider, SessionChange, SignUpOptions, User, normalize_email};
use crate::guard::CALLBACK_PATH;

// =============================================================================
// OBSERVABLE STATE
// =============================================================================

/// Point-in-time view of the mirror. `user` is replaced wholesale on every
/// change; `last_error` retains only the most recent operation failure.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub loading: bool,
    pub user: Option<User>,
    pub last_error: Option<AuthError>,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self { loading: true, user: None, last_error: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    Authenticated(User),
    Unauthenticated,
}

// =============================================================================
// MIRROR
// =============================================================================

pub struct SessionMirror {
    backend: Arc<dyn AuthBackend>,
    tx: Arc<watch::Sender<AuthSnapshot>>,
    rx: watch::Receiver<AuthSnapshot>,
    driver: JoinHandle<()>,
}

impl SessionMirror {
    /// Start mirroring. The subscription is taken before the initial query
    /// so no notification can slip between the two.
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let (tx, rx) = watch::channel(AuthSnapshot::initial());
        let tx = Arc::new(tx);
        let changes = backend.subscribe();
        let driver = tokio::spawn(drive(backend.clone(), tx.clone(), changes));
        Self { backend, tx, rx, driver }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.rx.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        let snapshot = self.rx.borrow();
        if snapshot.loading {
            AuthState::Loading
        } else {
            match &snapshot.user {
                Some(user) => AuthState::Authenticated(user.clone()),
                None => AuthState::Unauthenticated,
            }
        }
    }

    #[must_use]
    pub fn last_error(&self) -> Option<AuthError> {
        self.rx.borrow().last_error.clone()
    }

    /// Subscribe to snapshot changes (for UI reactivity).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.rx.clone()
    }

    /// Tear down the driver task and its subscription. Also happens on drop.
    pub fn close(&self) {
        self.driver.abort();
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Password sign-in. Failure is retained in the error slot and returned.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let Some(email) = normalize_email(email) else {
            return Err(self.record_error(AuthError::Rejected("invalid email".to_owned())));
        };
        match self.backend.sign_in_with_password(&email, password).await {
            Ok(session) => {
                self.apply_success(Some(session.user));
                Ok(())
            }
            Err(e) => Err(self.record_error(e)),
        }
    }

    /// Account creation with optional profile metadata. The confirmation
    /// email points back at [`CALLBACK_PATH`].
    pub async fn sign_up(&self, email: &str, password: &str, full_name: Option<String>) -> Result<(), AuthError> {
        let Some(email) = normalize_email(email) else {
            return Err(self.record_error(AuthError::Rejected("invalid email".to_owned())));
        };
        let opts = SignUpOptions { full_name, email_redirect_to: Some(CALLBACK_PATH.to_owned()) };
        match self.backend.sign_up(&email, password, opts).await {
            Ok(Some(session)) => {
                self.apply_success(Some(session.user));
                Ok(())
            }
            // Confirmation pending: success, but no session to mirror yet.
            Ok(None) => {
                self.clear_error();
                Ok(())
            }
            Err(e) => Err(self.record_error(e)),
        }
    }

    /// Begin a provider redirect flow; returns the URL to navigate to.
    pub async fn sign_in_with_oauth(&self, provider: Provider) -> Result<String, AuthError> {
        match self.backend.sign_in_with_oauth(provider, CALLBACK_PATH).await {
            Ok(url) => {
                self.clear_error();
                Ok(url)
            }
            Err(e) => Err(self.record_error(e)),
        }
    }

    /// Sign out. The local projection is cleared only on confirmed backend
    /// success; a failure leaves it untouched and propagates.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        match self.backend.sign_out().await {
            Ok(()) => {
                self.apply_success(None);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "sign-out failed, keeping local session");
                Err(self.record_error(e))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Slot updates
    // -------------------------------------------------------------------------

    fn apply_success(&self, user: Option<User>) {
        self.tx.send_modify(|s| {
            s.loading = false;
            s.user = user;
            s.last_error = None;
        });
    }

    fn record_error(&self, error: AuthError) -> AuthError {
        self.tx.send_modify(|s| s.last_error = Some(error.clone()));
        error
    }

    fn clear_error(&self) {
        self.tx.send_modify(|s| s.last_error = None);
    }
}

impl Drop for SessionMirror {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

// =============================================================================
// DRIVER
// =============================================================================

async fn drive(
    backend: Arc<dyn AuthBackend>,
    tx: Arc<watch::Sender<AuthSnapshot>>,
    mut changes: broadcast::Receiver<SessionChange>,
) {
    let initial = backend.current_session();
    tokio::pin!(initial);
    let mut initial_pending = true;
    let mut saw_change = false;

    loop {
        tokio::select! {
            result = &mut initial, if initial_pending => {
                initial_pending = false;
                // A notification that raced ahead of the initial query is
                // more current; its result stands.
                if saw_change {
                    continue;
                }
                match result {
                    Ok(session) => apply(&tx, session.map(|s| s.user), None),
                    Err(e) => {
                        tracing::warn!(error = %e, "initial session query failed");
                        apply(&tx, None, Some(e));
                    }
                }
            }
            change = changes.recv() => match change {
                Ok(session) => {
                    saw_change = true;
                    apply(&tx, session.map(|s| s.user), None);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session change stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn apply(tx: &watch::Sender<AuthSnapshot>, user: Option<User>, error: Option<AuthError>) {
    tx.send_modify(|s| {
        s.loading = false;
        s.user = user;
        if let Some(e) = error {
            s.last_error = Some(e);
        }
    });
}

#[cfg(test)]
#[path = "mirror_test.rs"]
mod tests;

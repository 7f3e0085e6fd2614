//! Scriptable in-memory backend for tests.
//!
//! Each capability call reads a scripted response; tests flip the scripts
//! directly, fire notifications with `emit`, and read call counters to
//! assert what the code under test touched.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use super::{
    AuthBackend, AuthError, Profile, ProfileStore, Provider, Session, SessionChange, SignUpOptions,
    StoreError, TokenPair, User,
};

pub struct MockBackend {
    /// Script for `session_from_tokens` (the guard's view).
    pub resolve: Mutex<Result<Option<Session>, AuthError>>,
    /// Script for `current_session` (the mirror's initial query).
    pub initial: Mutex<Result<Option<Session>, AuthError>>,
    /// When set, `current_session` waits for one `notify_one` before resolving.
    pub initial_gate: Mutex<Option<Arc<Notify>>>,
    pub sign_in_error: Mutex<Option<AuthError>>,
    pub sign_up_error: Mutex<Option<AuthError>>,
    pub magic_link_error: Mutex<Option<AuthError>>,
    pub verify_error: Mutex<Option<AuthError>>,
    pub reset_error: Mutex<Option<AuthError>>,
    pub refresh_error: Mutex<Option<AuthError>>,
    pub oauth_error: Mutex<Option<AuthError>>,
    pub exchange_error: Mutex<Option<AuthError>>,
    pub sign_out_error: Mutex<Option<AuthError>>,
    /// Emails the backend was asked to send a magic link to.
    pub magic_links: Mutex<Vec<String>>,
    /// Emails the backend was asked to send a password reset to.
    pub reset_requests: Mutex<Vec<String>>,
    /// Number of session resolutions (initial + per-request) performed.
    pub session_calls: AtomicUsize,
    pub profiles: Mutex<HashMap<Uuid, Profile>>,
    pub profile_fail: AtomicBool,
    changes: broadcast::Sender<SessionChange>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            resolve: Mutex::new(Ok(None)),
            initial: Mutex::new(Ok(None)),
            initial_gate: Mutex::new(None),
            sign_in_error: Mutex::new(None),
            sign_up_error: Mutex::new(None),
            magic_link_error: Mutex::new(None),
            verify_error: Mutex::new(None),
            reset_error: Mutex::new(None),
            refresh_error: Mutex::new(None),
            oauth_error: Mutex::new(None),
            exchange_error: Mutex::new(None),
            sign_out_error: Mutex::new(None),
            magic_links: Mutex::new(Vec::new()),
            reset_requests: Mutex::new(Vec::new()),
            session_calls: AtomicUsize::new(0),
            profiles: Mutex::new(HashMap::new()),
            profile_fail: AtomicBool::new(false),
            changes,
        })
    }

    /// Push a session-change notification to all subscribers.
    pub fn emit(&self, change: SessionChange) {
        let _ = self.changes.send(change);
    }

    pub fn set_resolve(&self, value: Result<Option<Session>, AuthError>) {
        *self.resolve.lock().unwrap() = value;
    }

    pub fn set_initial(&self, value: Result<Option<Session>, AuthError>) {
        *self.initial.lock().unwrap() = value;
    }

    #[must_use]
    pub fn dummy_user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            full_name: None,
            role: None,
        }
    }

    #[must_use]
    pub fn session_for(email: &str) -> Session {
        Session {
            tokens: TokenPair {
                access: format!("access-{email}"),
                refresh: format!("refresh-{email}"),
            },
            user: Self::dummy_user(email),
        }
    }
}

#[async_trait::async_trait]
impl AuthBackend for MockBackend {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let gate = self.initial_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.initial.lock().unwrap().clone()
    }

    async fn session_from_tokens(
        &self,
        _access: Option<&str>,
        _refresh: Option<&str>,
    ) -> Result<Option<Session>, AuthError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.resolve.lock().unwrap().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, _password: &str) -> Result<Session, AuthError> {
        if let Some(err) = self.sign_in_error.lock().unwrap().clone() {
            return Err(err);
        }
        let session = Self::session_for(email);
        self.set_resolve(Ok(Some(session.clone())));
        self.set_initial(Ok(Some(session.clone())));
        self.emit(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        opts: SignUpOptions,
    ) -> Result<Option<Session>, AuthError> {
        if let Some(err) = self.sign_up_error.lock().unwrap().clone() {
            return Err(err);
        }
        let mut session = Self::session_for(email);
        session.user.full_name = opts.full_name;
        self.set_resolve(Ok(Some(session.clone())));
        self.set_initial(Ok(Some(session.clone())));
        self.emit(Some(session.clone()));
        Ok(Some(session))
    }

    async fn send_magic_link(&self, email: &str, _redirect_to: &str) -> Result<(), AuthError> {
        if let Some(err) = self.magic_link_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.magic_links.lock().unwrap().push(email.to_owned());
        Ok(())
    }

    async fn verify_otp(&self, email: &str, _token: &str) -> Result<Session, AuthError> {
        if let Some(err) = self.verify_error.lock().unwrap().clone() {
            return Err(err);
        }
        let session = Self::session_for(email);
        self.set_resolve(Ok(Some(session.clone())));
        self.set_initial(Ok(Some(session.clone())));
        self.emit(Some(session.clone()));
        Ok(session)
    }

    async fn reset_password_for_email(&self, email: &str, _redirect_to: &str) -> Result<(), AuthError> {
        if let Some(err) = self.reset_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.reset_requests.lock().unwrap().push(email.to_owned());
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        if let Some(err) = self.refresh_error.lock().unwrap().clone() {
            return Err(err);
        }
        // "refresh-{email}" round-trips to a rotated pair for the same user.
        let email = refresh_token.strip_prefix("refresh-").unwrap_or("refreshed@example.com");
        let session = Self::session_for(email);
        self.set_resolve(Ok(Some(session.clone())));
        self.set_initial(Ok(Some(session.clone())));
        self.emit(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_oauth(&self, provider: Provider, redirect_to: &str) -> Result<String, AuthError> {
        if let Some(err) = self.oauth_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(format!(
            "mock://authorize?provider={}&redirect_to={redirect_to}",
            provider.as_str()
        ))
    }

    async fn exchange_oauth_code(&self, _code: &str) -> Result<Session, AuthError> {
        if let Some(err) = self.exchange_error.lock().unwrap().clone() {
            return Err(err);
        }
        let session = Self::session_for("oauth@example.com");
        self.set_resolve(Ok(Some(session.clone())));
        self.set_initial(Ok(Some(session.clone())));
        self.emit(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(err) = self.sign_out_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.set_resolve(Ok(None));
        self.set_initial(Ok(None));
        self.emit(None);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileStore for MockBackend {
    async fn fetch(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        if self.profile_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("scripted failure".to_owned()));
        }
        Ok(self.profiles.lock().unwrap().get(&id).cloned())
    }

    async fn upsert(&self, profile: Profile) -> Result<Profile, StoreError> {
        if self.profile_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("scripted failure".to_owned()));
        }
        self.profiles.lock().unwrap().insert(profile.id, profile.clone());
        Ok(profile)
    }
}

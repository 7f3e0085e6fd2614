//! Backend capability seam.
//!
//! ARCHITECTURE
//! ============
//! Everything non-trivial — password hashing, token issuance, refresh, row
//! storage — belongs to the hosted service. This module defines the two
//! narrow capabilities the rest of the app consumes: `AuthBackend` for the
//! session lifecycle and `ProfileStore` for the `profiles` record. The
//! production implementation lives in `http.rs`; tests script `mock.rs`.
//!
//! Change notifications ride a tokio broadcast channel: delivered in
//! emission order, and dropping the receiver is the unsubscribe.

pub mod http;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

/// Local projection of the authenticated identity. Replaced wholesale on
/// every session change; never the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

/// Opaque token pair issued by the backend. Carried only to echo into
/// cookies; never parsed locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// A live backend session: the token pair plus the identity it proves.
#[derive(Debug, Clone)]
pub struct Session {
    pub tokens: TokenPair,
    pub user: User,
}

/// One session-change notification: `Some` carries the new session, `None`
/// means signed out.
pub type SessionChange = Option<Session>;

/// Third-party sign-in provider. The redirect-based flow is
/// provider-agnostic; only the authorize URL differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Github,
    Google,
}

impl Provider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Google => "google",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "github" => Some(Self::Github),
            "google" => Some(Self::Google),
            _ => None,
        }
    }
}

/// Optional signup extras: profile metadata plus the post-confirmation
/// redirect target.
#[derive(Debug, Clone, Default)]
pub struct SignUpOptions {
    pub full_name: Option<String>,
    pub email_redirect_to: Option<String>,
}

/// `profiles` record as stored by the backend data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
    pub updated_at: Option<String>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Auth failure taxonomy. `Unreachable` is fail-closed "no session" at the
/// guard; `Rejected` is a structured credential/account refusal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("store error: {0}")]
    Backend(String),
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Session-lifecycle capability of the hosted auth service.
///
/// Mutating calls either change the session or they don't — there is no
/// partial-success state, and no call retries internally.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Resolve the client-held session, refreshing it if it has expired.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Resolve a request-scoped cookie pair, transparently rotating an
    /// expiring token. The returned session carries the pair the caller
    /// should echo back as cookies. Refresh is best-effort: a refused
    /// refresh is `Ok(None)`, not an error.
    async fn session_from_tokens(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<Option<Session>, AuthError>;

    /// Subscribe to session-change notifications. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Create an account. `Ok(None)` means the account exists but email
    /// confirmation is still pending, so no session was issued.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        opts: SignUpOptions,
    ) -> Result<Option<Session>, AuthError>;

    /// Send a passwordless sign-in link to `email`. The link lands on
    /// `redirect_to` after the backend verifies it.
    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    /// Verify an emailed one-time code (magic link or signup confirmation),
    /// issuing a session on success.
    async fn verify_otp(&self, email: &str, token: &str) -> Result<Session, AuthError>;

    /// Send a password-reset link to `email`.
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    /// Exchange a refresh token for a fresh session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError>;

    /// Begin a redirect-based third-party sign-in; returns the authorize
    /// URL the caller must navigate to.
    async fn sign_in_with_oauth(&self, provider: Provider, redirect_to: &str) -> Result<String, AuthError>;

    /// Complete the redirect flow by exchanging the callback code.
    async fn exchange_oauth_code(&self, code: &str) -> Result<Session, AuthError>;

    /// Terminate the backend session and clear client-held auth artifacts.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Fetch/upsert capability over the `profiles` record.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;
    async fn upsert(&self, profile: Profile) -> Result<Profile, StoreError>;
}

// =============================================================================
// HELPERS
// =============================================================================

/// Lowercase and shape-check an email before it reaches the backend.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return None;
    }
    let parts = normalized.split('@').collect::<Vec<_>>();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }
    Some(normalized)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

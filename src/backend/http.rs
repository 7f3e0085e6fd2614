//! Hosted-service client.
//!
//! SYSTEM CONTEXT
//! ==============
//! Implements both capabilities over the service's REST API: the auth
//! endpoints under `/auth/v1` and the `profiles` table under `/rest/v1`.
//! The anon key rides every request as the `apikey` header; user-scoped
//! calls add a bearer token on top.
//!
//! The client caches the current token pair in-process — those are the
//! "client-held auth artifacts" cleared on sign-out — and emits one
//! `SessionChange` on every confirmed session mutation.

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use super::{
    AuthBackend, AuthError, Profile, ProfileStore, Provider, Session, SessionChange, SignUpOptions,
    StoreError, TokenPair, User,
};
use crate::config::BackendConfig;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

pub struct HttpBackend {
    config: BackendConfig,
    http: reqwest::Client,
    /// Cached token pair for the client-held session.
    tokens: RwLock<Option<TokenPair>>,
    changes: broadcast::Sender<SessionChange>,
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, serde::Deserialize)]
struct WireUser {
    id: Uuid,
    email: Option<String>,
    user_metadata: Option<serde_json::Value>,
}

impl WireUser {
    fn into_user(self) -> User {
        let meta_str = |key: &str| {
            self.user_metadata
                .as_ref()
                .and_then(|m| m.get(key))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };
        let full_name = meta_str("full_name");
        let role = meta_str("role");
        User { id: self.id, email: self.email.unwrap_or_default(), full_name, role }
    }
}

#[derive(Debug, serde::Deserialize)]
struct WireSession {
    access_token: String,
    refresh_token: String,
    user: WireUser,
}

impl WireSession {
    fn into_session(self) -> Session {
        Session {
            tokens: TokenPair { access: self.access_token, refresh: self.refresh_token },
            user: self.user.into_user(),
        }
    }
}

/// Signup responses carry a session only when confirmation is disabled.
#[derive(Debug, serde::Deserialize)]
struct WireSignup {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<WireUser>,
    id: Option<Uuid>,
}

// =============================================================================
// CLIENT
// =============================================================================

impl HttpBackend {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { config, http: reqwest::Client::new(), tokens: RwLock::new(None), changes }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.config.url)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1{path}", self.config.url)
    }

    /// Build the provider authorize URL for the redirect-based flow.
    #[must_use]
    pub fn authorize_url(&self, provider: Provider, redirect_to: &str) -> String {
        format!(
            "{}?provider={}&redirect_to={}",
            self.auth_url("/authorize"),
            provider.as_str(),
            redirect_to
        )
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, AuthError> {
        let resp = self
            .http
            .post(self.auth_url("/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{status}: {detail}")));
        }

        let wire: WireSession = resp
            .json()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        Ok(wire.into_session())
    }

    /// POST to an email-dispatching auth endpoint (magic link, recovery).
    /// Success means the backend accepted the request, not that mail landed.
    async fn email_dispatch(&self, path: &str, redirect_to: &str, body: serde_json::Value) -> Result<(), AuthError> {
        let resp = self
            .http
            .post(self.auth_url(path))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{status}: {detail}")));
        }
        Ok(())
    }

    /// Validate an access token by fetching the identity behind it.
    async fn fetch_user(&self, access: &str) -> Result<Option<User>, AuthError> {
        let resp = self
            .http
            .get(self.auth_url("/user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Ok(None);
        }

        let wire: WireUser = resp
            .json()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        Ok(Some(wire.into_user()))
    }

    async fn install_session(&self, session: &Session) {
        let mut tokens = self.tokens.write().await;
        *tokens = Some(session.tokens.clone());
        // No receivers is fine — nobody is mirroring yet.
        let _ = self.changes.send(Some(session.clone()));
    }

    async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.access.clone())
    }
}

// =============================================================================
// AUTH CAPABILITY
// =============================================================================

#[async_trait::async_trait]
impl AuthBackend for HttpBackend {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let cached = self.tokens.read().await.clone();
        let Some(pair) = cached else {
            return Ok(None);
        };

        let session = self
            .session_from_tokens(Some(&pair.access), Some(&pair.refresh))
            .await?;

        let mut tokens = self.tokens.write().await;
        *tokens = session.as_ref().map(|s| s.tokens.clone());
        Ok(session)
    }

    async fn session_from_tokens(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<Option<Session>, AuthError> {
        // Fast path: the presented access token is still valid.
        if let Some(access) = access.filter(|a| !a.is_empty()) {
            if let Some(user) = self.fetch_user(access).await? {
                let refresh = refresh.unwrap_or_default().to_owned();
                return Ok(Some(Session {
                    tokens: TokenPair { access: access.to_owned(), refresh },
                    user,
                }));
            }
        }

        // Expired or absent access token: best-effort rotation. A refused
        // refresh degrades to "no session" rather than an error.
        let Some(refresh) = refresh.filter(|r| !r.is_empty()) else {
            return Ok(None);
        };
        match self
            .token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh }))
            .await
        {
            Ok(session) => Ok(Some(session)),
            Err(AuthError::Rejected(reason)) => {
                tracing::debug!(%reason, "session refresh refused");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self
            .token_grant("password", serde_json::json!({ "email": email, "password": password }))
            .await?;
        self.install_session(&session).await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        opts: SignUpOptions,
    ) -> Result<Option<Session>, AuthError> {
        let mut body = serde_json::json!({ "email": email, "password": password });
        if let Some(full_name) = &opts.full_name {
            body["data"] = serde_json::json!({ "full_name": full_name });
        }

        let mut req = self
            .http
            .post(self.auth_url("/signup"))
            .header("apikey", &self.config.anon_key);
        if let Some(redirect_to) = &opts.email_redirect_to {
            req = req.query(&[("redirect_to", redirect_to)]);
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{status}: {detail}")));
        }

        let wire: WireSignup = resp
            .json()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        match (wire.access_token, wire.refresh_token, wire.user) {
            (Some(access), Some(refresh), Some(user)) => {
                let session = Session {
                    tokens: TokenPair { access, refresh },
                    user: user.into_user(),
                };
                self.install_session(&session).await;
                Ok(Some(session))
            }
            // Confirmation pending: the account exists but no session yet.
            _ => {
                tracing::info!(account = ?wire.id, "signup accepted, confirmation pending");
                Ok(None)
            }
        }
    }

    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        self.email_dispatch("/otp", redirect_to, serde_json::json!({ "email": email, "create_user": true }))
            .await
    }

    async fn verify_otp(&self, email: &str, token: &str) -> Result<Session, AuthError> {
        let resp = self
            .http
            .post(self.auth_url("/verify"))
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "type": "email", "email": email, "token": token }))
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{status}: {detail}")));
        }

        let wire: WireSession = resp
            .json()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        let session = wire.into_session();
        self.install_session(&session).await;
        Ok(session)
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        self.email_dispatch("/recover", redirect_to, serde_json::json!({ "email": email }))
            .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let session = self
            .token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await?;
        self.install_session(&session).await;
        Ok(session)
    }

    async fn sign_in_with_oauth(&self, provider: Provider, redirect_to: &str) -> Result<String, AuthError> {
        Ok(self.authorize_url(provider, redirect_to))
    }

    async fn exchange_oauth_code(&self, code: &str) -> Result<Session, AuthError> {
        let session = self
            .token_grant("pkce", serde_json::json!({ "auth_code": code }))
            .await?;
        self.install_session(&session).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let access = self.access_token().await;

        if let Some(access) = access {
            let resp = self
                .http
                .post(self.auth_url("/logout"))
                .header("apikey", &self.config.anon_key)
                .bearer_auth(&access)
                .send()
                .await
                .map_err(|e| AuthError::Unreachable(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let detail = resp.text().await.unwrap_or_default();
                return Err(AuthError::Rejected(format!("{status}: {detail}")));
            }
        }

        // Confirmed: drop the cached pair and tell the mirrors.
        let mut tokens = self.tokens.write().await;
        *tokens = None;
        let _ = self.changes.send(None);
        Ok(())
    }
}

// =============================================================================
// PROFILE CAPABILITY
// =============================================================================

#[async_trait::async_trait]
impl ProfileStore for HttpBackend {
    async fn fetch(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let bearer = self
            .access_token()
            .await
            .unwrap_or_else(|| self.config.anon_key.clone());
        let resp = self
            .http
            .get(self.rest_url("/profiles"))
            .query(&[
                ("id", format!("eq.{id}")),
                ("select", "id,full_name,avatar_url,role,updated_at".to_owned()),
            ])
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("{status}: {detail}")));
        }

        let mut rows: Vec<Profile> = resp
            .json()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    async fn upsert(&self, profile: Profile) -> Result<Profile, StoreError> {
        let bearer = self
            .access_token()
            .await
            .unwrap_or_else(|| self.config.anon_key.clone());
        let resp = self
            .http
            .post(self.rest_url("/profiles"))
            .header("apikey", &self.config.anon_key)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .bearer_auth(bearer)
            .json(&profile)
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("{status}: {detail}")));
        }

        let mut rows: Vec<Profile> = resp
            .json()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        if rows.is_empty() {
            return Err(StoreError::Backend("upsert returned no representation".to_owned()));
        }
        Ok(rows.remove(0))
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

//! Auth routes — password sign-in/up, OAuth flow, session cookies.

use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::backend::{AuthError, Provider, Session, TokenPair, User, normalize_email};
use crate::config;
use crate::guard::{APP_HOME_PATH, CALLBACK_PATH};
use crate::state::AppState;

pub(crate) const ACCESS_COOKIE: &str = "gh_access";
pub(crate) const REFRESH_COOKIE: &str = "gh_refresh";

/// Where the password-reset email lands.
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// COOKIES
// =============================================================================

fn build_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

/// The session pair as HttpOnly cookies.
pub(crate) fn session_cookies(tokens: &TokenPair, secure: bool) -> [Cookie<'static>; 2] {
    [
        build_cookie(ACCESS_COOKIE, tokens.access.clone(), secure),
        build_cookie(REFRESH_COOKIE, tokens.refresh.clone(), secure),
    ]
}

pub(crate) fn clear_session_cookies(secure: bool) -> [Cookie<'static>; 2] {
    [expired_cookie(ACCESS_COOKIE, secure), expired_cookie(REFRESH_COOKIE, secure)]
}

fn jar_with_session(session: &Session) -> CookieJar {
    let secure = config::cookie_secure();
    let [access, refresh] = session_cookies(&session.tokens, secure);
    CookieJar::new().add(access).add(refresh)
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookies.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: User,
    pub tokens: TokenPair,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let access = jar.get(ACCESS_COOKIE).map(Cookie::value);
        let refresh = jar.get(REFRESH_COOKIE).map(Cookie::value);
        if access.is_none() && refresh.is_none() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        // Fail closed: an unreachable session store reads as "no session".
        let app_state = AppState::from_ref(state);
        let session = app_state
            .auth
            .session_from_tokens(access, refresh)
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user: session.user, tokens: session.tokens })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[derive(Deserialize)]
pub struct SignInRequest {
    email: String,
    password: String,
}

/// `POST /api/auth/signin` — password sign-in, sets session cookies.
pub async fn signin(State(state): State<AppState>, Json(req): Json<SignInRequest>) -> Response {
    let Some(email) = normalize_email(&req.email) else {
        return error_body(StatusCode::BAD_REQUEST, "invalid email");
    };

    match state.auth.sign_in_with_password(&email, &req.password).await {
        Ok(session) => {
            let jar = jar_with_session(&session);
            (jar, Json(serde_json::json!({ "user": session.user }))).into_response()
        }
        Err(AuthError::Rejected(reason)) => {
            tracing::warn!(%email, %reason, "sign-in rejected");
            error_body(StatusCode::UNAUTHORIZED, "invalid credentials")
        }
        Err(e) => {
            tracing::error!(error = %e, "sign-in failed");
            error_body(StatusCode::BAD_GATEWAY, "auth service unavailable")
        }
    }
}

#[derive(Deserialize)]
pub struct SignUpRequest {
    email: String,
    password: String,
    full_name: Option<String>,
}

/// `POST /api/auth/signup` — create an account; sets cookies when the
/// backend issues a session immediately (confirmation disabled).
pub async fn signup(State(state): State<AppState>, Json(req): Json<SignUpRequest>) -> Response {
    let Some(email) = normalize_email(&req.email) else {
        return error_body(StatusCode::BAD_REQUEST, "invalid email");
    };
    if req.password.len() < MIN_PASSWORD_LEN {
        return error_body(StatusCode::BAD_REQUEST, "password must be at least 8 characters");
    }

    let opts = crate::backend::SignUpOptions {
        full_name: req.full_name,
        email_redirect_to: Some(CALLBACK_PATH.to_owned()),
    };
    match state.auth.sign_up(&email, &req.password, opts).await {
        Ok(Some(session)) => {
            let jar = jar_with_session(&session);
            (
                jar,
                Json(serde_json::json!({ "user": session.user, "confirmation_required": false })),
            )
                .into_response()
        }
        Ok(None) => Json(serde_json::json!({ "user": null, "confirmation_required": true })).into_response(),
        Err(AuthError::Rejected(reason)) => {
            tracing::warn!(%email, %reason, "sign-up rejected");
            error_body(StatusCode::BAD_REQUEST, "could not create account")
        }
        Err(e) => {
            tracing::error!(error = %e, "sign-up failed");
            error_body(StatusCode::BAD_GATEWAY, "auth service unavailable")
        }
    }
}

/// `POST /api/auth/signout` — terminate the backend session, clear cookies.
/// A backend failure is propagated and leaves the cookies in place.
pub async fn signout(State(state): State<AppState>) -> Response {
    match state.auth.sign_out().await {
        Ok(()) => {
            let secure = config::cookie_secure();
            let [access, refresh] = clear_session_cookies(secure);
            let jar = CookieJar::new().add(access).add(refresh);
            (jar, StatusCode::NO_CONTENT).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "sign-out failed");
            error_body(StatusCode::BAD_GATEWAY, "sign-out failed")
        }
    }
}

/// `GET /api/auth/me` — return the current user projection.
pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

#[derive(Deserialize)]
pub struct EmailRequest {
    email: String,
}

/// `POST /api/auth/signin/magic-link` — send a passwordless sign-in link.
/// The link completes at the callback route like the OAuth flow.
pub async fn signin_magic_link(State(state): State<AppState>, Json(req): Json<EmailRequest>) -> Response {
    let Some(email) = normalize_email(&req.email) else {
        return error_body(StatusCode::BAD_REQUEST, "invalid email");
    };

    match state.auth.send_magic_link(&email, CALLBACK_PATH).await {
        Ok(()) => Json(serde_json::json!({ "message": "magic link sent" })).into_response(),
        Err(AuthError::Rejected(reason)) => {
            tracing::warn!(%email, %reason, "magic link refused");
            error_body(StatusCode::BAD_REQUEST, "could not send magic link")
        }
        Err(e) => {
            tracing::error!(error = %e, "magic link dispatch failed");
            error_body(StatusCode::BAD_GATEWAY, "auth service unavailable")
        }
    }
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    email: String,
    token: String,
}

/// `POST /api/auth/verify-otp` — verify an emailed one-time code (magic
/// link or signup confirmation), setting session cookies on success.
pub async fn verify_otp(State(state): State<AppState>, Json(req): Json<VerifyOtpRequest>) -> Response {
    let Some(email) = normalize_email(&req.email) else {
        return error_body(StatusCode::BAD_REQUEST, "invalid email");
    };
    if req.token.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "token is required");
    }

    match state.auth.verify_otp(&email, req.token.trim()).await {
        Ok(session) => {
            let jar = jar_with_session(&session);
            (jar, Json(serde_json::json!({ "user": session.user }))).into_response()
        }
        Err(AuthError::Rejected(reason)) => {
            tracing::warn!(%email, %reason, "otp verification rejected");
            error_body(StatusCode::UNAUTHORIZED, "invalid code")
        }
        Err(e) => {
            tracing::error!(error = %e, "otp verification failed");
            error_body(StatusCode::BAD_GATEWAY, "auth service unavailable")
        }
    }
}

/// `POST /api/auth/forgot-password` — send a password-reset link.
pub async fn forgot_password(State(state): State<AppState>, Json(req): Json<EmailRequest>) -> Response {
    let Some(email) = normalize_email(&req.email) else {
        return error_body(StatusCode::BAD_REQUEST, "invalid email");
    };

    match state.auth.reset_password_for_email(&email, RESET_PASSWORD_PATH).await {
        Ok(()) => Json(serde_json::json!({ "message": "password reset link sent" })).into_response(),
        Err(AuthError::Rejected(reason)) => {
            tracing::warn!(%email, %reason, "password reset refused");
            error_body(StatusCode::BAD_REQUEST, "could not send reset link")
        }
        Err(e) => {
            tracing::error!(error = %e, "password reset dispatch failed");
            error_body(StatusCode::BAD_GATEWAY, "auth service unavailable")
        }
    }
}

/// `POST /api/auth/refresh` — exchange the refresh cookie for a fresh
/// session, rotating both cookies.
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(refresh) = jar.get(REFRESH_COOKIE).map(Cookie::value).filter(|r| !r.is_empty()) else {
        return error_body(StatusCode::UNAUTHORIZED, "missing refresh token");
    };

    match state.auth.refresh_session(refresh).await {
        Ok(session) => {
            let jar = jar_with_session(&session);
            (jar, Json(serde_json::json!({ "user": session.user }))).into_response()
        }
        Err(AuthError::Rejected(reason)) => {
            tracing::warn!(%reason, "session refresh rejected");
            error_body(StatusCode::UNAUTHORIZED, "invalid refresh token")
        }
        Err(e) => {
            tracing::error!(error = %e, "session refresh failed");
            error_body(StatusCode::BAD_GATEWAY, "auth service unavailable")
        }
    }
}

/// `GET /auth/oauth/{provider}` — redirect to the provider authorize page.
pub async fn oauth_start(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    let Some(provider) = Provider::parse(&provider) else {
        return error_body(StatusCode::BAD_REQUEST, "unknown provider");
    };

    match state.auth.sign_in_with_oauth(provider, CALLBACK_PATH).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            tracing::error!(error = %e, provider = provider.as_str(), "oauth start failed");
            error_body(StatusCode::BAD_GATEWAY, "auth service unavailable")
        }
    }
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
}

/// `GET /auth/callback` — exchange the code, set cookies, land in the app.
pub async fn oauth_callback(State(state): State<AppState>, Query(params): Query<CallbackQuery>) -> Response {
    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return error_body(StatusCode::BAD_REQUEST, "missing code");
    };

    match state.auth.exchange_oauth_code(code).await {
        Ok(session) => {
            let jar = jar_with_session(&session);
            (jar, Redirect::temporary(APP_HOME_PATH)).into_response()
        }
        Err(AuthError::Rejected(reason)) => {
            tracing::warn!(%reason, "oauth code exchange rejected");
            error_body(StatusCode::UNAUTHORIZED, "sign-in failed")
        }
        Err(e) => {
            tracing::error!(error = %e, "oauth code exchange failed");
            error_body(StatusCode::BAD_GATEWAY, "auth service unavailable")
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

//! Route Guard — per-request session gating.
//!
//! ARCHITECTURE
//! ============
//! Runs once per incoming request, before any handler. Static-asset and
//! internal paths are filtered out before anything else so they never cost
//! a session fetch. Remaining paths classify by prefix into protected,
//! auth-only, or public, and the guard allows, redirects to sign-in, or
//! redirects to the app home accordingly. Public paths always pass, but
//! still resolve the session when cookies are presented so a rotated
//! token pair reaches the caller.
//!
//! TRADE-OFFS
//! ==========
//! Session evaluation is fail-closed: if the session store cannot be
//! reached, the request is treated as unauthenticated. A protected page
//! bounces to sign-in rather than rendering for an unknown caller.

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::backend::TokenPair;
use crate::config;
use crate::routes::auth::{ACCESS_COOKIE, REFRESH_COOKIE, session_cookies};
use crate::state::AppState;

/// Where unauthenticated callers of protected paths land.
pub const SIGNIN_PATH: &str = "/auth/signin";
/// Where already-authenticated callers of auth-only paths land.
pub const APP_HOME_PATH: &str = "/admin/dashboard";
/// Fixed post-auth landing for OAuth and signup confirmation redirects.
pub const CALLBACK_PATH: &str = "/auth/callback";

const PROTECTED_PREFIXES: &[&str] = &["/admin"];
const AUTH_ONLY_PREFIXES: &[&str] = &["/auth"];

const EXCLUDED_PREFIXES: &[&str] = &["/assets/", "/pkg/"];
const STATIC_EXTENSIONS: &[&str] = &[".css", ".js", ".map", ".ico", ".png", ".jpg", ".svg", ".webp", ".woff2"];

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Classification of a request path. Every path lands in exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    AuthOnly,
    Public,
}

#[must_use]
pub fn classify(path: &str) -> RouteClass {
    if PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteClass::Protected;
    }
    if AUTH_ONLY_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteClass::AuthOnly;
    }
    RouteClass::Public
}

/// Routing-layer filter: paths the guard never evaluates (and never pays a
/// session fetch for).
#[must_use]
pub fn is_excluded(path: &str) -> bool {
    if path == "/healthz" || path == "/favicon.ico" {
        return true;
    }
    if EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Session-gating middleware. Layered over the whole router.
pub async fn route_guard(State(state): State<AppState>, jar: CookieJar, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if is_excluded(&path) {
        return next.run(req).await;
    }

    let class = classify(&path);

    let access = jar.get(ACCESS_COOKIE).map(Cookie::value);
    let refresh = jar.get(REFRESH_COOKIE).map(Cookie::value);
    let presented_access = access.unwrap_or_default().to_owned();

    let session = if access.is_none() && refresh.is_none() {
        // No cookies at all: nothing to validate or refresh.
        None
    } else {
        match state.auth.session_from_tokens(access, refresh).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, %path, "session store unreachable, failing closed");
                None
            }
        }
    };

    let mut response = match (class, session.is_some()) {
        (RouteClass::Protected, false) => Redirect::temporary(SIGNIN_PATH).into_response(),
        (RouteClass::AuthOnly, true) => Redirect::temporary(APP_HOME_PATH).into_response(),
        _ => next.run(req).await,
    };

    // Rotated pairs are written back on redirects too, not just pass-throughs.
    if let Some(session) = &session {
        if session.tokens.access != presented_access {
            append_session_cookies(&mut response, &session.tokens);
        }
    }

    response
}

fn append_session_cookies(response: &mut Response, tokens: &TokenPair) {
    for cookie in session_cookies(tokens, config::cookie_secure()) {
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the auth surface, the profile API, and the gated pages under a
//! single Axum router, with the Route Guard layered over everything. The
//! guard itself skips excluded paths, so `/healthz` and static assets stay
//! free of session fetches.

pub mod auth;
pub mod profile;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::Html;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::guard;
use crate::state::AppState;

/// Full application router with the session guard applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/signin", get(signin_page))
        .route("/auth/signup", get(signup_page))
        .route("/auth/oauth/{provider}", get(auth::oauth_start))
        .route("/auth/callback", get(auth::oauth_callback))
        .route("/admin/dashboard", get(dashboard_page))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signout", post(auth::signout))
        .route("/api/auth/signin/magic-link", post(auth::signin_magic_link))
        .route("/api/auth/verify-otp", post(auth::verify_otp))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/me", get(auth::me))
        .route("/api/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn_with_state(state.clone(), guard::route_guard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Page shells only — the UI itself is not this crate's concern.

async fn signin_page() -> Html<&'static str> {
    Html("<!doctype html><title>Sign in</title><h1>Sign in</h1>")
}

async fn signup_page() -> Html<&'static str> {
    Html("<!doctype html><title>Sign up</title><h1>Sign up</h1>")
}

async fn dashboard_page() -> Html<&'static str> {
    Html("<!doctype html><title>Dashboard</title><h1>Dashboard</h1>")
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

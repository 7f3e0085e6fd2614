//! Profile CRUD routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::auth::AuthUser;
use crate::backend::Profile;
use crate::state::AppState;

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// `GET /api/profile` — return the caller's profile row.
pub async fn get_profile(State(state): State<AppState>, auth: AuthUser) -> Response {
    match state.profiles.fetch(auth.user.id).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => error_body(StatusCode::NOT_FOUND, "profile not found"),
        Err(e) => {
            tracing::error!(error = %e, user = %auth.user.id, "profile fetch failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "profile store error")
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    full_name: Option<String>,
    avatar_url: Option<String>,
    role: Option<String>,
}

/// `PUT /api/profile` — upsert the caller's profile row. `full_name` is
/// required; everything else is optional.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Response {
    let Some(full_name) = req.full_name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()) else {
        return error_body(StatusCode::BAD_REQUEST, "full_name is required");
    };

    let updated_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    let profile = Profile {
        id: auth.user.id,
        full_name,
        avatar_url: req.avatar_url,
        role: req.role,
        updated_at,
    };

    match state.profiles.upsert(profile).await {
        Ok(saved) => Json(saved).into_response(),
        Err(e) => {
            tracing::error!(error = %e, user = %auth.user.id, "profile upsert failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "profile store error")
        }
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;

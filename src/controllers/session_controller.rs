use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{models::CurrentUser, AppState};

// GET /session
pub async fn get_session(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
) -> impl IntoResponse {
    let active = state.monitors.is_active(&u.id).await;
    Json(json!({ "user_id": u.id, "active": active }))
}

// POST /session (sign-in)
pub async fn post_session(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
) -> impl IntoResponse {
    let started = state.monitors.start_session(&u.id).await;
    if started {
        tracing::info!("session started for user {}", u.id);
    }

    let status = if started { StatusCode::CREATED } else { StatusCode::OK };
    (status, Json(json!({ "user_id": u.id, "active": true, "started": started })))
}

// DELETE /session (sign-out)
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
) -> impl IntoResponse {
    let stopped = state.monitors.end_session(&u.id).await;
    state.notifications.forget(&u.id);

    if stopped {
        tracing::info!("session ended for user {}", u.id);
    }

    Json(json!({ "user_id": u.id, "active": false, "stopped": stopped }))
}

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::{AlertCondition, AssetCategory, CurrentUser},
    services::watchlist_service,
    AppState,
};

#[derive(Deserialize)]
pub struct AddAssetBody {
    pub id: String,
    pub category: AssetCategory,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct ConditionBody {
    pub condition: AlertCondition,
}

// GET /watchlist
pub async fn get_watchlist(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let assets = watchlist_service::list_watchlist(&state, &u.id).await?;
    Ok(Json(json!({ "assets": assets })).into_response())
}

// POST /watchlist
pub async fn post_watchlist(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
    Json(body): Json<AddAssetBody>,
) -> Result<Response, AppError> {
    let assets =
        watchlist_service::add_asset(&state, &u.id, &body.id, body.category, body.name.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "assets": assets }))).into_response())
}

// DELETE /watchlist/:asset_id
pub async fn delete_watchlist_asset(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
    Path(asset_id): Path<String>,
) -> Result<Response, AppError> {
    let assets = watchlist_service::remove_asset(&state, &u.id, &asset_id).await?;
    Ok(Json(json!({ "assets": assets })).into_response())
}

// GET /alert-condition
pub async fn get_alert_condition(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let condition = watchlist_service::get_condition(&state, &u.id).await?;
    Ok(Json(json!({ "condition": condition })).into_response())
}

// PUT /alert-condition
pub async fn put_alert_condition(
    State(state): State<AppState>,
    Extension(u): Extension<CurrentUser>,
    Json(body): Json<ConditionBody>,
) -> Result<Response, AppError> {
    watchlist_service::set_condition(&state, &u.id, body.condition).await?;
    Ok(Json(json!({ "condition": body.condition })).into_response())
}

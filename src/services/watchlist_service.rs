use crate::{
    error::AppError,
    models::{AlertCondition, AssetCategory, WatchedAsset},
    AppState,
};

pub async fn list_watchlist(state: &AppState, user_id: &str) -> Result<Vec<WatchedAsset>, AppError> {
    state.preferences.get_watchlist(user_id).await
}

/// Validates and appends an asset. Ids are unique across categories.
pub async fn add_asset(
    state: &AppState,
    user_id: &str,
    raw_id: &str,
    category: AssetCategory,
    name: Option<&str>,
) -> Result<Vec<WatchedAsset>, AppError> {
    let asset = WatchedAsset::parse(raw_id, category, name)?;
    let id = asset.id.clone();

    let watchlist = state.preferences.add_asset(user_id, asset).await?;
    tracing::info!("user {} watches {} ({})", user_id, id, category.as_str());

    Ok(watchlist)
}

pub async fn remove_asset(state: &AppState, user_id: &str, asset_id: &str) -> Result<Vec<WatchedAsset>, AppError> {
    state.preferences.remove_asset(user_id, asset_id).await
}

pub async fn get_condition(state: &AppState, user_id: &str) -> Result<AlertCondition, AppError> {
    state.preferences.get_alert_condition(user_id).await
}

pub async fn set_condition(state: &AppState, user_id: &str, condition: AlertCondition) -> Result<(), AppError> {
    state.preferences.set_alert_condition(user_id, condition).await?;
    tracing::info!("user {} alert condition set to {:?}", user_id, condition);
    Ok(())
}

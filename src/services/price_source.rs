use std::collections::HashMap;

use async_trait::async_trait;

use crate::{error::AppError, models::AssetCategory};

/// Latest prices for one asset category.
///
/// Ids the upstream cannot resolve are left out of the map. An `Err` means the
/// whole source was unavailable for this call.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn category(&self) -> AssetCategory;

    async fn get_prices(&self, asset_ids: &[String]) -> Result<HashMap<String, f64>, AppError>;
}

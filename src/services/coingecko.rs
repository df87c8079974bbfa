use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;

use crate::{error::AppError, models::AssetCategory};

use super::price_source::PriceSource;

/// `/simple/price` answers `{"bitcoin": {"usd": 64000.0}, ...}`.
pub type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

const VS_CURRENCY: &str = "usd";

/// Digital asset prices from CoinGecko, batched in one request.
#[derive(Clone)]
pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub async fn simple_price(&self, ids: &[String]) -> Result<SimplePriceResponse, AppError> {
        let url = format!("{}/simple/price", self.base_url);
        let joined = ids.join(",");

        let mut req = self
            .http
            .get(url)
            .query(&[("ids", joined.as_str()), ("vs_currencies", VS_CURRENCY)]);
        if let Some(key) = &self.api_key {
            req = req.header("x-cg-demo-api-key", key);
        }

        let res = req.send().await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                provider: "coingecko",
                status,
                body,
            });
        }

        Ok(res.json::<SimplePriceResponse>().await?)
    }
}

/// Keeps only the requested ids that came back with a usable USD price.
pub fn prices_from_response(resp: SimplePriceResponse, ids: &[String]) -> HashMap<String, f64> {
    resp.into_iter()
        .filter(|(id, _)| ids.contains(id))
        .filter_map(|(id, quotes)| {
            let price = *quotes.get(VS_CURRENCY)?;
            (price.is_finite() && price >= 0.0).then_some((id, price))
        })
        .collect()
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    fn category(&self) -> AssetCategory {
        AssetCategory::DigitalAsset
    }

    async fn get_prices(&self, asset_ids: &[String]) -> Result<HashMap<String, f64>, AppError> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let resp = self.simple_price(asset_ids).await?;
        Ok(prices_from_response(resp, asset_ids))
    }
}

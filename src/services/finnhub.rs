use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::AssetCategory};

use super::price_source::PriceSource;

/// Equity quotes from Finnhub.
#[derive(Clone)]
pub struct FinnhubClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl FinnhubClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub async fn quote(&self, symbol: &str) -> Result<QuoteResponse, AppError> {
        if !self.has_key() {
            return Err(AppError::MissingApiKey("FINNHUB_API_KEY"));
        }

        let url = format!("{}/quote", self.base_url);
        let res = self
            .http
            .get(url)
            .query(&[("symbol", symbol), ("token", &self.api_key)])
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                provider: "finnhub",
                status,
                body,
            });
        }

        Ok(res.json::<QuoteResponse>().await?)
    }
}

#[async_trait]
impl PriceSource for FinnhubClient {
    fn category(&self) -> AssetCategory {
        AssetCategory::Equity
    }

    async fn get_prices(&self, asset_ids: &[String]) -> Result<HashMap<String, f64>, AppError> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }
        if !self.has_key() {
            return Err(AppError::MissingApiKey("FINNHUB_API_KEY"));
        }

        // Finnhub has no batch quote endpoint: one request per symbol.
        let results = join_all(asset_ids.iter().map(|sym| async move {
            (sym, self.quote(sym).await)
        }))
        .await;

        let mut prices = HashMap::new();
        let mut last_err = None;
        let mut failed = 0usize;

        for (sym, res) in results {
            match res {
                Ok(q) => {
                    if let Some(price) = q.current_price() {
                        prices.insert(sym.clone(), price);
                    }
                }
                Err(e) => {
                    tracing::debug!("finnhub quote for {} failed: {}", sym, e);
                    failed += 1;
                    last_err = Some(e);
                }
            }
        }

        if failed == asset_ids.len() {
            let reason = last_err.map(|e| e.to_string()).unwrap_or_default();
            return Err(AppError::SourceUnavailable {
                provider: "finnhub",
                reason,
            });
        }

        Ok(prices)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QuoteResponse {
    // current
    pub c: f64,
    // change
    #[serde(default)]
    pub d: Option<f64>,
    // percent change
    #[serde(default)]
    pub dp: Option<f64>,
    // previous close
    #[serde(default)]
    pub pc: f64,
    // timestamp
    #[serde(default)]
    pub t: i64,
}

impl QuoteResponse {
    /// Unknown symbols come back as an all-zero quote.
    pub fn current_price(&self) -> Option<f64> {
        (self.c.is_finite() && self.c > 0.0).then_some(self.c)
    }
}

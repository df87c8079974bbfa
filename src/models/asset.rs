use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Equity,
    DigitalAsset,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Equity => "equity",
            AssetCategory::DigitalAsset => "digital_asset",
        }
    }

    /// Equity tickers are upper case, CoinGecko coin ids are lower case.
    pub fn normalize_id(&self, raw: &str) -> String {
        let id = raw.trim();
        match self {
            AssetCategory::Equity => id.to_uppercase(),
            AssetCategory::DigitalAsset => id.to_lowercase(),
        }
    }

    fn id_pattern(&self) -> &'static Regex {
        static EQUITY: OnceLock<Regex> = OnceLock::new();
        static DIGITAL: OnceLock<Regex> = OnceLock::new();

        match self {
            AssetCategory::Equity => EQUITY.get_or_init(|| {
                Regex::new(r"^[A-Z0-9.\-]{1,15}$").expect("equity id pattern")
            }),
            AssetCategory::DigitalAsset => DIGITAL.get_or_init(|| {
                Regex::new(r"^[a-z0-9\-]{1,64}$").expect("digital asset id pattern")
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedAsset {
    pub id: String,
    pub category: AssetCategory,
    pub name: String,
}

impl WatchedAsset {
    /// Builds a watchlist entry from user input: normalizes the id for its
    /// category and falls back to the id when no display name is given.
    pub fn parse(raw_id: &str, category: AssetCategory, name: Option<&str>) -> Result<Self, AppError> {
        let id = category.normalize_id(raw_id);
        if !category.id_pattern().is_match(&id) {
            return Err(AppError::InvalidAsset(raw_id.trim().to_string()));
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());

        Ok(Self { id, category, name })
    }
}

use serde::{Deserialize, Serialize};

use super::{alert::AlertCondition, asset::WatchedAsset};

/// One document per user in the `preferences` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(rename = "_id")]
    pub user_id: String,

    #[serde(default)]
    pub watchlist: Vec<WatchedAsset>,

    #[serde(default)]
    pub alert_condition: AlertCondition,

    #[serde(default)]
    pub updated_at: i64,
}

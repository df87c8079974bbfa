use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::{doc, to_bson, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    Collection, Database,
};
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{AlertCondition, UserPreferences, WatchedAsset},
};

/// Per-user watchlist and alert condition.
///
/// Reads never fail for a user that has nothing stored: they return an empty
/// watchlist and `AlertCondition::None`. Single-asset edits are atomic per
/// user, so concurrent adds cannot drop each other or slip in a duplicate id.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Watchlist and condition from one read of the user's document.
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences, AppError>;

    async fn set_watchlist(&self, user_id: &str, watchlist: Vec<WatchedAsset>) -> Result<(), AppError>;
    async fn set_alert_condition(&self, user_id: &str, condition: AlertCondition) -> Result<(), AppError>;

    /// Appends `asset` unless its id (any case) is already watched.
    async fn add_asset(&self, user_id: &str, asset: WatchedAsset) -> Result<Vec<WatchedAsset>, AppError>;

    /// Removes the asset whose id matches `asset_id` in any case.
    async fn remove_asset(&self, user_id: &str, asset_id: &str) -> Result<Vec<WatchedAsset>, AppError>;

    async fn get_watchlist(&self, user_id: &str) -> Result<Vec<WatchedAsset>, AppError> {
        Ok(self.get_preferences(user_id).await?.watchlist)
    }

    async fn get_alert_condition(&self, user_id: &str) -> Result<AlertCondition, AppError> {
        Ok(self.get_preferences(user_id).await?.alert_condition)
    }
}

fn empty_preferences(user_id: &str) -> UserPreferences {
    UserPreferences {
        user_id: user_id.to_string(),
        ..Default::default()
    }
}

/// Ids are stored normalized (all upper or all lower case), so these two
/// spellings cover every case-insensitive match.
fn id_spellings(asset_id: &str) -> [String; 2] {
    let id = asset_id.trim();
    [id.to_uppercase(), id.to_lowercase()]
}

#[derive(Clone)]
pub struct MongoPreferenceStore {
    col: Collection<UserPreferences>,
}

impl MongoPreferenceStore {
    pub fn new(db: &Database) -> Self {
        Self {
            col: db.collection::<UserPreferences>("preferences"),
        }
    }

    async fn upsert(&self, user_id: &str, mut set: Document) -> Result<(), AppError> {
        set.insert("updated_at", Utc::now().timestamp());

        let opts = UpdateOptions::builder().upsert(true).build();
        self.col
            .update_one(doc! { "_id": user_id }, doc! { "$set": set }, opts)
            .await?;
        Ok(())
    }

    fn return_after() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build()
    }
}

#[async_trait]
impl PreferenceStore for MongoPreferenceStore {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences, AppError> {
        let found = self.col.find_one(doc! { "_id": user_id }, None).await?;
        Ok(found.unwrap_or_else(|| empty_preferences(user_id)))
    }

    async fn set_watchlist(&self, user_id: &str, watchlist: Vec<WatchedAsset>) -> Result<(), AppError> {
        let value = to_bson(&watchlist)?;
        self.upsert(user_id, doc! { "watchlist": value }).await
    }

    async fn set_alert_condition(&self, user_id: &str, condition: AlertCondition) -> Result<(), AppError> {
        let value = to_bson(&condition)?;
        self.upsert(user_id, doc! { "alert_condition": value }).await
    }

    async fn add_asset(&self, user_id: &str, asset: WatchedAsset) -> Result<Vec<WatchedAsset>, AppError> {
        // Make sure the document exists so the guarded push below never upserts.
        let opts = UpdateOptions::builder().upsert(true).build();
        self.col
            .update_one(
                doc! { "_id": user_id },
                doc! { "$setOnInsert": { "watchlist": [], "alert_condition": "none" } },
                opts,
            )
            .await?;

        let now = Utc::now().timestamp();
        let value = to_bson(&asset)?;
        let updated = self
            .col
            .find_one_and_update(
                doc! { "_id": user_id, "watchlist.id": { "$nin": id_spellings(&asset.id).to_vec() } },
                doc! { "$push": { "watchlist": value }, "$set": { "updated_at": now } },
                Self::return_after(),
            )
            .await?;

        match updated {
            Some(prefs) => Ok(prefs.watchlist),
            None => Err(AppError::DuplicateAsset(asset.id)),
        }
    }

    async fn remove_asset(&self, user_id: &str, asset_id: &str) -> Result<Vec<WatchedAsset>, AppError> {
        let spellings = id_spellings(asset_id).to_vec();
        let now = Utc::now().timestamp();

        let updated = self
            .col
            .find_one_and_update(
                doc! { "_id": user_id, "watchlist.id": { "$in": spellings.clone() } },
                doc! {
                    "$pull": { "watchlist": { "id": { "$in": spellings } } },
                    "$set": { "updated_at": now },
                },
                Self::return_after(),
            )
            .await?;

        match updated {
            Some(prefs) => Ok(prefs.watchlist),
            None => Err(AppError::NotFound(asset_id.trim().to_string())),
        }
    }
}

/// Process-local store, used with `PREFERENCES_BACKEND=memory` and in tests.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    users: RwLock<HashMap<String, UserPreferences>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences, AppError> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned().unwrap_or_else(|| empty_preferences(user_id)))
    }

    async fn set_watchlist(&self, user_id: &str, watchlist: Vec<WatchedAsset>) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        let prefs = users
            .entry(user_id.to_string())
            .or_insert_with(|| empty_preferences(user_id));
        prefs.watchlist = watchlist;
        prefs.updated_at = Utc::now().timestamp();
        Ok(())
    }

    async fn set_alert_condition(&self, user_id: &str, condition: AlertCondition) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        let prefs = users
            .entry(user_id.to_string())
            .or_insert_with(|| empty_preferences(user_id));
        prefs.alert_condition = condition;
        prefs.updated_at = Utc::now().timestamp();
        Ok(())
    }

    async fn add_asset(&self, user_id: &str, asset: WatchedAsset) -> Result<Vec<WatchedAsset>, AppError> {
        // One write guard covers the duplicate check and the push.
        let mut users = self.users.write().await;
        let prefs = users
            .entry(user_id.to_string())
            .or_insert_with(|| empty_preferences(user_id));

        if prefs.watchlist.iter().any(|a| a.id.eq_ignore_ascii_case(&asset.id)) {
            return Err(AppError::DuplicateAsset(asset.id));
        }

        prefs.watchlist.push(asset);
        prefs.updated_at = Utc::now().timestamp();
        Ok(prefs.watchlist.clone())
    }

    async fn remove_asset(&self, user_id: &str, asset_id: &str) -> Result<Vec<WatchedAsset>, AppError> {
        let wanted = asset_id.trim();
        let mut users = self.users.write().await;

        let Some(prefs) = users.get_mut(user_id) else {
            return Err(AppError::NotFound(wanted.to_string()));
        };

        let before = prefs.watchlist.len();
        prefs.watchlist.retain(|a| !a.id.eq_ignore_ascii_case(wanted));
        if prefs.watchlist.len() == before {
            return Err(AppError::NotFound(wanted.to_string()));
        }

        prefs.updated_at = Utc::now().timestamp();
        Ok(prefs.watchlist.clone())
    }
}

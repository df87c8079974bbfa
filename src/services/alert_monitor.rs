//! Watchlist price-alert monitor.
//!
//! One monitor runs per signed-in user. Every period it reads the user's
//! watchlist and alert condition, fetches prices for both asset categories
//! concurrently, compares them with the previous tick's snapshot and notifies
//! once per asset whose movement matches the condition.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    error::AppError,
    models::{AlertCondition, AssetCategory, PriceAlert, PriceSnapshot, WatchedAsset},
};

use super::{notifier::Notifier, preferences::PreferenceStore, price_source::PriceSource};

/// Collaborators and timing shared by every monitor in the process.
#[derive(Clone)]
pub struct MonitorDeps {
    pub preferences: Arc<dyn PreferenceStore>,
    pub equities: Arc<dyn PriceSource>,
    pub digital_assets: Arc<dyn PriceSource>,
    pub notifier: Arc<dyn Notifier>,
    pub period: Duration,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick still held the snapshot.
    Skipped,
    /// Empty watchlist or condition `none`: nothing fetched, snapshot untouched.
    Idle,
    /// No previous prices to compare against; the fetch became the baseline.
    Baseline { tracked: usize },
    Compared { tracked: usize, notified: usize },
    /// A price source failed; snapshot untouched, nothing notified.
    Aborted,
}

pub struct AlertMonitor {
    user_id: String,
    deps: MonitorDeps,
    snapshot: Mutex<PriceSnapshot>,
}

impl AlertMonitor {
    pub fn new(user_id: impl Into<String>, deps: MonitorDeps) -> Self {
        Self {
            user_id: user_id.into(),
            deps,
            snapshot: Mutex::new(PriceSnapshot::new()),
        }
    }

    pub fn period(&self) -> Duration {
        self.deps.period
    }

    /// Copy of the current baseline. Waits for an in-flight tick to finish.
    pub async fn snapshot(&self) -> PriceSnapshot {
        self.snapshot.lock().await.clone()
    }

    /// Runs one tick. At most one tick per monitor is ever in flight; an
    /// overlapping call returns `Skipped` without touching anything.
    pub async fn run_tick(&self) -> TickOutcome {
        let Ok(mut snapshot) = self.snapshot.try_lock() else {
            tracing::debug!("[alert-monitor] user {}: previous tick still running", self.user_id);
            return TickOutcome::Skipped;
        };

        let (watchlist, condition) = self.read_preferences().await;
        if watchlist.is_empty() || condition == AlertCondition::None {
            return TickOutcome::Idle;
        }

        let fresh = match self.fetch_snapshot(&watchlist).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("[alert-monitor] user {}: tick aborted: {}", self.user_id, e);
                return TickOutcome::Aborted;
            }
        };

        let tracked = fresh.len();
        let outcome = if snapshot.is_empty() {
            TickOutcome::Baseline { tracked }
        } else {
            let notified = self.notify_changes(&snapshot, &fresh, &watchlist, condition);
            TickOutcome::Compared { tracked, notified }
        };

        // Assets missing from this fetch are dropped, not carried forward.
        *snapshot = fresh;
        outcome
    }

    async fn read_preferences(&self) -> (Vec<WatchedAsset>, AlertCondition) {
        match self.deps.preferences.get_preferences(&self.user_id).await {
            Ok(prefs) => (prefs.watchlist, prefs.alert_condition),
            Err(e) => {
                tracing::warn!("[alert-monitor] user {}: preference read failed: {}", self.user_id, e);
                (Vec::new(), AlertCondition::None)
            }
        }
    }

    async fn fetch_snapshot(&self, watchlist: &[WatchedAsset]) -> Result<PriceSnapshot, AppError> {
        let ids_for = |category: AssetCategory| -> Vec<String> {
            watchlist
                .iter()
                .filter(|a| a.category == category)
                .map(|a| a.id.clone())
                .collect()
        };
        let equity_ids = ids_for(AssetCategory::Equity);
        let digital_ids = ids_for(AssetCategory::DigitalAsset);

        let (equities, digital) = tokio::join!(
            self.fetch_category(self.deps.equities.as_ref(), &equity_ids),
            self.fetch_category(self.deps.digital_assets.as_ref(), &digital_ids)
        );
        let (equities, digital) = (equities?, digital?);

        Ok(merge(watchlist, [equities, digital]))
    }

    async fn fetch_category(
        &self,
        source: &dyn PriceSource,
        ids: &[String],
    ) -> Result<HashMap<String, f64>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        match time::timeout(self.deps.fetch_timeout, source.get_prices(ids)).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(
                    "[alert-monitor] user {}: {} prices timed out after {:?}",
                    self.user_id,
                    source.category().as_str(),
                    self.deps.fetch_timeout
                );
                Ok(HashMap::new())
            }
        }
    }

    fn notify_changes(
        &self,
        previous: &PriceSnapshot,
        fresh: &PriceSnapshot,
        watchlist: &[WatchedAsset],
        condition: AlertCondition,
    ) -> usize {
        let now = Utc::now().timestamp();
        let mut notified = 0;

        for change in fresh.changes_from(previous) {
            if !condition.matches(change.direction) {
                continue;
            }
            let Some(asset) = watchlist.iter().find(|a| a.id == change.asset_id) else {
                continue;
            };

            self.deps.notifier.notify(&PriceAlert {
                user_id: self.user_id.clone(),
                asset_id: asset.id.clone(),
                name: asset.name.clone(),
                category: asset.category,
                previous_price: change.previous,
                current_price: change.current,
                direction: change.direction,
                created_at: now,
            });
            notified += 1;
        }

        notified
    }
}

/// Only ids still on the watchlist make it into the snapshot, so a source
/// echoing extra ids cannot create comparisons for assets nobody watches.
fn merge<const N: usize>(watchlist: &[WatchedAsset], parts: [HashMap<String, f64>; N]) -> PriceSnapshot {
    let mut snapshot = PriceSnapshot::new();
    for part in parts {
        for (id, price) in part {
            if watchlist.iter().any(|a| a.id == id) {
                snapshot.insert(id, price);
            }
        }
    }
    snapshot
}

/// A running monitor task. Dropping the handle also stops the task, but only
/// `stop` waits for it to wind down.
pub struct MonitorHandle {
    monitor: Arc<AlertMonitor>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the timer and any in-flight tick, then waits for the task.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!("[alert-monitor] user {}: task failed: {}", self.monitor.user_id, e);
            }
        }
    }
}

pub fn spawn(monitor: Arc<AlertMonitor>) -> MonitorHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let task_monitor = Arc::clone(&monitor);

    let task = tokio::spawn(async move {
        let monitor = task_monitor;
        let mut interval = time::interval(monitor.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("[alert-monitor] started for user {}", monitor.user_id);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {}
            }

            // Dropping the tick future on shutdown releases the snapshot
            // without writing the fetched prices.
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                outcome = monitor.run_tick() => {
                    tracing::debug!("[alert-monitor] user {}: {:?}", monitor.user_id, outcome);
                }
            }
        }

        tracing::info!("[alert-monitor] stopped for user {}", monitor.user_id);
    });

    MonitorHandle {
        monitor,
        shutdown,
        task,
    }
}

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use marketwatch::{
    error::AppError,
    models::{AlertCondition, AssetCategory, Direction, PriceAlert, UserPreferences, WatchedAsset},
    services::{
        alert_monitor::{self, AlertMonitor, MonitorDeps, TickOutcome},
        monitor_registry::MonitorRegistry,
        notifier::Notifier,
        preferences::{MemoryPreferenceStore, PreferenceStore},
        price_source::PriceSource,
    },
};
use tokio::sync::Notify;

type Scripted = Result<HashMap<String, f64>, String>;

fn prices(items: &[(&str, f64)]) -> Scripted {
    Ok(items.iter().map(|(id, p)| (id.to_string(), *p)).collect())
}

/// Returns queued responses in order, then empty maps.
struct ScriptedSource {
    category: AssetCategory,
    responses: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedSource {
    fn new(category: AssetCategory, responses: Vec<Scripted>) -> Arc<Self> {
        Self::slow(category, responses, Duration::ZERO)
    }

    fn slow(category: AssetCategory, responses: Vec<Scripted>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            category,
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    fn category(&self) -> AssetCategory {
        self.category
    }

    async fn get_prices(&self, _asset_ids: &[String]) -> Result<HashMap<String, f64>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(p)) => Ok(p),
            Some(Err(reason)) => Err(AppError::SourceUnavailable {
                provider: "scripted",
                reason,
            }),
            None => Ok(HashMap::new()),
        }
    }
}

/// Blocks inside `get_prices` until released.
struct GatedSource {
    started: Notify,
    release: Notify,
    calls: AtomicUsize,
}

impl GatedSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PriceSource for GatedSource {
    fn category(&self) -> AssetCategory {
        AssetCategory::Equity
    }

    async fn get_prices(&self, _asset_ids: &[String]) -> Result<HashMap<String, f64>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(HashMap::from([("A".to_string(), 10.0)]))
    }
}

/// Sleeps longer than the monitor period and records how many calls overlap.
struct OverlapProbe {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl PriceSource for OverlapProbe {
    fn category(&self) -> AssetCategory {
        AssetCategory::Equity
    }

    async fn get_prices(&self, _asset_ids: &[String]) -> Result<HashMap<String, f64>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(HashMap::from([("A".to_string(), 10.0)]))
    }
}

struct FailingPreferences;

#[async_trait]
impl PreferenceStore for FailingPreferences {
    async fn get_preferences(&self, _user_id: &str) -> Result<UserPreferences, AppError> {
        Err(AppError::NotFound("preferences backend".into()))
    }

    async fn set_watchlist(&self, _user_id: &str, _watchlist: Vec<WatchedAsset>) -> Result<(), AppError> {
        Ok(())
    }

    async fn set_alert_condition(&self, _user_id: &str, _condition: AlertCondition) -> Result<(), AppError> {
        Ok(())
    }

    async fn add_asset(&self, _user_id: &str, _asset: WatchedAsset) -> Result<Vec<WatchedAsset>, AppError> {
        Ok(Vec::new())
    }

    async fn remove_asset(&self, _user_id: &str, _asset_id: &str) -> Result<Vec<WatchedAsset>, AppError> {
        Ok(Vec::new())
    }
}

/// Counts whole-document reads separately from the single-field getters.
struct CountingPreferences {
    inner: MemoryPreferenceStore,
    document_reads: AtomicUsize,
}

#[async_trait]
impl PreferenceStore for CountingPreferences {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreferences, AppError> {
        self.document_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_preferences(user_id).await
    }

    async fn set_watchlist(&self, user_id: &str, watchlist: Vec<WatchedAsset>) -> Result<(), AppError> {
        self.inner.set_watchlist(user_id, watchlist).await
    }

    async fn set_alert_condition(&self, user_id: &str, condition: AlertCondition) -> Result<(), AppError> {
        self.inner.set_alert_condition(user_id, condition).await
    }

    async fn add_asset(&self, user_id: &str, asset: WatchedAsset) -> Result<Vec<WatchedAsset>, AppError> {
        self.inner.add_asset(user_id, asset).await
    }

    async fn remove_asset(&self, user_id: &str, asset_id: &str) -> Result<Vec<WatchedAsset>, AppError> {
        self.inner.remove_asset(user_id, asset_id).await
    }
}

/// Panics inside a tick, which ends the monitor task.
struct PanickingSource;

#[async_trait]
impl PriceSource for PanickingSource {
    fn category(&self) -> AssetCategory {
        AssetCategory::Equity
    }

    async fn get_prices(&self, _asset_ids: &[String]) -> Result<HashMap<String, f64>, AppError> {
        panic!("upstream client bug");
    }
}

#[derive(Default)]
struct RecordingNotifier {
    alerts: Mutex<Vec<PriceAlert>>,
}

impl RecordingNotifier {
    fn alerts(&self) -> Vec<PriceAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: &PriceAlert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

const USER: &str = "user-1";

fn equity(id: &str) -> WatchedAsset {
    WatchedAsset::parse(id, AssetCategory::Equity, Some(format!("{id} Corp").as_str())).unwrap()
}

fn coin(id: &str) -> WatchedAsset {
    WatchedAsset::parse(id, AssetCategory::DigitalAsset, None).unwrap()
}

async fn store_with(watchlist: Vec<WatchedAsset>, condition: AlertCondition) -> Arc<MemoryPreferenceStore> {
    let store = Arc::new(MemoryPreferenceStore::new());
    store.set_watchlist(USER, watchlist).await.unwrap();
    store.set_alert_condition(USER, condition).await.unwrap();
    store
}

fn deps(
    preferences: Arc<dyn PreferenceStore>,
    equities: Arc<dyn PriceSource>,
    digital_assets: Arc<dyn PriceSource>,
    notifier: Arc<RecordingNotifier>,
) -> MonitorDeps {
    MonitorDeps {
        preferences,
        equities,
        digital_assets,
        notifier,
        period: Duration::from_secs(30),
        fetch_timeout: Duration::from_secs(5),
    }
}

fn no_coins() -> Arc<ScriptedSource> {
    ScriptedSource::new(AssetCategory::DigitalAsset, vec![])
}

#[tokio::test]
async fn first_tick_sets_baseline_without_alerting() {
    let store = store_with(vec![equity("A")], AlertCondition::Any).await;
    let equities = ScriptedSource::new(AssetCategory::Equity, vec![prices(&[("A", 10.0)])]);
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(USER, deps(store, equities.clone(), no_coins(), notifier.clone()));

    assert_eq!(monitor.run_tick().await, TickOutcome::Baseline { tracked: 1 });
    assert!(notifier.alerts().is_empty());
    assert_eq!(monitor.snapshot().await.get("A"), Some(10.0));
}

#[tokio::test]
async fn alerts_follow_the_configured_direction() {
    for (condition, expected) in [
        (AlertCondition::Increase, 1),
        (AlertCondition::Decrease, 0),
        (AlertCondition::Any, 1),
    ] {
        let store = store_with(vec![equity("A")], condition).await;
        let equities = ScriptedSource::new(
            AssetCategory::Equity,
            vec![prices(&[("A", 10.0)]), prices(&[("A", 12.0)])],
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = AlertMonitor::new(USER, deps(store, equities, no_coins(), notifier.clone()));

        monitor.run_tick().await;
        let outcome = monitor.run_tick().await;

        assert_eq!(outcome, TickOutcome::Compared { tracked: 1, notified: expected }, "{condition:?}");
        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), expected, "{condition:?}");

        if let Some(a) = alerts.first() {
            assert_eq!(a.asset_id, "A");
            assert_eq!(a.name, "A Corp");
            assert_eq!(a.user_id, USER);
            assert_eq!(a.direction, Direction::Increase);
            assert_eq!(a.previous_price, 10.0);
            assert_eq!(a.current_price, 12.0);
        }
    }
}

#[tokio::test]
async fn unchanged_price_never_alerts() {
    for condition in [AlertCondition::Increase, AlertCondition::Decrease, AlertCondition::Any] {
        let store = store_with(vec![equity("A")], condition).await;
        let equities = ScriptedSource::new(
            AssetCategory::Equity,
            vec![prices(&[("A", 10.0)]), prices(&[("A", 10.0)])],
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = AlertMonitor::new(USER, deps(store, equities, no_coins(), notifier.clone()));

        monitor.run_tick().await;
        monitor.run_tick().await;

        assert!(notifier.alerts().is_empty(), "{condition:?}");
    }
}

#[tokio::test]
async fn condition_none_skips_fetch_and_keeps_snapshot() {
    let store = store_with(vec![equity("A")], AlertCondition::Any).await;
    let equities = ScriptedSource::new(
        AssetCategory::Equity,
        vec![prices(&[("A", 10.0)]), prices(&[("A", 50.0)])],
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(USER, deps(store.clone(), equities.clone(), no_coins(), notifier.clone()));

    monitor.run_tick().await;
    store.set_alert_condition(USER, AlertCondition::None).await.unwrap();

    assert_eq!(monitor.run_tick().await, TickOutcome::Idle);
    assert_eq!(equities.calls(), 1);
    assert_eq!(monitor.snapshot().await.get("A"), Some(10.0));
    assert!(notifier.alerts().is_empty());
}

#[tokio::test]
async fn empty_watchlist_is_a_no_op() {
    let store = store_with(vec![], AlertCondition::Any).await;
    let equities = ScriptedSource::new(AssetCategory::Equity, vec![prices(&[("A", 10.0)])]);
    let coins = no_coins();
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(USER, deps(store, equities.clone(), coins.clone(), notifier));

    assert_eq!(monitor.run_tick().await, TickOutcome::Idle);
    assert_eq!(equities.calls(), 0);
    assert_eq!(coins.calls(), 0);
}

#[tokio::test]
async fn unresolved_asset_is_dropped_from_snapshot() {
    let store = store_with(vec![equity("A"), equity("B")], AlertCondition::Any).await;
    let equities = ScriptedSource::new(
        AssetCategory::Equity,
        vec![prices(&[("A", 10.0), ("B", 5.0)]), prices(&[("A", 11.0)])],
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(USER, deps(store, equities, no_coins(), notifier.clone()));

    monitor.run_tick().await;
    let outcome = monitor.run_tick().await;

    assert_eq!(outcome, TickOutcome::Compared { tracked: 1, notified: 1 });
    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].asset_id, "A");

    let snap = monitor.snapshot().await;
    assert_eq!(snap.get("A"), Some(11.0));
    assert!(!snap.contains("B"));
}

#[tokio::test]
async fn failing_source_aborts_the_whole_tick() {
    let store = store_with(vec![equity("A"), coin("c")], AlertCondition::Any).await;
    let equities = ScriptedSource::new(
        AssetCategory::Equity,
        vec![prices(&[("A", 1.0)]), Err("equities down".into())],
    );
    let coins = ScriptedSource::new(
        AssetCategory::DigitalAsset,
        vec![prices(&[("c", 2.0)]), prices(&[("c", 3.0)])],
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(USER, deps(store, equities, coins.clone(), notifier.clone()));

    assert_eq!(monitor.run_tick().await, TickOutcome::Baseline { tracked: 2 });
    assert_eq!(monitor.run_tick().await, TickOutcome::Aborted);

    assert_eq!(coins.calls(), 2);
    assert!(notifier.alerts().is_empty());
    let snap = monitor.snapshot().await;
    assert_eq!(snap.get("A"), Some(1.0));
    assert_eq!(snap.get("c"), Some(2.0));
}

#[tokio::test(start_paused = true)]
async fn timed_out_category_counts_as_unresolved() {
    let store = store_with(vec![equity("A"), coin("c")], AlertCondition::Any).await;
    let equities = ScriptedSource::slow(
        AssetCategory::Equity,
        vec![prices(&[("A", 1.0)])],
        Duration::from_secs(60),
    );
    let coins = ScriptedSource::new(AssetCategory::DigitalAsset, vec![prices(&[("c", 2.0)])]);
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(USER, deps(store, equities, coins, notifier));

    assert_eq!(monitor.run_tick().await, TickOutcome::Baseline { tracked: 1 });
    let snap = monitor.snapshot().await;
    assert!(!snap.contains("A"));
    assert_eq!(snap.get("c"), Some(2.0));
}

#[tokio::test]
async fn preference_failure_degrades_to_idle() {
    let equities = ScriptedSource::new(AssetCategory::Equity, vec![prices(&[("A", 1.0)])]);
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(
        USER,
        deps(Arc::new(FailingPreferences), equities.clone(), no_coins(), notifier),
    );

    assert_eq!(monitor.run_tick().await, TickOutcome::Idle);
    assert_eq!(equities.calls(), 0);
}

#[tokio::test]
async fn each_tick_compares_only_with_the_previous_one() {
    let store = store_with(vec![equity("A")], AlertCondition::Increase).await;
    let equities = ScriptedSource::new(
        AssetCategory::Equity,
        vec![prices(&[("A", 10.0)]), prices(&[("A", 12.0)]), prices(&[("A", 11.0)])],
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(USER, deps(store, equities, no_coins(), notifier.clone()));

    monitor.run_tick().await;
    monitor.run_tick().await;
    assert_eq!(
        monitor.run_tick().await,
        TickOutcome::Compared { tracked: 1, notified: 0 }
    );
    assert_eq!(notifier.alerts().len(), 1);
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let store = store_with(vec![equity("A")], AlertCondition::Any).await;
    let gated = GatedSource::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = Arc::new(AlertMonitor::new(USER, deps(store, gated.clone(), no_coins(), notifier)));

    let first = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run_tick().await }
    });
    gated.started.notified().await;

    assert_eq!(monitor.run_tick().await, TickOutcome::Skipped);

    gated.release.notify_one();
    assert_eq!(first.await.unwrap(), TickOutcome::Baseline { tracked: 1 });
    assert_eq!(gated.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_ticks_never_overlap_on_the_timer() {
    let store = store_with(vec![equity("A")], AlertCondition::Any).await;
    let probe = Arc::new(OverlapProbe {
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
        delay: Duration::from_secs(75),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let mut d = deps(store, probe.clone(), no_coins(), notifier);
    d.fetch_timeout = Duration::from_secs(300);

    let handle = alert_monitor::spawn(Arc::new(AlertMonitor::new(USER, d)));
    tokio::time::sleep(Duration::from_secs(300)).await;
    handle.stop().await;

    let calls = probe.calls.load(Ordering::SeqCst);
    assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    assert!((2..=5).contains(&calls), "calls = {calls}");
}

#[tokio::test]
async fn stopping_mid_tick_discards_the_result() {
    let store = store_with(vec![equity("A")], AlertCondition::Any).await;
    let gated = GatedSource::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = Arc::new(AlertMonitor::new(USER, deps(store, gated.clone(), no_coins(), notifier.clone())));

    let handle = alert_monitor::spawn(Arc::clone(&monitor));
    gated.started.notified().await;

    handle.stop().await;
    gated.release.notify_one();

    assert!(monitor.snapshot().await.is_empty());
    assert!(notifier.alerts().is_empty());
}

#[tokio::test]
async fn registry_tracks_one_monitor_per_session() {
    let store = store_with(vec![], AlertCondition::None).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = MonitorRegistry::new(deps(store, no_coins(), no_coins(), notifier));

    assert!(registry.start_session(USER).await);
    assert!(!registry.start_session(USER).await);
    assert!(registry.is_active(USER).await);
    assert_eq!(registry.active_count().await, 1);

    assert!(registry.end_session(USER).await);
    assert!(!registry.end_session(USER).await);
    assert!(!registry.is_active(USER).await);

    registry.start_session("user-2").await;
    registry.shutdown_all().await;
    assert_eq!(registry.active_count().await, 0);
}

#[tokio::test]
async fn each_tick_reads_preferences_once() {
    let inner = MemoryPreferenceStore::new();
    inner.set_watchlist(USER, vec![equity("A")]).await.unwrap();
    inner.set_alert_condition(USER, AlertCondition::Any).await.unwrap();
    let store = Arc::new(CountingPreferences {
        inner,
        document_reads: AtomicUsize::new(0),
    });
    let equities = ScriptedSource::new(AssetCategory::Equity, vec![prices(&[("A", 10.0)])]);
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = AlertMonitor::new(USER, deps(store.clone(), equities, no_coins(), notifier));

    assert_eq!(monitor.run_tick().await, TickOutcome::Baseline { tracked: 1 });
    assert_eq!(store.document_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn crashed_monitor_is_not_counted_as_active() {
    let store = store_with(vec![equity("A")], AlertCondition::Any).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = MonitorRegistry::new(deps(store, Arc::new(PanickingSource), no_coins(), notifier));

    assert!(registry.start_session(USER).await);

    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.is_active(USER).await {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("monitor task should end after the panic");

    assert_eq!(registry.active_count().await, 0);
    // A dead monitor does not block the next sign-in.
    assert!(registry.start_session(USER).await);
    registry.shutdown_all().await;
}

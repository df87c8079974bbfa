//! Library entrypoint for MarketWatch.
//!
//! Integration tests under `tests/` import the app state, routers, controllers
//! and services from here.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;

#[path = "middleware/auth.rs"]
pub mod auth;

pub mod services;

pub mod controllers;
pub mod routes;

use services::{
    alert_monitor::MonitorDeps, monitor_registry::MonitorRegistry, notifier::NotificationHub,
    preferences::PreferenceStore, price_source::PriceSource,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub preferences: Arc<dyn PreferenceStore>,
    pub notifications: NotificationHub,
    pub monitors: MonitorRegistry,
}

impl AppState {
    /// Wires the notification hub in as the monitors' notifier.
    pub fn new(
        settings: config::Settings,
        preferences: Arc<dyn PreferenceStore>,
        equities: Arc<dyn PriceSource>,
        digital_assets: Arc<dyn PriceSource>,
    ) -> Self {
        let notifications = NotificationHub::new(settings.toast_capacity, settings.alert_sound.clone());

        let monitors = MonitorRegistry::new(MonitorDeps {
            preferences: Arc::clone(&preferences),
            equities,
            digital_assets,
            notifier: Arc::new(notifications.clone()),
            period: settings.alert_interval,
            fetch_timeout: settings.price_fetch_timeout,
        });

        Self {
            settings,
            preferences,
            notifications,
            monitors,
        }
    }
}

pub mod alert_monitor;
pub mod coingecko;
pub mod finnhub;
pub mod monitor_registry;
pub mod notifier;
pub mod preferences;
pub mod price_source;
pub mod watchlist_service;

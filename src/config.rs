use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferencesBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub preferences_backend: PreferencesBackend,

    pub jwt_secret: String,
    pub jwt_cookie_name: String,

    pub finnhub_api_key: String,
    pub finnhub_base_url: String,
    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,

    pub alert_interval: Duration,
    pub price_fetch_timeout: Duration,
    pub toast_capacity: usize,
    pub alert_sound: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let preferences_backend = match var_or("PREFERENCES_BACKEND", "mongo").to_lowercase().as_str() {
        "memory" => PreferencesBackend::Memory,
        _ => PreferencesBackend::Mongo,
    };

    let coingecko_api_key = env::var("COINGECKO_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());

    // A zero period would make tokio's interval panic.
    let interval_secs = parsed_or("ALERT_INTERVAL_SECS", 30u64).max(1);
    let timeout_secs = parsed_or("PRICE_FETCH_TIMEOUT_SECS", 10u64).max(1);

    Settings {
        host: var_or("HOST", "127.0.0.1"),
        port: parsed_or("PORT", 3000u16),
        mongodb_uri: var_or("MONGODB_URI", "mongodb://localhost:27017"),
        mongodb_db: var_or("MONGODB_DB", "marketwatch"),
        preferences_backend,
        jwt_secret: var_or("JWT_SECRET", "change-me-dev-secret"),
        jwt_cookie_name: var_or("JWT_COOKIE_NAME", "auth"),
        finnhub_api_key: var_or("FINNHUB_API_KEY", ""),
        finnhub_base_url: var_or("FINNHUB_BASE_URL", "https://finnhub.io/api/v1"),
        coingecko_base_url: var_or("COINGECKO_BASE_URL", "https://api.coingecko.com/api/v3"),
        coingecko_api_key,
        alert_interval: Duration::from_secs(interval_secs),
        price_fetch_timeout: Duration::from_secs(timeout_secs),
        toast_capacity: parsed_or("TOAST_CAPACITY", 20usize).max(1),
        alert_sound: var_or("ALERT_SOUND", "chime"),
    }
}

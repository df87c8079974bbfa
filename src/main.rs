use std::{net::SocketAddr, sync::Arc};

use mongodb::Client;

use marketwatch::{
    config::{self, PreferencesBackend},
    routes,
    services::{
        coingecko::CoinGeckoClient,
        finnhub::FinnhubClient,
        preferences::{MemoryPreferenceStore, MongoPreferenceStore, PreferenceStore},
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let settings = config::load();

    let preferences: Arc<dyn PreferenceStore> = match settings.preferences_backend {
        PreferencesBackend::Mongo => {
            let client = Client::with_uri_str(&settings.mongodb_uri).await?;
            let db = client.database(&settings.mongodb_db);
            Arc::new(MongoPreferenceStore::new(&db))
        }
        PreferencesBackend::Memory => {
            tracing::warn!("using in-memory preferences; nothing survives a restart");
            Arc::new(MemoryPreferenceStore::new())
        }
    };

    if settings.finnhub_api_key.trim().is_empty() {
        tracing::warn!("FINNHUB_API_KEY is not set; equity alerts will abort their ticks");
    }

    let finnhub = FinnhubClient::new(settings.finnhub_base_url.clone(), settings.finnhub_api_key.clone());
    let coingecko = CoinGeckoClient::new(settings.coingecko_base_url.clone(), settings.coingecko_api_key.clone());

    let state = AppState::new(settings.clone(), preferences, Arc::new(finnhub), Arc::new(coingecko));
    let monitors = state.monitors.clone();

    let app = routes::app(state);

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));
    tracing::info!(
        "listening on http://{} (alert interval {:?})",
        addr,
        settings.alert_interval
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    monitors.shutdown_all().await;
    Ok(())
}

//! CardVault sync service
//!
//! Serves the offline-first card cache and collection sync core to the app
//! over localhost.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardvault_sync::catalog::HttpCatalogClient;
use cardvault_sync::config::Config;
use cardvault_sync::db::{self, SqliteDocumentStore, SqliteKvStore};
use cardvault_sync::store::DocumentStore;
use cardvault_sync::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CardVault sync service");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Remote store path: {:?}", config.remote_db_path);
    tracing::info!("Catalog URL: {}", config.catalog_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (CARDSYNC_API_PSK). Authentication is disabled!");
    }

    let kv = Arc::new(SqliteKvStore::new(db::init_database(&config.db_path).await?));
    let remote: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(
        db::init_database(&config.remote_db_path).await?,
    ));
    let catalog = Arc::new(HttpCatalogClient::new(
        config.catalog_url.clone(),
        config.catalog_timeout,
    )?);

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, kv, Some(remote), catalog)?;

    if state.refresh.is_cache_stale().await {
        let refresh = state.refresh.clone();
        tokio::spawn(async move {
            tracing::info!("Offline catalog is stale, refreshing in background");
            if let Err(e) = refresh.sync_card_data().await {
                tracing::warn!("Background catalog refresh failed: {}", e);
            }
        });
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

//! CardVault sync core
//!
//! Offline-first card catalog caching, local image overrides, bonus variant
//! eligibility and collection synchronization, exposed to the app over a
//! localhost JSON API.

pub mod api;
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod display;
pub mod errors;
pub mod models;
pub mod overrides;
pub mod refresh;
pub mod store;
pub mod sync;
pub mod variants;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cache::CatalogFallbackCache;
use catalog::CatalogClient;
use config::Config;
use display::CardDisplayService;
use errors::AppError;
use overrides::LocalImageOverrideStore;
use refresh::RefreshOrchestrator;
use store::{DocumentStore, KeyValueStore};
use sync::{CollectionSynchronizer, LocalRemovedLedger, Preferences};
use variants::VariantEligibility;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sync: Arc<CollectionSynchronizer>,
    pub ledger: Arc<LocalRemovedLedger>,
    pub preferences: Arc<Preferences>,
    pub overrides: Arc<LocalImageOverrideStore>,
    pub display: Arc<CardDisplayService>,
    pub refresh: Arc<RefreshOrchestrator>,
}

impl AppState {
    /// Wire every service over the given stores and catalog client.
    pub fn new(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        remote: Option<Arc<dyn DocumentStore>>,
        catalog: Arc<dyn CatalogClient>,
    ) -> Result<Self, AppError> {
        let variants = match &config.variant_rules_path {
            Some(path) => VariantEligibility::from_file(path)?,
            None => VariantEligibility::default(),
        };
        tracing::info!("Loaded {} variant rules", variants.rules().len());

        let overrides = Arc::new(LocalImageOverrideStore::new(config.documents_dir.as_deref()));
        if !overrides.is_available() {
            tracing::warn!("No documents directory configured; image overrides are disabled");
        }

        let fallback = Arc::new(CatalogFallbackCache::new(kv.clone(), catalog.clone()));
        let refresh = Arc::new(RefreshOrchestrator::new(
            kv.clone(),
            catalog,
            config.offline_sets.clone(),
        ));
        let display = Arc::new(CardDisplayService::new(
            Arc::new(variants),
            overrides.clone(),
            fallback,
            refresh.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            sync: Arc::new(CollectionSynchronizer::new(remote, kv.clone())),
            ledger: Arc::new(LocalRemovedLedger::new(kv.clone())),
            preferences: Arc::new(Preferences::new(kv)),
            overrides,
            display,
            refresh,
        })
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Cards
        .route("/cards/{id}", get(api::get_card))
        // Collections
        .route("/collections", get(api::list_collections))
        .route("/collections", put(api::save_collections))
        .route("/binder-order", get(api::get_binder_order))
        .route("/binder-order", put(api::save_binder_order))
        // Device-local collection state
        .route("/collections/{id}/removed-slots", get(api::list_removed_slots))
        .route("/collections/{id}/removed-slots", post(api::mark_slot_removed))
        .route(
            "/collections/{id}/removed-slots/{slot}",
            delete(api::restore_slot),
        )
        .route("/collections/{id}/view-mode", get(api::get_view_mode))
        .route("/collections/{id}/view-mode", put(api::set_view_mode))
        // Image overrides
        .route("/overrides/{namespace}", get(api::list_overrides))
        .route("/overrides/{namespace}/{card_id}", put(api::set_override))
        .route("/overrides/{namespace}/{card_id}", delete(api::remove_override))
        // Offline catalog
        .route("/catalog/status", get(api::catalog_status))
        .route("/catalog/refresh", post(api::refresh_catalog))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

// SPDX-License-Identifier: Apache-2.0

//! RentRoll Optimizer HTTP service.
//!
//! Serves warehouse-backed unit data and elasticity-based rent suggestions.
//! Warehouse table coordinates resolve through a layered settings store
//! (runtime settings > environment > defaults) on every request.

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod credentials;
mod http;
pub mod telemetry;
pub mod warehouse;

use axum::extract::{MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::cache::ResponseCache;
use crate::config::layers::SettingsStore;
use crate::config::ApiConfig;
use crate::telemetry::RequestMetrics;
use crate::warehouse::WarehouseBackend;

pub use crate::config::validate_startup_config_contract;
pub use crate::warehouse::bigquery::BigQueryBackend;
pub use crate::warehouse::fake::FakeWarehouse;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub settings: Arc<SettingsStore>,
    pub warehouse: Arc<dyn WarehouseBackend>,
    pub optimize_slots: Arc<Semaphore>,
    pub response_cache: Arc<Mutex<ResponseCache>>,
    pub metrics: Arc<RequestMetrics>,
}

impl AppState {
    #[must_use]
    pub fn with_config(
        config: ApiConfig,
        settings: SettingsStore,
        warehouse: Arc<dyn WarehouseBackend>,
    ) -> Self {
        let optimize_slots = Arc::new(Semaphore::new(config.max_concurrent_optimizations));
        let response_cache = Arc::new(Mutex::new(ResponseCache::new(
            config.cache_ttl,
            config.cache_max_entries,
        )));
        Self {
            config: Arc::new(config),
            settings: Arc::new(settings),
            warehouse,
            optimize_slots,
            response_cache,
            metrics: Arc::new(RequestMetrics::default()),
        }
    }
}

async fn track_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path().to_string(), |p| p.as_str().to_string());
    let start = Instant::now();
    let response = next.run(req).await;
    state
        .metrics
        .observe_request(&route, response.status(), start.elapsed())
        .await;
    response
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    if config.cors_allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/units", get(http::handlers::list_units))
        .route(
            "/units/:unit_id/comparables",
            get(http::handlers::comparables),
        )
        .route(
            "/units/:unit_id/optimize",
            post(http::handlers::optimize_unit),
        )
        .route("/batch/optimize", post(http::handlers::batch_optimize))
        .route("/summary", get(http::handlers::summary))
        .route("/properties", get(http::handlers::properties))
        .route(
            "/analytics/portfolio",
            get(http::handlers::analytics_portfolio),
        )
        .route(
            "/analytics/market-position",
            get(http::handlers::analytics_market_position),
        )
        .route(
            "/analytics/pricing-opportunities",
            get(http::handlers::analytics_pricing_opportunities),
        )
        .route(
            "/settings",
            get(http::handlers::settings_get).post(http::handlers::settings_post),
        )
        .route("/settings/test", post(http::handlers::settings_test));

    Router::new()
        .route("/health", get(http::handlers::health))
        .nest(&state.config.api_prefix, api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_metrics,
        ))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

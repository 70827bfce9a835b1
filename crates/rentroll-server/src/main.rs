// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use rentroll_server::config::layers::SettingsStore;
use rentroll_server::config::ApiConfig;
use rentroll_server::warehouse::{RetryPolicy, WarehouseBackend, WarehouseTargets};
use rentroll_server::{
    build_router, credentials, validate_startup_config_contract, AppState, BigQueryBackend,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_origin_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "*")
        .map(str::to_string)
        .collect()
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let default_level = env_string("LOG_LEVEL", "info");
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if env_string("LOG_FORMAT", "json") == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn config_from_env() -> ApiConfig {
    let defaults = ApiConfig::default();
    ApiConfig {
        host: env_string("HOST", &defaults.host),
        port: env_u64("PORT", u64::from(defaults.port)) as u16,
        api_prefix: env_string("API_PREFIX", &defaults.api_prefix),
        app_name: env_string("APP_NAME", &defaults.app_name),
        app_version: env_string("APP_VERSION", &defaults.app_version),
        debug: env_bool("DEBUG", defaults.debug),
        cors_allowed_origins: env_origin_list("CORS_ORIGINS"),
        dataset_staging: env_string("BIGQUERY_DATASET_STAGING", &defaults.dataset_staging),
        dataset_mart: env_string("BIGQUERY_DATASET_MART", &defaults.dataset_mart),
        default_elasticity: env_f64("DEFAULT_ELASTICITY", defaults.default_elasticity),
        max_price_adjustment: env_f64("MAX_PRICE_ADJUSTMENT", defaults.max_price_adjustment),
        similarity_threshold: env_f64("SIMILARITY_THRESHOLD", defaults.similarity_threshold),
        max_comps_per_unit: env_usize("MAX_COMPS_PER_UNIT", defaults.max_comps_per_unit),
        max_concurrent_optimizations: env_usize(
            "MAX_CONCURRENT_OPTIMIZATIONS",
            defaults.max_concurrent_optimizations,
        ),
        cache_ttl: Duration::from_secs(env_u64(
            "CACHE_TTL_SECONDS",
            defaults.cache_ttl.as_secs(),
        )),
        cache_max_entries: env_usize("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
        warehouse_timeout: Duration::from_secs(env_u64(
            "WAREHOUSE_TIMEOUT_SECONDS",
            defaults.warehouse_timeout.as_secs(),
        )),
        warehouse_retry: RetryPolicy {
            max_attempts: env_usize(
                "WAREHOUSE_RETRY_ATTEMPTS",
                defaults.warehouse_retry.max_attempts,
            ),
            base_backoff_ms: env_u64(
                "WAREHOUSE_RETRY_BACKOFF_MS",
                defaults.warehouse_retry.base_backoff_ms,
            ),
        },
        health_probe_timeout: Duration::from_secs(env_u64(
            "HEALTH_PROBE_TIMEOUT_SECONDS",
            defaults.health_probe_timeout.as_secs(),
        )),
        secret_key: env_string("SECRET_KEY", &defaults.secret_key),
        access_token_expire_minutes: env_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            defaults.access_token_expire_minutes,
        ),
        settings_file: PathBuf::from(env_string(
            "SETTINGS_FILE",
            &defaults.settings_file.to_string_lossy(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_reads_name_and_version_from_env() {
        env::set_var("APP_NAME", "rentroll-staging");
        env::set_var("APP_VERSION", "9.9.9-test");
        let config = config_from_env();
        assert_eq!(config.app_name, "rentroll-staging");
        assert_eq!(config.app_version, "9.9.9-test");
        env::remove_var("APP_NAME");
        env::remove_var("APP_VERSION");
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let config = config_from_env();
    validate_startup_config_contract(&config)?;

    let credentials_dir = env::temp_dir();
    credentials::provision(&credentials_dir).map_err(|e| format!("credentials: {e}"))?;

    let settings = SettingsStore::load(&config.settings_file);

    let warehouse: Arc<dyn WarehouseBackend> = Arc::new(BigQueryBackend::new(
        env_string(
            "BIGQUERY_BASE_URL",
            rentroll_server::warehouse::bigquery::DEFAULT_BASE_URL,
        ),
        env::var("BIGQUERY_BEARER_TOKEN").ok(),
        config.warehouse_retry.clone(),
        config.warehouse_timeout,
        config.similarity_threshold,
        config.max_comps_per_unit,
    ));

    info!(
        app = %config.app_name,
        version = %config.app_version,
        prefix = %config.api_prefix,
        mart = %config.dataset_mart,
        "starting"
    );

    match settings.effective() {
        Ok(effective) => {
            let targets = WarehouseTargets::resolve(&effective.tables, &config.dataset_mart)
                .map_err(|e| format!("warehouse targets: {e}"))?;
            if warehouse.test_connection(&targets).await {
                info!(project_id = %targets.project_id, "warehouse reachable");
            } else {
                warn!(project_id = %targets.project_id, "warehouse unreachable at startup");
            }
        }
        Err(e) => warn!(%e, "effective settings invalid at startup"),
    }

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = AppState::with_config(config, settings, warehouse);
    let app = build_router(state);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("rentroll-server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| format!("server failed: {e}"))
}

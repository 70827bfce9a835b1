// SPDX-License-Identifier: Apache-2.0

pub mod layers;

use crate::warehouse::RetryPolicy;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Startup configuration. Everything here resolves env-over-default once at
/// boot; the warehouse table coordinates additionally honor the runtime
/// settings layer (see [`layers`]).
#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub cors_allowed_origins: Vec<String>,
    pub dataset_staging: String,
    pub dataset_mart: String,
    pub default_elasticity: f64,
    pub max_price_adjustment: f64,
    pub similarity_threshold: f64,
    pub max_comps_per_unit: usize,
    pub max_concurrent_optimizations: usize,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub warehouse_timeout: Duration,
    #[serde(skip)]
    pub warehouse_retry: RetryPolicy,
    pub health_probe_timeout: Duration,
    #[serde(skip)]
    pub secret_key: String,
    pub access_token_expire_minutes: u64,
    pub settings_file: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_prefix: "/api/v1".to_string(),
            app_name: "RentRoll Optimizer".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            debug: false,
            cors_allowed_origins: Vec::new(),
            dataset_staging: "staging".to_string(),
            dataset_mart: "mart".to_string(),
            default_elasticity: rentroll_pricing::DEFAULT_ELASTICITY,
            max_price_adjustment: rentroll_pricing::DEFAULT_MAX_ADJUSTMENT,
            similarity_threshold: 50.0,
            max_comps_per_unit: 10,
            max_concurrent_optimizations: 100,
            cache_ttl: Duration::from_secs(3600),
            cache_max_entries: 256,
            warehouse_timeout: Duration::from_secs(15),
            warehouse_retry: RetryPolicy::default(),
            health_probe_timeout: Duration::from_secs(10),
            secret_key: "dev-secret-change-me".to_string(),
            access_token_expire_minutes: 30,
            settings_file: PathBuf::from("app_settings.json"),
        }
    }
}

fn valid_dataset_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.port == 0 {
        return Err("port must be > 0".to_string());
    }
    if !api.api_prefix.starts_with('/') || api.api_prefix.ends_with('/') {
        return Err("api_prefix must start with '/' and not end with '/'".to_string());
    }
    if !valid_dataset_name(&api.dataset_staging) || !valid_dataset_name(&api.dataset_mart) {
        return Err("dataset names must match [A-Za-z0-9_]+".to_string());
    }
    if !api.default_elasticity.is_finite() || api.default_elasticity == 0.0 {
        return Err("default_elasticity must be finite and non-zero".to_string());
    }
    if !(api.max_price_adjustment > 0.0 && api.max_price_adjustment <= 1.0) {
        return Err("max_price_adjustment must be in (0, 1]".to_string());
    }
    if api.similarity_threshold < 0.0 {
        return Err("similarity_threshold must be >= 0".to_string());
    }
    if api.max_comps_per_unit == 0 || api.max_concurrent_optimizations == 0 {
        return Err("comp and concurrency limits must be > 0".to_string());
    }
    if api.cache_ttl.is_zero() || api.cache_max_entries == 0 {
        return Err("cache ttl and capacity must be > 0".to_string());
    }
    if api.warehouse_timeout.is_zero() || api.health_probe_timeout.is_zero() {
        return Err("timeouts must be > 0".to_string());
    }
    if api.warehouse_retry.max_attempts == 0 {
        return Err("warehouse retry attempts must be > 0".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_contract() {
        validate_startup_config_contract(&ApiConfig::default()).expect("valid defaults");
    }

    #[test]
    fn rejects_malformed_prefix() {
        let api = ApiConfig {
            api_prefix: "api/v1/".to_string(),
            ..ApiConfig::default()
        };
        let err = validate_startup_config_contract(&api).expect_err("invalid prefix");
        assert!(err.contains("api_prefix"));
    }

    #[test]
    fn rejects_degenerate_limits() {
        let api = ApiConfig {
            max_price_adjustment: 0.0,
            ..ApiConfig::default()
        };
        assert!(validate_startup_config_contract(&api).is_err());

        let api = ApiConfig {
            max_concurrent_optimizations: 0,
            ..ApiConfig::default()
        };
        assert!(validate_startup_config_contract(&api).is_err());

        let api = ApiConfig {
            dataset_mart: "mart;drop".to_string(),
            ..ApiConfig::default()
        };
        assert!(validate_startup_config_contract(&api).is_err());
    }
}

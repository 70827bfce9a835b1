// SPDX-License-Identifier: Apache-2.0

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rentroll_api::{
    parse_list_units_params, ApiError, BatchOptimizeRequestDto, BatchOptimizeResponseDto,
    CompSummaryDto, ComparablesResponseDto, ConnectionTestResponseDto, HealthDto,
    ListUnitsParams, MarketPositionResponseDto, OptimizationResultDto, OptimizeRequestDto,
    OptimizeResponseDto, PortfolioAnalyticsResponseDto, PricingOpportunitiesResponseDto,
    PropertiesResponseDto, SaveSettingsResponseDto, SettingsResponseDto, SettingsUpdateDto,
    SummaryResponseDto, TableTestResultDto, UnitsListResponseDto,
};
use rentroll_model::{TableRef, TableSettings, UnitSnapshot};
use rentroll_pricing::{OptimizationOutcome, PricingError, PricingOptimizer, PricingParams};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::layers::SettingsPatch;
use crate::warehouse::{WarehouseError, WarehouseTargets};
use crate::AppState;

pub(crate) fn api_error_response(status: StatusCode, err: ApiError) -> Response {
    (status, Json(json!({"error": err}))).into_response()
}

fn warehouse_error_response(err: &WarehouseError) -> Response {
    warn!(%err, "warehouse unavailable");
    api_error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        ApiError::warehouse_unavailable(&err.to_string()),
    )
}

fn internal_error_response(debug: bool, detail: &str) -> Response {
    error!(detail, "internal error");
    let err = if debug {
        ApiError::new(
            rentroll_api::ApiErrorCode::Internal,
            "internal error",
            json!({"detail": detail}),
        )
    } else {
        ApiError::internal()
    };
    api_error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
}

fn pricing_error_response(err: &PricingError) -> Response {
    api_error_response(StatusCode::BAD_REQUEST, ApiError::invalid_body(&err.to_string()))
}

pub(crate) fn if_none_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get("if-none-match")
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string)
}

pub(crate) fn put_cache_headers(headers: &mut HeaderMap, ttl: Duration, etag: &str) {
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", ttl.as_secs())) {
        headers.insert("cache-control", value);
    }
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert("etag", value);
    }
}

/// Effective settings resolved per request, so a settings change applies to
/// the next query without a restart.
fn resolve_targets(state: &AppState) -> Result<WarehouseTargets, Response> {
    let effective = state
        .settings
        .effective()
        .map_err(|e| internal_error_response(state.config.debug, &e.to_string()))?;
    WarehouseTargets::resolve(&effective.tables, &state.config.dataset_mart)
        .map_err(|e| internal_error_response(state.config.debug, &e.to_string()))
}

fn optimizer_for(
    state: &AppState,
    custom_elasticity: Option<f64>,
) -> Result<PricingOptimizer, PricingError> {
    PricingOptimizer::new(PricingParams {
        elasticity: custom_elasticity.unwrap_or(state.config.default_elasticity),
        max_adjustment: state.config.max_price_adjustment,
    })
}

fn outcome_to_dto(outcome: OptimizationOutcome) -> OptimizationResultDto {
    OptimizationResultDto {
        unit_id: outcome.unit_id,
        current_rent: outcome.current_rent,
        suggested_rent: outcome.suggested_rent,
        rent_change: outcome.rent_change,
        rent_change_pct: outcome.rent_change_pct,
        confidence: outcome.demand_probability,
        strategy_used: outcome.strategy_used,
        demand_probability: outcome.demand_probability,
        expected_days_to_lease: outcome.expected_days_to_lease,
        revenue_impact_annual: outcome.revenue_impact_annual,
        comp_data: outcome.comp_summary.map(|c| CompSummaryDto {
            total_comps: c.total_comps,
            avg_comp_price: c.avg_comp_price,
            median_comp_price: c.median_comp_price,
            min_comp_price: c.min_comp_price,
            max_comp_price: c.max_comp_price,
            avg_similarity_score: c.avg_similarity_score,
        }),
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Response {
    let connected = match resolve_targets(&state) {
        Ok(targets) => tokio::time::timeout(
            state.config.health_probe_timeout,
            state.warehouse.test_connection(&targets),
        )
        .await
        .unwrap_or(false),
        Err(_) => false,
    };

    let mut services = BTreeMap::new();
    services.insert("api".to_string(), "ok".to_string());
    services.insert(
        "warehouse".to_string(),
        if connected { "connected" } else { "unreachable" }.to_string(),
    );

    let dto = HealthDto {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: state.config.app_version.clone(),
        warehouse_connected: connected,
        services,
    };
    // A degraded warehouse is reported in the body, never as a non-2xx:
    // the container probe must not restart-loop on warehouse outages.
    (StatusCode::OK, Json(dto)).into_response()
}

/// Cache key carrying the resolved table plus every query dimension, so
/// distinct filters and pages never alias.
fn units_cache_key(targets: &WarehouseTargets, params: &ListUnitsParams) -> String {
    format!(
        "units:{}:p{}:s{}:{}:{}:{}",
        targets.unit_snapshot.as_str(),
        params.page,
        params.page_size,
        params.filter.status.map_or("any", |s| s.as_str()),
        params.filter.property.as_deref().unwrap_or(""),
        params.filter.needs_pricing_only,
    )
}

pub(crate) async fn list_units(
    State(state): State<AppState>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let params = match parse_list_units_params(&query) {
        Ok(params) => params,
        Err(err) => return api_error_response(StatusCode::BAD_REQUEST, err),
    };
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let key = units_cache_key(&targets, &params);
    if let Some(entry) = state.response_cache.lock().await.get(&key) {
        return respond_cached(&state, &headers, entry);
    }
    match state.warehouse.fetch_units(&targets, &params).await {
        Ok(page) => {
            let has_next = params.offset() + (page.units.len() as u64) < page.total_count;
            let dto = UnitsListResponseDto {
                units: page.units,
                total_count: page.total_count,
                page: params.page,
                page_size: params.page_size,
                has_next,
            };
            cached_json(&state, &key, &headers, &dto).await
        }
        Err(err) => warehouse_error_response(&err),
    }
}

async fn load_unit(
    state: &AppState,
    targets: &WarehouseTargets,
    unit_id: &str,
) -> Result<UnitSnapshot, Response> {
    match state.warehouse.fetch_unit(targets, unit_id).await {
        Ok(Some(unit)) => Ok(unit),
        Ok(None) => Err(api_error_response(
            StatusCode::NOT_FOUND,
            ApiError::unit_not_found(unit_id),
        )),
        Err(err) => Err(warehouse_error_response(&err)),
    }
}

pub(crate) async fn comparables(
    State(state): State<AppState>,
    Path(unit_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let key = format!(
        "comparables:{}:{unit_id}",
        targets.unit_competitor_pairs.as_str()
    );
    if let Some(entry) = state.response_cache.lock().await.get(&key) {
        return respond_cached(&state, &headers, entry);
    }
    let unit = match load_unit(&state, &targets, &unit_id).await {
        Ok(unit) => unit,
        Err(resp) => return resp,
    };
    match state.warehouse.fetch_comparables(&targets, &unit_id).await {
        Ok(fetch) => {
            // Units without comps report zeroed stats rather than erroring.
            let dto = match fetch.stats {
                Some(stats) => ComparablesResponseDto {
                    unit_id,
                    unit,
                    comparables: fetch.comparables,
                    total_comps: stats.total_comps,
                    avg_comp_price: stats.avg_comp_price,
                    median_comp_price: stats.median_comp_price,
                    min_comp_price: stats.min_comp_price,
                    max_comp_price: stats.max_comp_price,
                    comp_price_stddev: stats.comp_price_stddev,
                },
                None => ComparablesResponseDto {
                    unit_id,
                    unit,
                    comparables: Vec::new(),
                    total_comps: 0,
                    avg_comp_price: 0.0,
                    median_comp_price: 0.0,
                    min_comp_price: 0.0,
                    max_comp_price: 0.0,
                    comp_price_stddev: None,
                },
            };
            cached_json(&state, &key, &headers, &dto).await
        }
        Err(err) => warehouse_error_response(&err),
    }
}

pub(crate) async fn optimize_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<String>,
    body: Bytes,
) -> Response {
    // An absent body keeps the balanced defaults; malformed JSON is a 400,
    // not a silent fallback.
    let req: OptimizeRequestDto = if body.is_empty() {
        OptimizeRequestDto::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(err) => {
                return api_error_response(
                    StatusCode::BAD_REQUEST,
                    ApiError::invalid_body(&err.to_string()),
                )
            }
        }
    };
    let optimizer = match optimizer_for(&state, req.custom_elasticity) {
        Ok(optimizer) => optimizer,
        Err(err) => return pricing_error_response(&err),
    };
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let unit = match load_unit(&state, &targets, &unit_id).await {
        Ok(unit) => unit,
        Err(resp) => return resp,
    };
    let comps = match state.warehouse.fetch_comparables(&targets, &unit_id).await {
        Ok(fetch) => fetch.comparables,
        Err(err) => return warehouse_error_response(&err),
    };
    match optimizer.optimize_unit(&unit, &comps, req.strategy, req.weight) {
        Ok(outcome) => Json(OptimizeResponseDto {
            unit_id,
            optimization: outcome_to_dto(outcome),
        })
        .into_response(),
        Err(err) => pricing_error_response(&err),
    }
}

pub(crate) async fn batch_optimize(
    State(state): State<AppState>,
    Json(req): Json<BatchOptimizeRequestDto>,
) -> Response {
    // Fail fast on inputs that would fail for every unit.
    let optimizer = match optimizer_for(&state, req.custom_elasticity) {
        Ok(optimizer) => optimizer,
        Err(err) => return pricing_error_response(&err),
    };
    if let Some(weight) = req.weight {
        if !(0.0..=1.0).contains(&weight) {
            return pricing_error_response(&PricingError::InvalidWeight(weight));
        }
    }
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let max_units = req.max_units.max(1) as usize;

    let mut units: Vec<UnitSnapshot> = Vec::new();
    let mut failed: u64 = 0;
    match &req.unit_ids {
        Some(ids) => {
            for unit_id in ids.iter().take(max_units) {
                match state.warehouse.fetch_unit(&targets, unit_id).await {
                    Ok(Some(unit)) => units.push(unit),
                    Ok(None) => {
                        warn!(%unit_id, "batch skipped unknown unit");
                        failed += 1;
                    }
                    Err(err) => return warehouse_error_response(&err),
                }
            }
        }
        None => match state.warehouse.fetch_vacant_units(&targets, max_units).await {
            Ok(fetched) => units = fetched,
            Err(err) => return warehouse_error_response(&err),
        },
    }
    let total = units.len() as u64 + failed;

    let optimizer = Arc::new(optimizer);
    let mut tasks = JoinSet::new();
    for unit in units {
        let state = state.clone();
        let targets = targets.clone();
        let optimizer = Arc::clone(&optimizer);
        let strategy = req.strategy;
        let weight = req.weight;
        tasks.spawn(async move {
            let _permit = state.optimize_slots.acquire().await.ok();
            let comps = state
                .warehouse
                .fetch_comparables(&targets, &unit.unit_id)
                .await
                .map(|fetch| fetch.comparables)
                .map_err(|e| e.to_string())?;
            optimizer
                .optimize_unit(&unit, &comps, strategy, weight)
                .map_err(|e| e.to_string())
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(outcome)) => results.push(outcome_to_dto(outcome)),
            Ok(Err(err)) => {
                warn!(%err, "batch unit optimization failed");
                failed += 1;
            }
            Err(err) => {
                warn!(%err, "batch task panicked");
                failed += 1;
            }
        }
    }
    results.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

    info!(
        total,
        succeeded = results.len(),
        failed,
        "batch optimization finished"
    );
    Json(BatchOptimizeResponseDto {
        total_units_processed: total,
        successful_optimizations: results.len() as u64,
        failed_optimizations: failed,
        results,
    })
    .into_response()
}

/// Cache `body` under `key` and respond with ETag and cache-control headers,
/// honoring `If-None-Match`.
async fn cache_and_respond(
    state: &AppState,
    key: &str,
    headers: &HeaderMap,
    body: Vec<u8>,
) -> Response {
    let entry = state.response_cache.lock().await.insert(key.to_string(), body);
    respond_cached(state, headers, entry)
}

/// Serialize, cache under `key`, and respond; the serialization failure path
/// is a 500 rather than a panic.
async fn cached_json<T: serde::Serialize>(
    state: &AppState,
    key: &str,
    headers: &HeaderMap,
    dto: &T,
) -> Response {
    match serde_json::to_vec(dto) {
        Ok(body) => cache_and_respond(state, key, headers, body).await,
        Err(err) => internal_error_response(state.config.debug, &err.to_string()),
    }
}

fn respond_cached(
    state: &AppState,
    headers: &HeaderMap,
    entry: crate::cache::CachedResponse,
) -> Response {
    if if_none_match(headers).as_deref() == Some(entry.etag.as_str()) {
        return StatusCode::NOT_MODIFIED.into_response();
    }
    let mut response_headers = HeaderMap::new();
    put_cache_headers(&mut response_headers, state.config.cache_ttl, &entry.etag);
    response_headers.insert(
        "content-type",
        HeaderValue::from_static("application/json"),
    );
    (StatusCode::OK, response_headers, entry.body).into_response()
}

pub(crate) async fn summary(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let key = format!("summary:{}", targets.unit_snapshot.as_str());
    if let Some(entry) = state.response_cache.lock().await.get(&key) {
        return respond_cached(&state, &headers, entry);
    }

    let unit_types = match state.warehouse.unit_type_summary(&targets).await {
        Ok(rows) => rows,
        Err(err) => return warehouse_error_response(&err),
    };
    let properties = match state.warehouse.properties(&targets).await {
        Ok(names) => names,
        Err(err) => return warehouse_error_response(&err),
    };
    let dto = SummaryResponseDto {
        unit_types,
        total_properties: properties.len() as u64,
    };
    cached_json(&state, &key, &headers, &dto).await
}

pub(crate) async fn properties(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let key = format!("properties:{}", targets.unit_snapshot.as_str());
    if let Some(entry) = state.response_cache.lock().await.get(&key) {
        return respond_cached(&state, &headers, entry);
    }

    let names = match state.warehouse.properties(&targets).await {
        Ok(names) => names,
        Err(err) => return warehouse_error_response(&err),
    };
    let dto = PropertiesResponseDto { properties: names };
    cached_json(&state, &key, &headers, &dto).await
}

pub(crate) async fn analytics_portfolio(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let key = format!("analytics:portfolio:{}", targets.unit_snapshot.as_str());
    if let Some(entry) = state.response_cache.lock().await.get(&key) {
        return respond_cached(&state, &headers, entry);
    }
    match state.warehouse.portfolio_analytics(&targets).await {
        Ok(analytics) => {
            let dto = PortfolioAnalyticsResponseDto {
                portfolio: analytics.portfolio,
                urgency_breakdown: analytics.urgency_breakdown,
                property_performance: analytics.property_performance,
            };
            cached_json(&state, &key, &headers, &dto).await
        }
        Err(err) => warehouse_error_response(&err),
    }
}

pub(crate) async fn analytics_market_position(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let key = format!(
        "analytics:market-position:{}",
        targets.unit_competitor_pairs.as_str()
    );
    if let Some(entry) = state.response_cache.lock().await.get(&key) {
        return respond_cached(&state, &headers, entry);
    }
    match state.warehouse.market_position(&targets).await {
        Ok(analytics) => {
            let dto = MarketPositionResponseDto {
                market_summary: analytics.market_summary,
                unit_type_comparison: analytics.unit_type_comparison,
            };
            cached_json(&state, &key, &headers, &dto).await
        }
        Err(err) => warehouse_error_response(&err),
    }
}

pub(crate) async fn analytics_pricing_opportunities(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let targets = match resolve_targets(&state) {
        Ok(targets) => targets,
        Err(resp) => return resp,
    };
    let key = format!(
        "analytics:pricing-opportunities:{}",
        targets.unit_competitor_pairs.as_str()
    );
    if let Some(entry) = state.response_cache.lock().await.get(&key) {
        return respond_cached(&state, &headers, entry);
    }
    match state.warehouse.pricing_opportunities(&targets).await {
        Ok(analytics) => {
            let dto = PricingOpportunitiesResponseDto {
                summary: analytics.summary,
                top_opportunities: analytics.top_opportunities,
            };
            cached_json(&state, &key, &headers, &dto).await
        }
        Err(err) => warehouse_error_response(&err),
    }
}

fn settings_dto(tables: &TableSettings, sources: BTreeMap<String, String>) -> SettingsResponseDto {
    SettingsResponseDto {
        project_id: tables.project_id.clone(),
        rentroll_table: tables.rentroll_table.as_str().to_string(),
        competition_table: tables.competition_table.as_str().to_string(),
        sources,
    }
}

pub(crate) async fn settings_get(State(state): State<AppState>) -> Response {
    match state.settings.effective() {
        Ok(effective) => Json(settings_dto(&effective.tables, effective.sources)).into_response(),
        Err(err) => internal_error_response(state.config.debug, &err.to_string()),
    }
}

pub(crate) async fn settings_post(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdateDto>,
) -> Response {
    let patch = SettingsPatch {
        project_id: update.project_id,
        rentroll_table: update.rentroll_table,
        competition_table: update.competition_table,
    };
    match state.settings.apply(&patch) {
        Ok(effective) => {
            info!(
                project_id = %effective.tables.project_id,
                "runtime settings updated"
            );
            Json(SaveSettingsResponseDto {
                message: "settings saved".to_string(),
                settings: settings_dto(&effective.tables, effective.sources),
            })
            .into_response()
        }
        Err(crate::config::layers::SettingsError::Invalid(err)) => api_error_response(
            StatusCode::BAD_REQUEST,
            ApiError::settings_rejected(&err.to_string()),
        ),
        Err(err) => internal_error_response(state.config.debug, &err.to_string()),
    }
}

async fn probe(state: &AppState, targets: &WarehouseTargets, table: &TableRef) -> TableTestResultDto {
    match state.warehouse.probe_table(targets, table).await {
        Ok(row_count) => TableTestResultDto {
            success: true,
            row_count: Some(row_count),
            error: None,
        },
        Err(err) => TableTestResultDto {
            success: false,
            row_count: None,
            error: Some(err.to_string()),
        },
    }
}

/// Probe connectivity for a candidate settings payload without saving it.
pub(crate) async fn settings_test(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdateDto>,
) -> Response {
    let current = match state.settings.effective() {
        Ok(effective) => effective.tables,
        Err(err) => return internal_error_response(state.config.debug, &err.to_string()),
    };
    let candidate = TableSettings::new(
        update.project_id.as_deref().unwrap_or(&current.project_id),
        update
            .rentroll_table
            .as_deref()
            .unwrap_or(current.rentroll_table.as_str()),
        update
            .competition_table
            .as_deref()
            .unwrap_or(current.competition_table.as_str()),
    );
    let candidate = match candidate {
        Ok(candidate) => candidate,
        Err(err) => {
            return api_error_response(
                StatusCode::BAD_REQUEST,
                ApiError::settings_rejected(&err.to_string()),
            )
        }
    };
    let targets = match WarehouseTargets::resolve(&candidate, &state.config.dataset_mart) {
        Ok(targets) => targets,
        Err(err) => {
            return api_error_response(
                StatusCode::BAD_REQUEST,
                ApiError::settings_rejected(&err.to_string()),
            )
        }
    };

    let dto = ConnectionTestResponseDto {
        rentroll_table: probe(&state, &targets, &targets.rentroll).await,
        competition_table: probe(&state, &targets, &targets.competition).await,
    };
    Json(dto).into_response()
}

// SPDX-License-Identifier: Apache-2.0

mod support;

use serde_json::{json, Value};
use support::{comp, spawn_app, unit};

#[tokio::test]
async fn units_list_paginates_and_validates_params() {
    let app = spawn_app(&[]).await;
    app.warehouse
        .seed_units(vec![
            unit("U-1", 2000.0, true),
            unit("U-2", 2100.0, true),
            unit("U-3", 1900.0, false),
        ])
        .await;

    let body: Value = app
        .client
        .get(app.api("/units?page_size=2"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["units"].as_array().expect("units").len(), 2);
    assert_eq!(body["has_next"], true);

    let body: Value = app
        .client
        .get(app.api("/units?page_size=2&page=2"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["units"].as_array().expect("units").len(), 1);
    assert_eq!(body["has_next"], false);

    let resp = app
        .client
        .get(app.api("/units?page=0"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["error"]["code"], "InvalidQueryParameter");
}

#[tokio::test]
async fn units_list_replays_from_cache_per_query() {
    let app = spawn_app(&[]).await;
    app.warehouse.seed_units(vec![unit("U-1", 2000.0, true)]).await;

    let resp = app
        .client
        .get(app.api("/units?page_size=1"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let etag = resp
        .headers()
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .expect("etag")
        .to_string();
    let calls_after_miss = app.warehouse.query_calls();

    // Same query replays from cache without touching the warehouse.
    let resp = app
        .client
        .get(app.api("/units?page_size=1"))
        .header("if-none-match", &etag)
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 304);
    assert_eq!(app.warehouse.query_calls(), calls_after_miss);

    // A different page size is a different cache entry.
    let resp = app
        .client
        .get(app.api("/units?page_size=2"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    assert!(app.warehouse.query_calls() > calls_after_miss);
}

#[tokio::test]
async fn comparables_returns_stats_and_404s_unknown_units() {
    let app = spawn_app(&[]).await;
    app.warehouse.seed_units(vec![unit("U-1", 2000.0, true)]).await;
    app.warehouse
        .seed_comps(
            "U-1",
            vec![comp("C-1", 1900.0, 1), comp("C-2", 2100.0, 2)],
        )
        .await;

    let body: Value = app
        .client
        .get(app.api("/units/U-1/comparables"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["unit_id"], "U-1");
    assert_eq!(body["total_comps"], 2);
    assert_eq!(body["median_comp_price"], 2000.0);
    assert_eq!(body["comparables"].as_array().expect("comps").len(), 2);

    let resp = app
        .client
        .get(app.api("/units/U-404/comparables"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["error"]["code"], "UnitNotFound");
    assert_eq!(body["error"]["details"]["unit_id"], "U-404");
}

#[tokio::test]
async fn revenue_optimization_suggests_upper_bound_for_inelastic_demand() {
    let app = spawn_app(&[]).await;
    app.warehouse.seed_units(vec![unit("U-1", 2000.0, true)]).await;
    app.warehouse
        .seed_comps(
            "U-1",
            vec![
                comp("C-1", 1950.0, 1),
                comp("C-2", 2000.0, 2),
                comp("C-3", 2050.0, 3),
            ],
        )
        .await;

    let resp = app
        .client
        .post(app.api("/units/U-1/optimize"))
        .json(&json!({"strategy": "revenue"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");

    let opt = &body["optimization"];
    // Default elasticity is shallow, so revenue peaks at the rent*1.3 /
    // base*1.25 cap: min(2500, 2600) = 2500.
    assert_eq!(opt["suggested_rent"], 2500.0);
    assert_eq!(opt["rent_change"], 500.0);
    assert_eq!(opt["rent_change_pct"], 25.0);
    assert_eq!(opt["strategy_used"], "revenue");
    let prob = opt["demand_probability"].as_f64().expect("probability");
    assert!((prob - 0.925).abs() < 1e-6);
    assert_eq!(opt["comp_data"]["total_comps"], 3);
    assert_eq!(opt["comp_data"]["median_comp_price"], 2000.0);
}

#[tokio::test]
async fn optimize_without_comps_passes_rent_through() {
    let app = spawn_app(&[]).await;
    app.warehouse.seed_units(vec![unit("U-2", 1800.0, true)]).await;

    let resp = app
        .client
        .post(app.api("/units/U-2/optimize"))
        .json(&json!({}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");

    let opt = &body["optimization"];
    assert_eq!(opt["suggested_rent"], 1800.0);
    assert_eq!(opt["rent_change"], 0.0);
    assert!(opt["demand_probability"].is_null());
    assert!(opt["expected_days_to_lease"].is_null());
    assert!(opt["comp_data"].is_null());
}

#[tokio::test]
async fn optimize_accepts_empty_body_but_rejects_malformed_json() {
    let app = spawn_app(&[]).await;
    app.warehouse.seed_units(vec![unit("U-1", 2000.0, true)]).await;

    let resp = app
        .client
        .post(app.api("/units/U-1/optimize"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["optimization"]["strategy_used"], "balanced");

    let resp = app
        .client
        .post(app.api("/units/U-1/optimize"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["error"]["code"], "InvalidRequestBody");
}

#[tokio::test]
async fn optimize_rejects_bad_weight_and_elasticity() {
    let app = spawn_app(&[]).await;
    app.warehouse.seed_units(vec![unit("U-1", 2000.0, true)]).await;

    let resp = app
        .client
        .post(app.api("/units/U-1/optimize"))
        .json(&json!({"strategy": "balanced", "weight": 1.5}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["error"]["code"], "InvalidRequestBody");

    let resp = app
        .client
        .post(app.api("/units/U-1/optimize"))
        .json(&json!({"custom_elasticity": 0.0}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn batch_counts_per_unit_failures_without_aborting() {
    let app = spawn_app(&[]).await;
    app.warehouse
        .seed_units(vec![unit("U-1", 2000.0, true), unit("U-2", 1800.0, true)])
        .await;
    app.warehouse
        .seed_comps("U-1", vec![comp("C-1", 2000.0, 1)])
        .await;

    let resp = app
        .client
        .post(app.api("/batch/optimize"))
        .json(&json!({"unit_ids": ["U-1", "U-2", "U-404"]}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");

    assert_eq!(body["total_units_processed"], 3);
    assert_eq!(body["successful_optimizations"], 2);
    assert_eq!(body["failed_optimizations"], 1);
    let results = body["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["unit_id"], "U-1");
    assert_eq!(results[1]["unit_id"], "U-2");
}

#[tokio::test]
async fn batch_selects_vacant_units_when_no_ids_given() {
    let app = spawn_app(&[]).await;
    app.warehouse
        .seed_units(vec![
            unit("U-1", 2000.0, true),
            unit("U-2", 1800.0, true),
            unit("U-3", 1500.0, false),
        ])
        .await;

    let body: Value = app
        .client
        .post(app.api("/batch/optimize"))
        .json(&json!({"strategy": "lease_up", "max_units": 10}))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");

    // U-3 is not flagged for pricing and must be skipped.
    assert_eq!(body["total_units_processed"], 2);
    assert_eq!(body["successful_optimizations"], 2);
}

#[tokio::test]
async fn summary_carries_etag_and_serves_304() {
    let app = spawn_app(&[]).await;
    app.warehouse
        .seed_units(vec![unit("U-1", 2000.0, true), unit("U-2", 2100.0, false)])
        .await;

    let resp = app
        .client
        .get(app.api("/summary"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let etag = resp
        .headers()
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .expect("etag")
        .to_string();
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["total_properties"], 1);
    assert_eq!(body["unit_types"][0]["unit_type"], "2BR");
    assert_eq!(body["unit_types"][0]["total_units"], 2);
    assert_eq!(body["unit_types"][0]["units_needing_pricing"], 1);

    let resp = app
        .client
        .get(app.api("/summary"))
        .header("if-none-match", etag)
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 304);
}

#[tokio::test]
async fn warehouse_outage_maps_to_503_envelope() {
    let app = spawn_app(&[]).await;
    app.warehouse.set_failing(true);

    let resp = app
        .client
        .get(app.api("/units"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["error"]["code"], "WarehouseUnavailable");
}

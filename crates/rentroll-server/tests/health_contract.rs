// SPDX-License-Identifier: Apache-2.0

mod support;

use serde_json::Value;
use support::spawn_app;

#[tokio::test]
async fn health_reports_healthy_when_warehouse_answers() {
    let app = spawn_app(&[]).await;

    let resp = app
        .client
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["warehouse_connected"], true);
    assert_eq!(body["services"]["api"], "ok");
    assert_eq!(body["services"]["warehouse"], "connected");
    assert!(body["version"].as_str().is_some_and(|v| !v.is_empty()));
}

#[tokio::test]
async fn health_degrades_without_failing_when_warehouse_is_down() {
    let app = spawn_app(&[]).await;
    app.warehouse.set_failing(true);

    let resp = app
        .client
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .expect("request");
    // Warehouse outages must not flip the probe to non-2xx.
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["warehouse_connected"], false);
    assert_eq!(body["services"]["warehouse"], "unreachable");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = spawn_app(&[]).await;
    let resp = app
        .client
        .get(app.api("/nope"))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 404);
}

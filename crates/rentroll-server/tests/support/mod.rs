// SPDX-License-Identifier: Apache-2.0

use rentroll_model::{Comparable, PricingUrgency, UnitSnapshot, UnitStatus};
use rentroll_server::config::layers::SettingsStore;
use rentroll_server::config::ApiConfig;
use rentroll_server::{build_router, AppState, FakeWarehouse};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestApp {
    pub base_url: String,
    pub warehouse: Arc<FakeWarehouse>,
    pub settings_path: PathBuf,
    pub client: reqwest::Client,
    _dir: TempDir,
}

impl TestApp {
    pub fn api(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }
}

pub async fn spawn_app(env_pairs: &[(&str, &str)]) -> TestApp {
    spawn_app_with_config(ApiConfig::default(), env_pairs).await
}

pub async fn spawn_app_with_config(mut config: ApiConfig, env_pairs: &[(&str, &str)]) -> TestApp {
    let dir = TempDir::new().expect("tempdir");
    let settings_path = dir.path().join("app_settings.json");
    config.settings_file = settings_path.clone();

    let pairs: BTreeMap<String, String> = env_pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let settings = SettingsStore::with_env_pairs(&settings_path, pairs);

    let warehouse = Arc::new(FakeWarehouse::new());
    let state = AppState::with_config(
        config,
        settings,
        Arc::clone(&warehouse) as Arc<dyn rentroll_server::warehouse::WarehouseBackend>,
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });

    TestApp {
        base_url: format!("http://{addr}"),
        warehouse,
        settings_path,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

pub fn unit(id: &str, rent: f64, needs_pricing: bool) -> UnitSnapshot {
    UnitSnapshot {
        unit_id: id.to_string(),
        property: "Maple Court".to_string(),
        bed: 2,
        bath: 2.0,
        sqft: 1000.0,
        status: UnitStatus::Vacant,
        advertised_rent: rent,
        market_rent: None,
        rent_per_sqft: Some(rent / 1000.0),
        move_out_date: None,
        lease_end_date: None,
        days_to_lease_end: None,
        needs_pricing,
        rent_premium_pct: None,
        pricing_urgency: PricingUrgency::High,
        unit_type: "2BR".to_string(),
        size_category: None,
        annual_revenue_potential: Some(rent * 12.0),
        has_complete_data: true,
    }
}

pub fn comp(id: &str, price: f64, rank: u32) -> Comparable {
    Comparable {
        comp_id: id.to_string(),
        comp_property: "Rival Row".to_string(),
        bed: 2,
        bath: 2.0,
        comp_sqft: 980.0,
        comp_price: price,
        is_available: true,
        sqft_delta_pct: -2.0,
        price_gap_pct: 1.5,
        similarity_score: 82.0,
        comp_rank: rank,
    }
}

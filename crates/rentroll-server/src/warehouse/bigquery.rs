// SPDX-License-Identifier: Apache-2.0

//! BigQuery-shaped REST backend: SQL posted to the `jobs.query` endpoint,
//! cell values decoded from the field/value row encoding. The base URL is
//! overridable so tests can stand in a local stub.

use async_trait::async_trait;
use rentroll_api::ListUnitsParams;
use rentroll_model::{
    Comparable, MarketPosition, MarketPositionBucket, OpportunitySummary, PortfolioMetrics,
    PricingUrgency, PropertyPerformance, RentOpportunity, TableRef, UnitSnapshot, UnitStatus,
    UnitTypePosition, UnitTypeSummary, UrgencyCount,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    sql, CompPriceStats, ComparablesFetch, MarketPositionAnalytics, PortfolioAnalytics,
    PricingOpportunities, RetryPolicy, UnitPage, WarehouseBackend, WarehouseError,
    WarehouseTargets,
};

pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

const TOP_OPPORTUNITIES_LIMIT: usize = 20;

pub struct BigQueryBackend {
    base_url: String,
    auth_bearer: Option<String>,
    retry: RetryPolicy,
    timeout: Duration,
    similarity_threshold: f64,
    max_comps_per_unit: usize,
}

impl BigQueryBackend {
    #[must_use]
    pub fn new(
        base_url: String,
        auth_bearer: Option<String>,
        retry: RetryPolicy,
        timeout: Duration,
        similarity_threshold: f64,
        max_comps_per_unit: usize,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_bearer,
            retry,
            timeout,
            similarity_threshold,
            max_comps_per_unit,
        }
    }

    fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }

    fn auth_headers(&self) -> Result<HeaderMap, WarehouseError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| WarehouseError::Transport(format!("invalid bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn run_query(
        &self,
        project: &str,
        query: &str,
    ) -> Result<Vec<BTreeMap<String, Value>>, WarehouseError> {
        let url = format!("{}/projects/{project}/queries", self.base_url);
        let body = serde_json::json!({
            "query": query,
            "useLegacySql": false,
            "timeoutMs": self.timeout.as_millis() as u64,
        });
        let client = self.client();

        let mut last_err = WarehouseError::Transport("no attempt made".to_string());
        for attempt in 1..=self.retry.max_attempts {
            let result = client
                .post(&url)
                .headers(self.auth_headers()?)
                .json(&body)
                .send()
                .await;
            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: QueryResponse = resp.json().await.map_err(|e| {
                            WarehouseError::Decode(format!("response parse failed: {e}"))
                        })?;
                        debug!(project, rows = parsed.rows.as_ref().map_or(0, Vec::len), "query ok");
                        return flatten_rows(&parsed);
                    }
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_server_error() {
                        last_err =
                            WarehouseError::Transport(format!("status {status}: {text}"));
                    } else {
                        // 4xx is not retryable: the query itself is wrong.
                        return Err(WarehouseError::Query(format!("status {status}: {text}")));
                    }
                }
                Err(e) => {
                    last_err = WarehouseError::Transport(e.to_string());
                }
            }
            if attempt < self.retry.max_attempts {
                let backoff = self.retry.base_backoff_ms * attempt as u64;
                warn!(attempt, backoff_ms = backoff, "warehouse query retry");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
        Err(last_err)
    }

    async fn count_query(&self, project: &str, query: &str) -> Result<u64, WarehouseError> {
        let rows = self.run_query(project, query).await?;
        let row = rows
            .first()
            .ok_or_else(|| WarehouseError::Decode("count query returned no rows".to_string()))?;
        row.values()
            .next()
            .and_then(cell_u64)
            .ok_or_else(|| WarehouseError::Decode("count cell is not an integer".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    schema: Option<Schema>,
    rows: Option<Vec<Row>>,
}

#[derive(Debug, Deserialize)]
struct Schema {
    fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct Field {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Row {
    f: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    v: Value,
}

/// Pair up schema field names with the positional `f`/`v` cells.
fn flatten_rows(resp: &QueryResponse) -> Result<Vec<BTreeMap<String, Value>>, WarehouseError> {
    let Some(rows) = &resp.rows else {
        return Ok(Vec::new());
    };
    let schema = resp
        .schema
        .as_ref()
        .ok_or_else(|| WarehouseError::Decode("rows without schema".to_string()))?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row.f.len() != schema.fields.len() {
            return Err(WarehouseError::Decode(format!(
                "row has {} cells, schema has {} fields",
                row.f.len(),
                schema.fields.len()
            )));
        }
        let mut map = BTreeMap::new();
        for (field, cell) in schema.fields.iter().zip(&row.f) {
            map.insert(field.name.clone(), cell.v.clone());
        }
        out.push(map);
    }
    Ok(out)
}

fn cell_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn cell_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn cell_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn cell_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn cell_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "TRUE" => Some(true),
            "false" | "FALSE" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

struct RowView<'a> {
    row: &'a BTreeMap<String, Value>,
}

impl<'a> RowView<'a> {
    fn new(row: &'a BTreeMap<String, Value>) -> Self {
        Self { row }
    }

    fn raw(&self, name: &str) -> Result<&'a Value, WarehouseError> {
        self.row
            .get(name)
            .ok_or_else(|| WarehouseError::Decode(format!("missing column: {name}")))
    }

    fn req_str(&self, name: &str) -> Result<String, WarehouseError> {
        cell_str(self.raw(name)?)
            .ok_or_else(|| WarehouseError::Decode(format!("column {name} is not a string")))
    }

    fn opt_str(&self, name: &str) -> Option<String> {
        self.row.get(name).and_then(cell_str)
    }

    fn req_f64(&self, name: &str) -> Result<f64, WarehouseError> {
        cell_f64(self.raw(name)?)
            .ok_or_else(|| WarehouseError::Decode(format!("column {name} is not numeric")))
    }

    fn opt_f64(&self, name: &str) -> Option<f64> {
        self.row.get(name).and_then(cell_f64)
    }

    fn req_u64(&self, name: &str) -> Result<u64, WarehouseError> {
        cell_u64(self.raw(name)?)
            .ok_or_else(|| WarehouseError::Decode(format!("column {name} is not an integer")))
    }

    fn opt_u64(&self, name: &str) -> Option<u64> {
        self.row.get(name).and_then(cell_u64)
    }

    fn opt_i64(&self, name: &str) -> Option<i64> {
        self.row.get(name).and_then(cell_i64)
    }

    fn req_bool(&self, name: &str) -> Result<bool, WarehouseError> {
        cell_bool(self.raw(name)?)
            .ok_or_else(|| WarehouseError::Decode(format!("column {name} is not a boolean")))
    }

    fn opt_date(&self, name: &str) -> Option<chrono::NaiveDate> {
        self.opt_str(name)
            .and_then(|s| chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
    }
}

fn decode_unit(row: &BTreeMap<String, Value>) -> Result<UnitSnapshot, WarehouseError> {
    let v = RowView::new(row);
    Ok(UnitSnapshot {
        unit_id: v.req_str("unit_id")?,
        property: v.req_str("property")?,
        bed: v.req_u64("bed")? as u32,
        bath: v.req_f64("bath")?,
        sqft: v.req_f64("sqft")?,
        status: UnitStatus::parse(&v.req_str("status")?)
            .map_err(|e| WarehouseError::Decode(e.to_string()))?,
        advertised_rent: v.req_f64("advertised_rent")?,
        market_rent: v.opt_f64("market_rent"),
        rent_per_sqft: v.opt_f64("rent_per_sqft"),
        move_out_date: v.opt_date("move_out_date"),
        lease_end_date: v.opt_date("lease_end_date"),
        days_to_lease_end: v.opt_i64("days_to_lease_end"),
        needs_pricing: v.req_bool("needs_pricing")?,
        rent_premium_pct: v.opt_f64("rent_premium_pct"),
        pricing_urgency: PricingUrgency::parse(&v.req_str("pricing_urgency")?)
            .map_err(|e| WarehouseError::Decode(e.to_string()))?,
        unit_type: v.req_str("unit_type")?,
        size_category: v.opt_str("size_category"),
        annual_revenue_potential: v.opt_f64("annual_revenue_potential"),
        has_complete_data: v.req_bool("has_complete_data")?,
    })
}

fn decode_comparable(row: &BTreeMap<String, Value>) -> Result<Comparable, WarehouseError> {
    let v = RowView::new(row);
    Ok(Comparable {
        comp_id: v.req_str("comp_id")?,
        comp_property: v.req_str("comp_property")?,
        bed: v.req_u64("bed")? as u32,
        bath: v.req_f64("bath")?,
        comp_sqft: v.req_f64("comp_sqft")?,
        comp_price: v.req_f64("comp_price")?,
        is_available: v.req_bool("is_available")?,
        sqft_delta_pct: v.req_f64("sqft_delta_pct")?,
        price_gap_pct: v.req_f64("price_gap_pct")?,
        similarity_score: v.req_f64("similarity_score")?,
        comp_rank: v.req_u64("comp_rank")? as u32,
    })
}

fn decode_comp_stats(row: &BTreeMap<String, Value>) -> Result<CompPriceStats, WarehouseError> {
    let v = RowView::new(row);
    Ok(CompPriceStats {
        total_comps: v.req_u64("total_comps")?,
        avg_comp_price: v.req_f64("avg_comp_price")?,
        median_comp_price: v.req_f64("median_comp_price")?,
        min_comp_price: v.req_f64("min_comp_price")?,
        max_comp_price: v.req_f64("max_comp_price")?,
        comp_price_stddev: v.opt_f64("comp_price_stddev"),
    })
}

fn decode_summary(row: &BTreeMap<String, Value>) -> Result<UnitTypeSummary, WarehouseError> {
    let v = RowView::new(row);
    Ok(UnitTypeSummary {
        unit_type: v.req_str("unit_type")?,
        total_units: v.req_u64("total_units")?,
        units_needing_pricing: v.req_u64("units_needing_pricing")?,
        avg_rent: v.opt_f64("avg_rent").unwrap_or(0.0),
        avg_rent_per_sqft: v.opt_f64("avg_rent_per_sqft").unwrap_or(0.0),
    })
}

/// Aggregates over an empty table come back as NULL cells, so the SUM/AVG
/// columns decode leniently.
fn decode_portfolio_metrics(
    row: &BTreeMap<String, Value>,
) -> Result<PortfolioMetrics, WarehouseError> {
    let v = RowView::new(row);
    Ok(PortfolioMetrics {
        total_units: v.req_u64("total_units")?,
        vacant_units: v.opt_u64("vacant_units").unwrap_or(0),
        occupied_units: v.opt_u64("occupied_units").unwrap_or(0),
        notice_units: v.opt_u64("notice_units").unwrap_or(0),
        units_needing_pricing: v.opt_u64("units_needing_pricing").unwrap_or(0),
        total_revenue_potential: v.opt_f64("total_revenue_potential").unwrap_or(0.0),
        current_annual_revenue: v.opt_f64("current_annual_revenue").unwrap_or(0.0),
        avg_rent_per_sqft: v.opt_f64("avg_rent_per_sqft").unwrap_or(0.0),
        avg_occupied_rent: v.opt_f64("avg_occupied_rent"),
        avg_vacant_rent: v.opt_f64("avg_vacant_rent"),
        occupancy_rate: 0.0,
        revenue_optimization_potential: 0.0,
    }
    .with_derived())
}

fn decode_urgency_count(row: &BTreeMap<String, Value>) -> Result<UrgencyCount, WarehouseError> {
    let v = RowView::new(row);
    Ok(UrgencyCount {
        pricing_urgency: PricingUrgency::parse(&v.req_str("pricing_urgency")?)
            .map_err(|e| WarehouseError::Decode(e.to_string()))?,
        unit_count: v.req_u64("unit_count")?,
    })
}

fn decode_property_performance(
    row: &BTreeMap<String, Value>,
) -> Result<PropertyPerformance, WarehouseError> {
    let v = RowView::new(row);
    Ok(PropertyPerformance {
        property: v.req_str("property")?,
        total_units: v.req_u64("total_units")?,
        vacant_units: v.req_u64("vacant_units")?,
        avg_rent: v.opt_f64("avg_rent").unwrap_or(0.0),
        avg_rent_per_sqft: v.opt_f64("avg_rent_per_sqft").unwrap_or(0.0),
        revenue_potential: v.opt_f64("revenue_potential").unwrap_or(0.0),
    })
}

fn decode_market_bucket(
    row: &BTreeMap<String, Value>,
) -> Result<MarketPositionBucket, WarehouseError> {
    let v = RowView::new(row);
    Ok(MarketPositionBucket {
        market_position: MarketPosition::parse(&v.req_str("market_position")?)
            .map_err(|e| WarehouseError::Decode(e.to_string()))?,
        unit_count: v.req_u64("unit_count")?,
        avg_premium_discount_pct: v.opt_f64("avg_premium_discount_pct").unwrap_or(0.0),
        avg_rent: v.opt_f64("avg_rent").unwrap_or(0.0),
    })
}

fn decode_unit_type_position(
    row: &BTreeMap<String, Value>,
) -> Result<UnitTypePosition, WarehouseError> {
    let v = RowView::new(row);
    Ok(UnitTypePosition {
        unit_type: v.req_str("unit_type")?,
        total_units: v.req_u64("total_units")?,
        our_avg_rent_per_sqft: v.opt_f64("our_avg_rent_per_sqft").unwrap_or(0.0),
        market_avg_rent_per_sqft: v.opt_f64("market_avg_rent_per_sqft").unwrap_or(0.0),
    })
}

fn decode_opportunity_summary(
    row: &BTreeMap<String, Value>,
) -> Result<OpportunitySummary, WarehouseError> {
    let v = RowView::new(row);
    Ok(OpportunitySummary {
        units_with_50plus_opportunity: v.opt_u64("units_with_50plus_opportunity").unwrap_or(0),
        units_with_100plus_opportunity: v.opt_u64("units_with_100plus_opportunity").unwrap_or(0),
        total_monthly_opportunity: v.opt_f64("total_monthly_opportunity").unwrap_or(0.0),
        total_annual_opportunity: v.opt_f64("total_annual_opportunity").unwrap_or(0.0),
        avg_opportunity_per_unit: v.opt_f64("avg_opportunity_per_unit"),
    })
}

fn decode_opportunity(row: &BTreeMap<String, Value>) -> Result<RentOpportunity, WarehouseError> {
    let v = RowView::new(row);
    Ok(RentOpportunity {
        unit_id: v.req_str("unit_id")?,
        property: v.req_str("property")?,
        unit_type: v.req_str("unit_type")?,
        status: UnitStatus::parse(&v.req_str("status")?)
            .map_err(|e| WarehouseError::Decode(e.to_string()))?,
        advertised_rent: v.req_f64("advertised_rent")?,
        pricing_urgency: PricingUrgency::parse(&v.req_str("pricing_urgency")?)
            .map_err(|e| WarehouseError::Decode(e.to_string()))?,
        days_to_lease_end: v.opt_i64("days_to_lease_end"),
        avg_comp_price: v.req_f64("avg_comp_price")?,
        potential_rent_increase: v.req_f64("potential_rent_increase")?,
        annual_revenue_opportunity: v.req_f64("annual_revenue_opportunity")?,
    })
}

#[async_trait]
impl WarehouseBackend for BigQueryBackend {
    fn backend_tag(&self) -> &'static str {
        "bigquery"
    }

    async fn test_connection(&self, targets: &WarehouseTargets) -> bool {
        self.run_query(&targets.project_id, "SELECT 1 AS test")
            .await
            .is_ok()
    }

    async fn probe_table(
        &self,
        targets: &WarehouseTargets,
        table: &TableRef,
    ) -> Result<u64, WarehouseError> {
        self.count_query(&targets.project_id, &sql::probe_count(table))
            .await
    }

    async fn fetch_units(
        &self,
        targets: &WarehouseTargets,
        params: &ListUnitsParams,
    ) -> Result<UnitPage, WarehouseError> {
        let total_count = self
            .count_query(&targets.project_id, &sql::count_units(targets, params))
            .await?;
        let rows = self
            .run_query(&targets.project_id, &sql::select_units(targets, params))
            .await?;
        let units = rows.iter().map(decode_unit).collect::<Result<_, _>>()?;
        Ok(UnitPage { units, total_count })
    }

    async fn fetch_unit(
        &self,
        targets: &WarehouseTargets,
        unit_id: &str,
    ) -> Result<Option<UnitSnapshot>, WarehouseError> {
        let rows = self
            .run_query(&targets.project_id, &sql::select_unit(targets, unit_id))
            .await?;
        rows.first().map(decode_unit).transpose()
    }

    async fn fetch_comparables(
        &self,
        targets: &WarehouseTargets,
        unit_id: &str,
    ) -> Result<ComparablesFetch, WarehouseError> {
        let query = sql::select_comparables(
            targets,
            unit_id,
            self.similarity_threshold,
            self.max_comps_per_unit,
        );
        let rows = self.run_query(&targets.project_id, &query).await?;
        let comparables = rows
            .iter()
            .map(decode_comparable)
            .collect::<Result<Vec<_>, _>>()?;
        let stats = rows.first().map(decode_comp_stats).transpose()?;
        Ok(ComparablesFetch { comparables, stats })
    }

    async fn fetch_vacant_units(
        &self,
        targets: &WarehouseTargets,
        limit: usize,
    ) -> Result<Vec<UnitSnapshot>, WarehouseError> {
        let rows = self
            .run_query(
                &targets.project_id,
                &sql::select_vacant_units(targets, limit),
            )
            .await?;
        rows.iter().map(decode_unit).collect()
    }

    async fn unit_type_summary(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<Vec<UnitTypeSummary>, WarehouseError> {
        let rows = self
            .run_query(&targets.project_id, &sql::unit_type_summary(targets))
            .await?;
        rows.iter().map(decode_summary).collect()
    }

    async fn properties(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<Vec<String>, WarehouseError> {
        let rows = self
            .run_query(&targets.project_id, &sql::select_properties(targets))
            .await?;
        rows.iter()
            .map(|row| RowView::new(row).req_str("property"))
            .collect()
    }

    async fn portfolio_analytics(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<PortfolioAnalytics, WarehouseError> {
        let metric_rows = self
            .run_query(&targets.project_id, &sql::portfolio_metrics(targets))
            .await?;
        let portfolio = metric_rows
            .first()
            .map(decode_portfolio_metrics)
            .transpose()?
            .ok_or_else(|| {
                WarehouseError::Decode("portfolio aggregate returned no rows".to_string())
            })?;
        let urgency_breakdown = self
            .run_query(&targets.project_id, &sql::urgency_breakdown(targets))
            .await?
            .iter()
            .map(decode_urgency_count)
            .collect::<Result<_, _>>()?;
        let property_performance = self
            .run_query(&targets.project_id, &sql::property_performance(targets))
            .await?
            .iter()
            .map(decode_property_performance)
            .collect::<Result<_, _>>()?;
        Ok(PortfolioAnalytics {
            portfolio,
            urgency_breakdown,
            property_performance,
        })
    }

    async fn market_position(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<MarketPositionAnalytics, WarehouseError> {
        let market_summary = self
            .run_query(&targets.project_id, &sql::market_summary(targets))
            .await?
            .iter()
            .map(decode_market_bucket)
            .collect::<Result<_, _>>()?;
        let unit_type_comparison = self
            .run_query(&targets.project_id, &sql::unit_type_position(targets))
            .await?
            .iter()
            .map(decode_unit_type_position)
            .collect::<Result<_, _>>()?;
        Ok(MarketPositionAnalytics {
            market_summary,
            unit_type_comparison,
        })
    }

    async fn pricing_opportunities(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<PricingOpportunities, WarehouseError> {
        let summary_rows = self
            .run_query(&targets.project_id, &sql::opportunity_summary(targets))
            .await?;
        let summary = summary_rows
            .first()
            .map(decode_opportunity_summary)
            .transpose()?
            .ok_or_else(|| {
                WarehouseError::Decode("opportunity aggregate returned no rows".to_string())
            })?;
        let top_opportunities = self
            .run_query(
                &targets.project_id,
                &sql::top_opportunities(targets, TOP_OPPORTUNITIES_LIMIT),
            )
            .await?
            .iter()
            .map(decode_opportunity)
            .collect::<Result<_, _>>()?;
        Ok(PricingOpportunities {
            summary,
            top_opportunities,
        })
    }
}

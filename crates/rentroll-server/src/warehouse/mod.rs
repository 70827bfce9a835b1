// SPDX-License-Identifier: Apache-2.0

pub mod bigquery;
pub mod fake;
pub mod sql;

use async_trait::async_trait;
use rentroll_api::ListUnitsParams;
use rentroll_model::{
    Comparable, MarketPositionBucket, OpportunitySummary, PortfolioMetrics, PropertyPerformance,
    RentOpportunity, TableRef, TableSettings, UnitSnapshot, UnitTypePosition, UnitTypeSummary,
    UrgencyCount, ValidationError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse request failed: {0}")]
    Transport(String),
    #[error("warehouse rejected query: {0}")]
    Query(String),
    #[error("row decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 120,
        }
    }
}

/// Concrete tables a query run targets, resolved from the effective settings
/// on every request so runtime settings changes apply immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseTargets {
    pub project_id: String,
    pub unit_snapshot: TableRef,
    pub unit_competitor_pairs: TableRef,
    pub rentroll: TableRef,
    pub competition: TableRef,
}

impl WarehouseTargets {
    pub fn resolve(settings: &TableSettings, mart_dataset: &str) -> Result<Self, ValidationError> {
        let project = &settings.project_id;
        Ok(Self {
            project_id: project.clone(),
            unit_snapshot: TableRef::parse(&format!("{project}.{mart_dataset}.unit_snapshot"))?,
            unit_competitor_pairs: TableRef::parse(&format!(
                "{project}.{mart_dataset}.unit_competitor_pairs"
            ))?,
            rentroll: settings.rentroll_table.clone(),
            competition: settings.competition_table.clone(),
        })
    }
}

/// Summary statistics the mart duplicates onto every comp pair row.
#[derive(Debug, Clone, PartialEq)]
pub struct CompPriceStats {
    pub total_comps: u64,
    pub avg_comp_price: f64,
    pub median_comp_price: f64,
    pub min_comp_price: f64,
    pub max_comp_price: f64,
    pub comp_price_stddev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparablesFetch {
    pub comparables: Vec<Comparable>,
    pub stats: Option<CompPriceStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitPage {
    pub units: Vec<UnitSnapshot>,
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioAnalytics {
    pub portfolio: PortfolioMetrics,
    pub urgency_breakdown: Vec<UrgencyCount>,
    pub property_performance: Vec<PropertyPerformance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketPositionAnalytics {
    pub market_summary: Vec<MarketPositionBucket>,
    pub unit_type_comparison: Vec<UnitTypePosition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingOpportunities {
    pub summary: OpportunitySummary,
    pub top_opportunities: Vec<RentOpportunity>,
}

#[async_trait]
pub trait WarehouseBackend: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Cheap liveness check, `SELECT 1` equivalent.
    async fn test_connection(&self, targets: &WarehouseTargets) -> bool;

    /// Row count of an arbitrary table, for the settings connectivity test.
    async fn probe_table(
        &self,
        targets: &WarehouseTargets,
        table: &TableRef,
    ) -> Result<u64, WarehouseError>;

    async fn fetch_units(
        &self,
        targets: &WarehouseTargets,
        params: &ListUnitsParams,
    ) -> Result<UnitPage, WarehouseError>;

    async fn fetch_unit(
        &self,
        targets: &WarehouseTargets,
        unit_id: &str,
    ) -> Result<Option<UnitSnapshot>, WarehouseError>;

    async fn fetch_comparables(
        &self,
        targets: &WarehouseTargets,
        unit_id: &str,
    ) -> Result<ComparablesFetch, WarehouseError>;

    /// Units flagged `needs_pricing`, most urgent first.
    async fn fetch_vacant_units(
        &self,
        targets: &WarehouseTargets,
        limit: usize,
    ) -> Result<Vec<UnitSnapshot>, WarehouseError>;

    async fn unit_type_summary(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<Vec<UnitTypeSummary>, WarehouseError>;

    async fn properties(&self, targets: &WarehouseTargets)
        -> Result<Vec<String>, WarehouseError>;

    /// Occupancy, urgency, and per-property rollup for the dashboard.
    async fn portfolio_analytics(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<PortfolioAnalytics, WarehouseError>;

    /// Advertised rents bucketed against their comparable-set averages.
    async fn market_position(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<MarketPositionAnalytics, WarehouseError>;

    /// Units priced under their comparable-set average, biggest gaps first.
    async fn pricing_opportunities(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<PricingOpportunities, WarehouseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_follow_settings() {
        let settings = TableSettings::default();
        let t = WarehouseTargets::resolve(&settings, "mart").expect("resolve");
        assert_eq!(t.unit_snapshot.as_str(), "rentroll-ai.mart.unit_snapshot");
        assert_eq!(
            t.unit_competitor_pairs.as_str(),
            "rentroll-ai.mart.unit_competitor_pairs"
        );
        assert_eq!(t.rentroll, settings.rentroll_table);
    }

    #[test]
    fn targets_reject_bad_project() {
        let settings = TableSettings {
            project_id: "bad project".to_string(),
            ..TableSettings::default()
        };
        assert!(WarehouseTargets::resolve(&settings, "mart").is_err());
    }
}

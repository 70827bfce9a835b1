// SPDX-License-Identifier: Apache-2.0

use rentroll_model::{
    Comparable, MarketPositionBucket, OpportunitySummary, OptimizationStrategy, PortfolioMetrics,
    PropertyPerformance, RentOpportunity, UnitSnapshot, UnitTypePosition, UnitTypeSummary,
    UrgencyCount,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub warehouse_connected: bool,
    pub services: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitsListResponseDto {
    pub units: Vec<UnitSnapshot>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparablesResponseDto {
    pub unit_id: String,
    pub unit: UnitSnapshot,
    pub comparables: Vec<Comparable>,
    pub total_comps: u64,
    pub avg_comp_price: f64,
    pub median_comp_price: f64,
    pub min_comp_price: f64,
    pub max_comp_price: f64,
    pub comp_price_stddev: Option<f64>,
}

fn default_strategy() -> OptimizationStrategy {
    OptimizationStrategy::Balanced
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizeRequestDto {
    #[serde(default = "default_strategy")]
    pub strategy: OptimizationStrategy,
    /// Revenue weight for the balanced strategy, in `[0, 1]`.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub custom_elasticity: Option<f64>,
}

impl Default for OptimizeRequestDto {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            weight: None,
            custom_elasticity: None,
        }
    }
}

/// Comparable-set rollup attached to an optimization result. Absent when the
/// unit had no comparables and the advertised rent was passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompSummaryDto {
    pub total_comps: u64,
    pub avg_comp_price: f64,
    pub median_comp_price: f64,
    pub min_comp_price: f64,
    pub max_comp_price: f64,
    pub avg_similarity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizationResultDto {
    pub unit_id: String,
    pub current_rent: f64,
    pub suggested_rent: f64,
    pub rent_change: f64,
    pub rent_change_pct: f64,
    pub confidence: Option<f64>,
    pub strategy_used: OptimizationStrategy,
    pub demand_probability: Option<f64>,
    pub expected_days_to_lease: Option<u32>,
    pub revenue_impact_annual: f64,
    pub comp_data: Option<CompSummaryDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizeResponseDto {
    pub unit_id: String,
    pub optimization: OptimizationResultDto,
}

pub const DEFAULT_BATCH_MAX_UNITS: u32 = 100;

fn default_max_units() -> u32 {
    DEFAULT_BATCH_MAX_UNITS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchOptimizeRequestDto {
    /// Explicit units to optimize. When absent, vacant units are selected.
    #[serde(default)]
    pub unit_ids: Option<Vec<String>>,
    #[serde(default = "default_strategy")]
    pub strategy: OptimizationStrategy,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub custom_elasticity: Option<f64>,
    #[serde(default = "default_max_units")]
    pub max_units: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchOptimizeResponseDto {
    pub total_units_processed: u64,
    pub successful_optimizations: u64,
    pub failed_optimizations: u64,
    pub results: Vec<OptimizationResultDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryResponseDto {
    pub unit_types: Vec<UnitTypeSummary>,
    pub total_properties: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertiesResponseDto {
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortfolioAnalyticsResponseDto {
    pub portfolio: PortfolioMetrics,
    pub urgency_breakdown: Vec<UrgencyCount>,
    pub property_performance: Vec<PropertyPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketPositionResponseDto {
    pub market_summary: Vec<MarketPositionBucket>,
    pub unit_type_comparison: Vec<UnitTypePosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingOpportunitiesResponseDto {
    pub summary: OpportunitySummary,
    pub top_opportunities: Vec<RentOpportunity>,
}

/// Effective warehouse settings with, for each key, which layer supplied it:
/// `"settings"`, `"env"`, or `"default"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsResponseDto {
    pub project_id: String,
    pub rentroll_table: String,
    pub competition_table: String,
    pub sources: BTreeMap<String, String>,
}

/// Partial update: absent keys keep their current effective value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdateDto {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub rentroll_table: Option<String>,
    #[serde(default)]
    pub competition_table: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveSettingsResponseDto {
    pub message: String,
    pub settings: SettingsResponseDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableTestResultDto {
    pub success: bool,
    pub row_count: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionTestResponseDto {
    pub rentroll_table: TableTestResultDto,
    pub competition_table: TableTestResultDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimize_request_defaults() {
        let req: OptimizeRequestDto = serde_json::from_str("{}").expect("empty body");
        assert_eq!(req.strategy, OptimizationStrategy::Balanced);
        assert!(req.weight.is_none());
        assert!(req.custom_elasticity.is_none());
    }

    #[test]
    fn optimize_request_rejects_unknown_keys() {
        let err = serde_json::from_str::<OptimizeRequestDto>(r#"{"stratgy":"revenue"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn batch_request_defaults() {
        let req: BatchOptimizeRequestDto =
            serde_json::from_str(r#"{"strategy":"lease_up"}"#).expect("body");
        assert_eq!(req.strategy, OptimizationStrategy::LeaseUp);
        assert_eq!(req.max_units, DEFAULT_BATCH_MAX_UNITS);
        assert!(req.unit_ids.is_none());
    }

    #[test]
    fn settings_update_is_partial() {
        let req: SettingsUpdateDto =
            serde_json::from_str(r#"{"rentroll_table":"p.d.t"}"#).expect("body");
        assert_eq!(req.rentroll_table.as_deref(), Some("p.d.t"));
        assert!(req.project_id.is_none());
        assert!(req.competition_table.is_none());
    }
}

// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::table::ValidationError;
use crate::unit::{PricingUrgency, UnitStatus};

/// Where an advertised rent sits relative to its comparable-set average.
/// Above the average counts as a premium; more than 5% under it as a
/// discount; the band in between as at-market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketPosition {
    AboveMarket,
    AtMarket,
    BelowMarket,
}

impl MarketPosition {
    #[must_use]
    pub fn classify(advertised_rent: f64, avg_comp_price: f64) -> Self {
        if advertised_rent > avg_comp_price {
            Self::AboveMarket
        } else if advertised_rent < avg_comp_price * 0.95 {
            Self::BelowMarket
        } else {
            Self::AtMarket
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().to_ascii_uppercase().as_str() {
            "ABOVE_MARKET" => Ok(Self::AboveMarket),
            "AT_MARKET" => Ok(Self::AtMarket),
            "BELOW_MARKET" => Ok(Self::BelowMarket),
            other => Err(ValidationError(format!("unknown market position: {other}"))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AboveMarket => "ABOVE_MARKET",
            Self::AtMarket => "AT_MARKET",
            Self::BelowMarket => "BELOW_MARKET",
        }
    }
}

/// Portfolio-wide occupancy and revenue rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_units: u64,
    pub vacant_units: u64,
    pub occupied_units: u64,
    pub notice_units: u64,
    pub units_needing_pricing: u64,
    pub total_revenue_potential: f64,
    pub current_annual_revenue: f64,
    pub avg_rent_per_sqft: f64,
    pub avg_occupied_rent: Option<f64>,
    pub avg_vacant_rent: Option<f64>,
    pub occupancy_rate: f64,
    pub revenue_optimization_potential: f64,
}

impl PortfolioMetrics {
    /// Fill in the fields computed from the raw aggregates.
    #[must_use]
    pub fn with_derived(mut self) -> Self {
        self.occupancy_rate = if self.total_units > 0 {
            self.occupied_units as f64 / self.total_units as f64 * 100.0
        } else {
            0.0
        };
        self.revenue_optimization_potential =
            self.total_revenue_potential - self.current_annual_revenue;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyCount {
    pub pricing_urgency: PricingUrgency,
    pub unit_count: u64,
}

/// Per-property rollup, reported for the top revenue producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPerformance {
    pub property: String,
    pub total_units: u64,
    pub vacant_units: u64,
    pub avg_rent: f64,
    pub avg_rent_per_sqft: f64,
    pub revenue_potential: f64,
}

/// Unit counts per [`MarketPosition`], over units that have comparables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPositionBucket {
    pub market_position: MarketPosition,
    pub unit_count: u64,
    pub avg_premium_discount_pct: f64,
    pub avg_rent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypePosition {
    pub unit_type: String,
    pub total_units: u64,
    pub our_avg_rent_per_sqft: f64,
    pub market_avg_rent_per_sqft: f64,
}

/// Rollup of rent gaps against the comparable-set average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunitySummary {
    pub units_with_50plus_opportunity: u64,
    pub units_with_100plus_opportunity: u64,
    pub total_monthly_opportunity: f64,
    pub total_annual_opportunity: f64,
    /// Mean positive gap. Absent when no unit is priced under its comps.
    pub avg_opportunity_per_unit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentOpportunity {
    pub unit_id: String,
    pub property: String,
    pub unit_type: String,
    pub status: UnitStatus,
    pub advertised_rent: f64,
    pub pricing_urgency: PricingUrgency,
    pub days_to_lease_end: Option<i64>,
    pub avg_comp_price: f64,
    pub potential_rent_increase: f64,
    pub annual_revenue_opportunity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_position_around_the_discount_band() {
        assert_eq!(
            MarketPosition::classify(2100.0, 2000.0),
            MarketPosition::AboveMarket
        );
        assert_eq!(
            MarketPosition::classify(1950.0, 2000.0),
            MarketPosition::AtMarket
        );
        assert_eq!(
            MarketPosition::classify(1899.0, 2000.0),
            MarketPosition::BelowMarket
        );
        assert_eq!(
            MarketPosition::parse("below_market").expect("parse"),
            MarketPosition::BelowMarket
        );
        assert!(MarketPosition::parse("SIDEWAYS").is_err());
    }

    #[test]
    fn derived_metrics_handle_an_empty_portfolio() {
        let empty = PortfolioMetrics {
            total_units: 0,
            vacant_units: 0,
            occupied_units: 0,
            notice_units: 0,
            units_needing_pricing: 0,
            total_revenue_potential: 0.0,
            current_annual_revenue: 0.0,
            avg_rent_per_sqft: 0.0,
            avg_occupied_rent: None,
            avg_vacant_rent: None,
            occupancy_rate: 0.0,
            revenue_optimization_potential: 0.0,
        }
        .with_derived();
        assert_eq!(empty.occupancy_rate, 0.0);

        let metrics = PortfolioMetrics {
            total_units: 4,
            occupied_units: 3,
            total_revenue_potential: 120_000.0,
            current_annual_revenue: 90_000.0,
            ..empty
        }
        .with_derived();
        assert_eq!(metrics.occupancy_rate, 75.0);
        assert_eq!(metrics.revenue_optimization_potential, 30_000.0);
    }
}

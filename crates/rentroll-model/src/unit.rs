// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::table::ValidationError;

/// Occupancy status as reported by the rent-roll feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Vacant,
    Occupied,
    Notice,
}

impl UnitStatus {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().to_ascii_uppercase().as_str() {
            "VACANT" => Ok(Self::Vacant),
            "OCCUPIED" => Ok(Self::Occupied),
            "NOTICE" => Ok(Self::Notice),
            other => Err(ValidationError(format!("unknown unit status: {other}"))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vacant => "VACANT",
            Self::Occupied => "OCCUPIED",
            Self::Notice => "NOTICE",
        }
    }
}

impl Display for UnitStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How soon a unit needs a pricing decision. Ordering matters: batch
/// optimization processes `Immediate` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingUrgency {
    Immediate,
    High,
    Medium,
    Low,
}

impl PricingUrgency {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().to_ascii_uppercase().as_str() {
            "IMMEDIATE" => Ok(Self::Immediate),
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            other => Err(ValidationError(format!("unknown pricing urgency: {other}"))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "IMMEDIATE",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStrategy {
    Revenue,
    LeaseUp,
    Balanced,
}

impl OptimizationStrategy {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "revenue" => Ok(Self::Revenue),
            "lease_up" | "leaseup" => Ok(Self::LeaseUp),
            "balanced" => Ok(Self::Balanced),
            other => Err(ValidationError(format!(
                "unknown optimization strategy: {other}"
            ))),
        }
    }
}

/// One row of the mart `unit_snapshot` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub unit_id: String,
    pub property: String,
    pub bed: u32,
    pub bath: f64,
    pub sqft: f64,
    pub status: UnitStatus,
    pub advertised_rent: f64,
    pub market_rent: Option<f64>,
    pub rent_per_sqft: Option<f64>,
    pub move_out_date: Option<NaiveDate>,
    pub lease_end_date: Option<NaiveDate>,
    pub days_to_lease_end: Option<i64>,
    pub needs_pricing: bool,
    pub rent_premium_pct: Option<f64>,
    pub pricing_urgency: PricingUrgency,
    pub unit_type: String,
    pub size_category: Option<String>,
    pub annual_revenue_potential: Option<f64>,
    pub has_complete_data: bool,
}

/// Server-side filters for the paginated unit listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFilter {
    pub status: Option<UnitStatus>,
    pub property: Option<String>,
    pub needs_pricing_only: bool,
}

impl UnitFilter {
    #[must_use]
    pub fn matches(&self, unit: &UnitSnapshot) -> bool {
        if let Some(status) = self.status {
            if unit.status != status {
                return false;
            }
        }
        if let Some(property) = &self.property {
            if &unit.property != property {
                return false;
            }
        }
        if self.needs_pricing_only && !unit.needs_pricing {
            return false;
        }
        unit.has_complete_data
    }
}

/// Portfolio rollup per unit type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeSummary {
    pub unit_type: String,
    pub total_units: u64,
    pub units_needing_pricing: u64,
    pub avg_rent: f64,
    pub avg_rent_per_sqft: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(status: UnitStatus, property: &str, needs_pricing: bool) -> UnitSnapshot {
        UnitSnapshot {
            unit_id: "U1".to_string(),
            property: property.to_string(),
            bed: 2,
            bath: 2.0,
            sqft: 1000.0,
            status,
            advertised_rent: 2000.0,
            market_rent: None,
            rent_per_sqft: Some(2.0),
            move_out_date: None,
            lease_end_date: None,
            days_to_lease_end: None,
            needs_pricing,
            rent_premium_pct: None,
            pricing_urgency: PricingUrgency::Medium,
            unit_type: "2BR".to_string(),
            size_category: None,
            annual_revenue_potential: Some(24_000.0),
            has_complete_data: true,
        }
    }

    #[test]
    fn filter_matches_status_property_and_pricing_flag() {
        let u = unit(UnitStatus::Vacant, "Maple Court", true);
        let all = UnitFilter::default();
        assert!(all.matches(&u));

        let by_status = UnitFilter {
            status: Some(UnitStatus::Occupied),
            ..UnitFilter::default()
        };
        assert!(!by_status.matches(&u));

        let by_property = UnitFilter {
            property: Some("Maple Court".to_string()),
            ..UnitFilter::default()
        };
        assert!(by_property.matches(&u));

        let pricing_only = UnitFilter {
            needs_pricing_only: true,
            ..UnitFilter::default()
        };
        assert!(pricing_only.matches(&u));
        assert!(!pricing_only.matches(&unit(UnitStatus::Vacant, "Maple Court", false)));
    }

    #[test]
    fn filter_excludes_incomplete_rows() {
        let mut u = unit(UnitStatus::Vacant, "Maple Court", true);
        u.has_complete_data = false;
        assert!(!UnitFilter::default().matches(&u));
    }

    #[test]
    fn urgency_orders_immediate_first() {
        let mut urgencies = vec![
            PricingUrgency::Low,
            PricingUrgency::Immediate,
            PricingUrgency::Medium,
            PricingUrgency::High,
        ];
        urgencies.sort();
        assert_eq!(urgencies[0], PricingUrgency::Immediate);
        assert_eq!(urgencies[3], PricingUrgency::Low);
    }

    #[test]
    fn strategy_parse_accepts_aliases() {
        assert_eq!(
            OptimizationStrategy::parse("lease_up").expect("parse"),
            OptimizationStrategy::LeaseUp
        );
        assert_eq!(
            OptimizationStrategy::parse("REVENUE").expect("parse"),
            OptimizationStrategy::Revenue
        );
        assert!(OptimizationStrategy::parse("aggressive").is_err());
    }
}

// SPDX-License-Identifier: Apache-2.0

use rentroll_model::{Comparable, OptimizationStrategy, UnitSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::demand::DemandCurve;
use crate::solver::minimize_scalar;
use crate::{DEFAULT_ELASTICITY, DEFAULT_MAX_ADJUSTMENT};

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("advertised rent must be positive for unit {unit_id}")]
    NonPositiveRent { unit_id: String },
    #[error("balanced weight {0} outside [0, 1]")]
    InvalidWeight(f64),
    #[error("elasticity must be finite and non-zero, got {0}")]
    InvalidElasticity(f64),
    #[error("max price adjustment must be in (0, 1], got {0}")]
    InvalidMaxAdjustment(f64),
}

/// Tunable optimizer inputs. Defaults match the service-level configuration
/// defaults (`DEFAULT_ELASTICITY`, `MAX_PRICE_ADJUSTMENT`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingParams {
    pub elasticity: f64,
    pub max_adjustment: f64,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            elasticity: DEFAULT_ELASTICITY,
            max_adjustment: DEFAULT_MAX_ADJUSTMENT,
        }
    }
}

/// Comparable-set rollup carried on every optimization outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompSummary {
    pub total_comps: u64,
    pub avg_comp_price: f64,
    pub median_comp_price: f64,
    pub min_comp_price: f64,
    pub max_comp_price: f64,
    pub avg_similarity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub unit_id: String,
    pub current_rent: f64,
    pub suggested_rent: f64,
    pub rent_change: f64,
    pub rent_change_pct: f64,
    pub strategy_used: OptimizationStrategy,
    /// Leasing probability at the suggested rent. Absent when the unit had no
    /// comparables and the advertised rent was passed through.
    pub demand_probability: Option<f64>,
    pub expected_days_to_lease: Option<u32>,
    pub revenue_impact_annual: f64,
    pub comp_summary: Option<CompSummary>,
}

#[derive(Debug, Clone)]
pub struct PricingOptimizer {
    demand_curve: DemandCurve,
    max_adjustment: f64,
}

impl PricingOptimizer {
    pub fn new(params: PricingParams) -> Result<Self, PricingError> {
        if !params.elasticity.is_finite() || params.elasticity == 0.0 {
            return Err(PricingError::InvalidElasticity(params.elasticity));
        }
        if !(params.max_adjustment > 0.0 && params.max_adjustment <= 1.0) {
            return Err(PricingError::InvalidMaxAdjustment(params.max_adjustment));
        }
        Ok(Self {
            demand_curve: DemandCurve::new(params.elasticity),
            max_adjustment: params.max_adjustment,
        })
    }

    /// Revenue maximization: pick the price maximizing annualized expected
    /// revenue `price * probability * 12` within the adjustment bounds.
    fn revenue_optimization(&self, unit: &UnitSnapshot, comps: &[Comparable]) -> (f64, Option<f64>) {
        let Some(base_price) = median_comp_price(comps) else {
            warn!(unit_id = %unit.unit_id, "no comparables, passing advertised rent through");
            return (unit.advertised_rent, None);
        };
        let current_rent = unit.advertised_rent;

        let lo = (base_price * (1.0 - self.max_adjustment)).max(current_rent * 0.8);
        let hi = (base_price * (1.0 + self.max_adjustment)).min(current_rent * 1.3);

        let negative_revenue = |price: f64| {
            let prob = self.demand_curve.probability(price, base_price);
            -(price * prob * 12.0)
        };

        match minimize_scalar(negative_revenue, lo, hi) {
            Ok(optimal) => {
                let prob = self.demand_curve.probability(optimal, base_price);
                debug!(
                    unit_id = %unit.unit_id,
                    current_rent,
                    optimal,
                    probability = prob,
                    "revenue optimization"
                );
                (optimal, Some(prob))
            }
            Err(err) => {
                warn!(unit_id = %unit.unit_id, %err, "revenue optimization failed");
                (current_rent, None)
            }
        }
    }

    /// Lease-up minimization: pick the price minimizing expected vacancy
    /// days. Bounds allow more aggressive pricing down than revenue does.
    fn leaseup_optimization(&self, unit: &UnitSnapshot, comps: &[Comparable]) -> (f64, Option<f64>) {
        let Some(base_price) = median_comp_price(comps) else {
            warn!(unit_id = %unit.unit_id, "no comparables, passing advertised rent through");
            return (unit.advertised_rent, None);
        };
        let current_rent = unit.advertised_rent;

        let lo = (base_price * (1.0 - self.max_adjustment)).max(current_rent * 0.7);
        let hi = (base_price * (1.0 + self.max_adjustment * 0.5)).min(current_rent * 1.1);

        let expected_vacancy_days =
            |price: f64| self.demand_curve.expected_days_to_lease(price, base_price);

        match minimize_scalar(expected_vacancy_days, lo, hi) {
            Ok(optimal) => {
                let prob = self.demand_curve.probability(optimal, base_price);
                debug!(
                    unit_id = %unit.unit_id,
                    current_rent,
                    optimal,
                    probability = prob,
                    "lease-up optimization"
                );
                (optimal, Some(prob))
            }
            Err(err) => {
                warn!(unit_id = %unit.unit_id, %err, "lease-up optimization failed");
                (current_rent, None)
            }
        }
    }

    /// Weighted blend: `weight` of 1.0 is pure revenue, 0.0 pure lease-up.
    fn balanced_optimization(
        &self,
        unit: &UnitSnapshot,
        comps: &[Comparable],
        weight: f64,
    ) -> (f64, Option<f64>) {
        let (rev_price, _) = self.revenue_optimization(unit, comps);
        let (lease_price, _) = self.leaseup_optimization(unit, comps);
        let optimal = rev_price * weight + lease_price * (1.0 - weight);

        let prob = median_comp_price(comps)
            .map(|base_price| self.demand_curve.probability(optimal, base_price));
        (optimal, prob)
    }

    pub fn optimize_unit(
        &self,
        unit: &UnitSnapshot,
        comps: &[Comparable],
        strategy: OptimizationStrategy,
        weight: Option<f64>,
    ) -> Result<OptimizationOutcome, PricingError> {
        let current_rent = unit.advertised_rent;
        if current_rent <= 0.0 {
            return Err(PricingError::NonPositiveRent {
                unit_id: unit.unit_id.clone(),
            });
        }

        let (suggested_rent, demand_prob) = match strategy {
            OptimizationStrategy::Revenue => self.revenue_optimization(unit, comps),
            OptimizationStrategy::LeaseUp => self.leaseup_optimization(unit, comps),
            OptimizationStrategy::Balanced => {
                let weight = weight.unwrap_or(0.5);
                if !(0.0..=1.0).contains(&weight) {
                    return Err(PricingError::InvalidWeight(weight));
                }
                self.balanced_optimization(unit, comps, weight)
            }
        };

        let rent_change = suggested_rent - current_rent;
        let rent_change_pct = rent_change / current_rent * 100.0;
        let revenue_impact_annual = rent_change * 12.0;

        let expected_days = match (demand_prob, median_comp_price(comps)) {
            (Some(_), Some(base_price)) => Some(
                self.demand_curve
                    .expected_days_to_lease(suggested_rent, base_price) as u32,
            ),
            _ => None,
        };

        Ok(OptimizationOutcome {
            unit_id: unit.unit_id.clone(),
            current_rent,
            suggested_rent: round2(suggested_rent),
            rent_change: round2(rent_change),
            rent_change_pct: round2(rent_change_pct),
            strategy_used: strategy,
            demand_probability: demand_prob,
            expected_days_to_lease: expected_days,
            revenue_impact_annual: round2(revenue_impact_annual),
            comp_summary: summarize_comps(comps),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Median of comparable prices; mean of the two middle values for an even
/// count. `None` for an empty set.
fn median_comp_price(comps: &[Comparable]) -> Option<f64> {
    if comps.is_empty() {
        return None;
    }
    let mut prices: Vec<f64> = comps.iter().map(|c| c.comp_price).collect();
    prices.sort_by(|a, b| a.total_cmp(b));
    let mid = prices.len() / 2;
    if prices.len() % 2 == 0 {
        Some((prices[mid - 1] + prices[mid]) / 2.0)
    } else {
        Some(prices[mid])
    }
}

fn summarize_comps(comps: &[Comparable]) -> Option<CompSummary> {
    if comps.is_empty() {
        return None;
    }
    let n = comps.len() as f64;
    let prices: Vec<f64> = comps.iter().map(|c| c.comp_price).collect();
    let sum: f64 = prices.iter().sum();
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg_similarity: f64 = comps.iter().map(|c| c.similarity_score).sum::<f64>() / n;

    Some(CompSummary {
        total_comps: comps.len() as u64,
        avg_comp_price: sum / n,
        median_comp_price: median_comp_price(comps).unwrap_or(0.0),
        min_comp_price: min,
        max_comp_price: max,
        avg_similarity_score: avg_similarity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::MAX_PROBABILITY;
    use rentroll_model::{PricingUrgency, UnitStatus};

    fn unit(rent: f64) -> UnitSnapshot {
        UnitSnapshot {
            unit_id: "U-100".to_string(),
            property: "Maple Court".to_string(),
            bed: 2,
            bath: 2.0,
            sqft: 1050.0,
            status: UnitStatus::Vacant,
            advertised_rent: rent,
            market_rent: Some(rent),
            rent_per_sqft: Some(rent / 1050.0),
            move_out_date: None,
            lease_end_date: None,
            days_to_lease_end: None,
            needs_pricing: true,
            rent_premium_pct: None,
            pricing_urgency: PricingUrgency::High,
            unit_type: "2BR".to_string(),
            size_category: None,
            annual_revenue_potential: Some(rent * 12.0),
            has_complete_data: true,
        }
    }

    fn comps(prices: &[f64]) -> Vec<Comparable> {
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| Comparable {
                comp_id: format!("C-{i}"),
                comp_property: "Oak Ridge".to_string(),
                bed: 2,
                bath: 2.0,
                comp_sqft: 1000.0,
                comp_price: *price,
                is_available: true,
                sqft_delta_pct: 4.8,
                price_gap_pct: 0.0,
                similarity_score: 80.0,
                comp_rank: i as u32 + 1,
            })
            .collect()
    }

    fn optimizer() -> PricingOptimizer {
        PricingOptimizer::new(PricingParams::default()).expect("valid params")
    }

    #[test]
    fn revenue_pushes_toward_upper_bound() {
        let u = unit(2000.0);
        let c = comps(&[1950.0, 2000.0, 2050.0]);
        let outcome = optimizer()
            .optimize_unit(&u, &c, OptimizationStrategy::Revenue, None)
            .expect("optimize");

        // Demand stays high enough near the baseline that revenue is
        // maximized at the cap: min(base * 1.25, rent * 1.3) = 2500.
        assert!((outcome.suggested_rent - 2500.0).abs() < 1.0);
        let prob = outcome.demand_probability.expect("probability");
        assert!(prob > 0.9 && prob <= MAX_PROBABILITY);
        assert!(outcome.expected_days_to_lease.is_some());
        assert!(outcome.revenue_impact_annual > 0.0);
    }

    #[test]
    fn leaseup_stays_within_conservative_bounds() {
        let u = unit(2000.0);
        let c = comps(&[1950.0, 2000.0, 2050.0]);
        let outcome = optimizer()
            .optimize_unit(&u, &c, OptimizationStrategy::LeaseUp, None)
            .expect("optimize");

        // Bounds: [max(1500, 1400), min(2250, 2200)] = [1500, 2200], and the
        // whole interval sits at the probability ceiling.
        assert!(outcome.suggested_rent >= 1500.0 - 1.0);
        assert!(outcome.suggested_rent <= 2200.0 + 1.0);
        assert_eq!(outcome.demand_probability, Some(MAX_PROBABILITY));
        assert_eq!(
            outcome.expected_days_to_lease,
            Some((30.0 / MAX_PROBABILITY) as u32)
        );
    }

    #[test]
    fn balanced_blends_between_strategies() {
        let u = unit(2000.0);
        let c = comps(&[1950.0, 2000.0, 2050.0]);
        let opt = optimizer();

        let revenue = opt
            .optimize_unit(&u, &c, OptimizationStrategy::Revenue, None)
            .expect("revenue");
        let pure_revenue_weight = opt
            .optimize_unit(&u, &c, OptimizationStrategy::Balanced, Some(1.0))
            .expect("balanced w=1");
        assert!((pure_revenue_weight.suggested_rent - revenue.suggested_rent).abs() < 1.0);

        let blended = opt
            .optimize_unit(&u, &c, OptimizationStrategy::Balanced, None)
            .expect("balanced");
        assert!(blended.suggested_rent <= revenue.suggested_rent);
    }

    #[test]
    fn empty_comps_pass_rent_through() {
        let u = unit(2000.0);
        let outcome = optimizer()
            .optimize_unit(&u, &[], OptimizationStrategy::Revenue, None)
            .expect("optimize");

        assert_eq!(outcome.suggested_rent, 2000.0);
        assert_eq!(outcome.rent_change, 0.0);
        assert!(outcome.demand_probability.is_none());
        assert!(outcome.expected_days_to_lease.is_none());
        assert!(outcome.comp_summary.is_none());
    }

    #[test]
    fn comp_summary_statistics() {
        let u = unit(2000.0);
        let c = comps(&[1900.0, 2000.0, 2100.0, 2200.0]);
        let outcome = optimizer()
            .optimize_unit(&u, &c, OptimizationStrategy::Balanced, None)
            .expect("optimize");

        let summary = outcome.comp_summary.expect("summary");
        assert_eq!(summary.total_comps, 4);
        assert_eq!(summary.avg_comp_price, 2050.0);
        assert_eq!(summary.median_comp_price, 2050.0);
        assert_eq!(summary.min_comp_price, 1900.0);
        assert_eq!(summary.max_comp_price, 2200.0);
        assert_eq!(summary.avg_similarity_score, 80.0);
    }

    #[test]
    fn rejects_invalid_inputs() {
        let opt = optimizer();
        let c = comps(&[2000.0]);

        let err = opt
            .optimize_unit(&unit(0.0), &c, OptimizationStrategy::Revenue, None)
            .expect_err("zero rent");
        assert!(matches!(err, PricingError::NonPositiveRent { .. }));

        let err = opt
            .optimize_unit(&unit(2000.0), &c, OptimizationStrategy::Balanced, Some(1.5))
            .expect_err("bad weight");
        assert!(matches!(err, PricingError::InvalidWeight(_)));

        assert!(matches!(
            PricingOptimizer::new(PricingParams {
                elasticity: 0.0,
                ..PricingParams::default()
            }),
            Err(PricingError::InvalidElasticity(_))
        ));
        assert!(matches!(
            PricingOptimizer::new(PricingParams {
                max_adjustment: 0.0,
                ..PricingParams::default()
            }),
            Err(PricingError::InvalidMaxAdjustment(_))
        ));
    }

    #[test]
    fn median_handles_even_and_odd_counts() {
        assert_eq!(median_comp_price(&comps(&[3.0, 1.0, 2.0])), Some(2.0));
        assert_eq!(median_comp_price(&comps(&[4.0, 1.0, 2.0, 3.0])), Some(2.5));
        assert_eq!(median_comp_price(&[]), None);
    }
}

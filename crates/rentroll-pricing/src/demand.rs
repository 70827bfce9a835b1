// SPDX-License-Identifier: Apache-2.0

/// Probability floor and ceiling for the linear demand model.
pub const MIN_PROBABILITY: f64 = 0.05;
pub const MAX_PROBABILITY: f64 = 0.95;

/// Baseline leasing window in days. A probability of `p` of leasing within
/// this window maps to `LEASE_WINDOW_DAYS / p` expected vacancy days.
pub const LEASE_WINDOW_DAYS: f64 = 30.0;

/// Linear demand curve: probability of leasing within 30 days as a function
/// of price relative to the comparable-set baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandCurve {
    elasticity: f64,
}

impl DemandCurve {
    #[must_use]
    pub fn new(elasticity: f64) -> Self {
        Self { elasticity }
    }

    #[must_use]
    pub fn elasticity(&self) -> f64 {
        self.elasticity
    }

    /// Leasing probability, clamped to `[0.05, 0.95]`. Returns 0.5 when no
    /// usable baseline exists.
    #[must_use]
    pub fn probability(&self, price: f64, base_price: f64) -> f64 {
        if base_price <= 0.0 {
            return 0.5;
        }
        let price_ratio = (price - base_price) / base_price;
        let prob = 1.0 + self.elasticity * price_ratio * 100.0;
        prob.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
    }

    #[must_use]
    pub fn expected_days_to_lease(&self, price: f64, base_price: f64) -> f64 {
        LEASE_WINDOW_DAYS / self.probability(price, base_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_ELASTICITY;

    #[test]
    fn probability_at_baseline_hits_ceiling() {
        let curve = DemandCurve::new(DEFAULT_ELASTICITY);
        assert_eq!(curve.probability(2000.0, 2000.0), MAX_PROBABILITY);
    }

    #[test]
    fn probability_falls_as_price_rises() {
        let curve = DemandCurve::new(DEFAULT_ELASTICITY);
        let at_base = curve.probability(2000.0, 2000.0);
        let above = curve.probability(2400.0, 2000.0);
        let far_above = curve.probability(3000.0, 2000.0);
        assert!(above < at_base);
        assert!(far_above <= above);
        assert!(far_above >= MIN_PROBABILITY);
    }

    #[test]
    fn probability_without_baseline_is_half() {
        let curve = DemandCurve::new(DEFAULT_ELASTICITY);
        assert_eq!(curve.probability(2000.0, 0.0), 0.5);
        assert_eq!(curve.probability(2000.0, -1.0), 0.5);
    }

    #[test]
    fn expected_days_inverse_of_probability() {
        let curve = DemandCurve::new(DEFAULT_ELASTICITY);
        let p = curve.probability(2200.0, 2000.0);
        let days = curve.expected_days_to_lease(2200.0, 2000.0);
        assert!((days - LEASE_WINDOW_DAYS / p).abs() < 1e-9);
        assert!(days >= LEASE_WINDOW_DAYS / MAX_PROBABILITY);
    }
}

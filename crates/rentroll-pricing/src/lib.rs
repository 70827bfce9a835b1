// SPDX-License-Identifier: Apache-2.0

//! Rent optimization engine: a linear demand curve plus three strategies
//! (revenue maximization, lease-up minimization, weighted blend) solved by
//! bounded scalar minimization.

#![forbid(unsafe_code)]

mod demand;
mod optimizer;
mod solver;

/// Demand sensitivity per percentage point of price deviation from baseline.
pub const DEFAULT_ELASTICITY: f64 = -0.003;
/// Widest allowed move away from the comparable baseline, as a fraction.
pub const DEFAULT_MAX_ADJUSTMENT: f64 = 0.25;

pub use demand::{DemandCurve, LEASE_WINDOW_DAYS, MAX_PROBABILITY, MIN_PROBABILITY};
pub use optimizer::{
    CompSummary, OptimizationOutcome, PricingError, PricingOptimizer, PricingParams,
};
pub use solver::{minimize_scalar, SolverError};

// SPDX-License-Identifier: Apache-2.0

//! Domain model shared by the RentRoll Optimizer crates.
//!
//! Pure data: no I/O, no async. Validation lives next to the types so every
//! consumer (server, pricing engine, tests) agrees on what a well-formed
//! table reference or unit snapshot looks like.

mod analytics;
mod comparable;
mod settings;
mod table;
mod unit;

pub use analytics::{
    MarketPosition, MarketPositionBucket, OpportunitySummary, PortfolioMetrics,
    PropertyPerformance, RentOpportunity, UnitTypePosition, UrgencyCount,
};
pub use comparable::Comparable;
pub use settings::{TableSettings, DEFAULT_COMPETITION_TABLE, DEFAULT_PROJECT_ID, DEFAULT_RENTROLL_TABLE};
pub use table::{TableRef, ValidationError};
pub use unit::{
    OptimizationStrategy, PricingUrgency, UnitFilter, UnitSnapshot, UnitStatus, UnitTypeSummary,
};

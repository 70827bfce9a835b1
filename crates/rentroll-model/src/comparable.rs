// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// One competitor listing paired with a unit, as produced by the mart
/// `unit_competitor_pairs` table. `comp_rank` is 1-based, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparable {
    pub comp_id: String,
    pub comp_property: String,
    pub bed: u32,
    pub bath: f64,
    pub comp_sqft: f64,
    pub comp_price: f64,
    pub is_available: bool,
    pub sqft_delta_pct: f64,
    pub price_gap_pct: f64,
    pub similarity_score: f64,
    pub comp_rank: u32,
}

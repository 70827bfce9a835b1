// SPDX-License-Identifier: Apache-2.0

//! In-memory backend for tests and local development. Mirrors the query
//! semantics of the real backend closely enough that handler tests exercise
//! ordering, filtering, and failure paths without a warehouse.

use async_trait::async_trait;
use rentroll_api::ListUnitsParams;
use rentroll_model::{
    Comparable, MarketPosition, MarketPositionBucket, OpportunitySummary, PortfolioMetrics,
    PricingUrgency, PropertyPerformance, RentOpportunity, TableRef, UnitSnapshot, UnitStatus,
    UnitTypePosition, UnitTypeSummary, UrgencyCount,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::{
    CompPriceStats, ComparablesFetch, MarketPositionAnalytics, PortfolioAnalytics,
    PricingOpportunities, UnitPage, WarehouseBackend, WarehouseError, WarehouseTargets,
};

#[derive(Default)]
pub struct FakeWarehouse {
    units: Mutex<Vec<UnitSnapshot>>,
    comps: Mutex<HashMap<String, Vec<Comparable>>>,
    row_counts: Mutex<HashMap<String, u64>>,
    fail: AtomicBool,
    query_calls: AtomicU64,
    last_targets: Mutex<Option<WarehouseTargets>>,
}

impl FakeWarehouse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_units(&self, units: Vec<UnitSnapshot>) {
        *self.units.lock().await = units;
    }

    pub async fn seed_comps(&self, unit_id: &str, comps: Vec<Comparable>) {
        self.comps.lock().await.insert(unit_id.to_string(), comps);
    }

    pub async fn seed_row_count(&self, table: &str, rows: u64) {
        self.row_counts.lock().await.insert(table.to_string(), rows);
    }

    /// When set, every query returns a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn query_calls(&self) -> u64 {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Targets recorded on the most recent query. Tests use this to assert
    /// that settings changes reach the warehouse without a restart.
    pub async fn last_targets(&self) -> Option<WarehouseTargets> {
        self.last_targets.lock().await.clone()
    }

    async fn begin(&self, targets: &WarehouseTargets) -> Result<(), WarehouseError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_targets.lock().await = Some(targets.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(WarehouseError::Transport(
                "fake warehouse set to fail".to_string(),
            ));
        }
        Ok(())
    }
}

fn comp_stats(comps: &[Comparable]) -> Option<CompPriceStats> {
    if comps.is_empty() {
        return None;
    }
    let mut prices: Vec<f64> = comps.iter().map(|c| c.comp_price).collect();
    prices.sort_by(f64::total_cmp);
    let n = prices.len();
    let sum: f64 = prices.iter().sum();
    let mean = sum / n as f64;
    let median = if n % 2 == 0 {
        (prices[n / 2 - 1] + prices[n / 2]) / 2.0
    } else {
        prices[n / 2]
    };
    let stddev = if n > 1 {
        let var = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(var.sqrt())
    } else {
        None
    };
    Some(CompPriceStats {
        total_comps: n as u64,
        avg_comp_price: mean,
        median_comp_price: median,
        min_comp_price: prices[0],
        max_comp_price: prices[n - 1],
        comp_price_stddev: stddev,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn round0(value: f64) -> f64 {
    value.round()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn order_units(units: &mut [UnitSnapshot]) {
    units.sort_by(|a, b| {
        b.needs_pricing
            .cmp(&a.needs_pricing)
            .then(a.pricing_urgency.cmp(&b.pricing_urgency))
            .then_with(|| a.property.cmp(&b.property))
            .then_with(|| a.unit_id.cmp(&b.unit_id))
    });
}

#[async_trait]
impl WarehouseBackend for FakeWarehouse {
    fn backend_tag(&self) -> &'static str {
        "fake"
    }

    async fn test_connection(&self, targets: &WarehouseTargets) -> bool {
        self.begin(targets).await.is_ok()
    }

    async fn probe_table(
        &self,
        targets: &WarehouseTargets,
        table: &TableRef,
    ) -> Result<u64, WarehouseError> {
        self.begin(targets).await?;
        self.row_counts
            .lock()
            .await
            .get(table.as_str())
            .copied()
            .ok_or_else(|| WarehouseError::Query(format!("table not found: {}", table.as_str())))
    }

    async fn fetch_units(
        &self,
        targets: &WarehouseTargets,
        params: &ListUnitsParams,
    ) -> Result<UnitPage, WarehouseError> {
        self.begin(targets).await?;
        let mut matched: Vec<UnitSnapshot> = self
            .units
            .lock()
            .await
            .iter()
            .filter(|u| params.filter.matches(u))
            .cloned()
            .collect();
        order_units(&mut matched);
        let total_count = matched.len() as u64;
        let units = matched
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.page_size as usize)
            .collect();
        Ok(UnitPage { units, total_count })
    }

    async fn fetch_unit(
        &self,
        targets: &WarehouseTargets,
        unit_id: &str,
    ) -> Result<Option<UnitSnapshot>, WarehouseError> {
        self.begin(targets).await?;
        Ok(self
            .units
            .lock()
            .await
            .iter()
            .find(|u| u.unit_id == unit_id)
            .cloned())
    }

    async fn fetch_comparables(
        &self,
        targets: &WarehouseTargets,
        unit_id: &str,
    ) -> Result<ComparablesFetch, WarehouseError> {
        self.begin(targets).await?;
        let comparables = self
            .comps
            .lock()
            .await
            .get(unit_id)
            .cloned()
            .unwrap_or_default();
        let stats = comp_stats(&comparables);
        Ok(ComparablesFetch { comparables, stats })
    }

    async fn fetch_vacant_units(
        &self,
        targets: &WarehouseTargets,
        limit: usize,
    ) -> Result<Vec<UnitSnapshot>, WarehouseError> {
        self.begin(targets).await?;
        let mut matched: Vec<UnitSnapshot> = self
            .units
            .lock()
            .await
            .iter()
            .filter(|u| u.needs_pricing && u.has_complete_data)
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.pricing_urgency
                .cmp(&b.pricing_urgency)
                .then_with(|| a.property.cmp(&b.property))
                .then_with(|| a.unit_id.cmp(&b.unit_id))
        });
        matched.truncate(limit);
        Ok(matched)
    }

    async fn unit_type_summary(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<Vec<UnitTypeSummary>, WarehouseError> {
        self.begin(targets).await?;
        let units = self.units.lock().await;
        let mut grouped: BTreeMap<String, Vec<&UnitSnapshot>> = BTreeMap::new();
        for unit in units.iter().filter(|u| u.has_complete_data) {
            grouped.entry(unit.unit_type.clone()).or_default().push(unit);
        }
        Ok(grouped
            .into_iter()
            .map(|(unit_type, members)| {
                let n = members.len() as f64;
                UnitTypeSummary {
                    unit_type,
                    total_units: members.len() as u64,
                    units_needing_pricing: members.iter().filter(|u| u.needs_pricing).count()
                        as u64,
                    avg_rent: members.iter().map(|u| u.advertised_rent).sum::<f64>() / n,
                    avg_rent_per_sqft: members
                        .iter()
                        .filter_map(|u| u.rent_per_sqft)
                        .sum::<f64>()
                        / n,
                }
            })
            .collect())
    }

    async fn properties(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<Vec<String>, WarehouseError> {
        self.begin(targets).await?;
        let units = self.units.lock().await;
        let mut names: Vec<String> = units.iter().map(|u| u.property.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn portfolio_analytics(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<PortfolioAnalytics, WarehouseError> {
        self.begin(targets).await?;
        let units = self.units.lock().await;

        let count_status = |status: UnitStatus| {
            units.iter().filter(|u| u.status == status).count() as u64
        };
        let rents_for = |status: UnitStatus| -> Vec<f64> {
            units
                .iter()
                .filter(|u| u.status == status)
                .map(|u| u.advertised_rent)
                .collect()
        };
        let per_sqft: Vec<f64> = units.iter().filter_map(|u| u.rent_per_sqft).collect();
        let portfolio = PortfolioMetrics {
            total_units: units.len() as u64,
            vacant_units: count_status(UnitStatus::Vacant),
            occupied_units: count_status(UnitStatus::Occupied),
            notice_units: count_status(UnitStatus::Notice),
            units_needing_pricing: units.iter().filter(|u| u.needs_pricing).count() as u64,
            total_revenue_potential: units
                .iter()
                .filter_map(|u| u.annual_revenue_potential)
                .sum(),
            current_annual_revenue: rents_for(UnitStatus::Occupied)
                .iter()
                .map(|rent| rent * 12.0)
                .sum(),
            avg_rent_per_sqft: mean(&per_sqft).unwrap_or(0.0),
            avg_occupied_rent: mean(&rents_for(UnitStatus::Occupied)),
            avg_vacant_rent: mean(&rents_for(UnitStatus::Vacant)),
            occupancy_rate: 0.0,
            revenue_optimization_potential: 0.0,
        }
        .with_derived();

        let mut by_urgency: BTreeMap<PricingUrgency, u64> = BTreeMap::new();
        for unit in units.iter().filter(|u| u.needs_pricing) {
            *by_urgency.entry(unit.pricing_urgency).or_default() += 1;
        }
        let urgency_breakdown = by_urgency
            .into_iter()
            .map(|(pricing_urgency, unit_count)| UrgencyCount {
                pricing_urgency,
                unit_count,
            })
            .collect();

        let mut by_property: BTreeMap<String, Vec<&UnitSnapshot>> = BTreeMap::new();
        for unit in units.iter() {
            by_property.entry(unit.property.clone()).or_default().push(unit);
        }
        let mut property_performance: Vec<PropertyPerformance> = by_property
            .into_iter()
            .map(|(property, members)| {
                let rents: Vec<f64> = members.iter().map(|u| u.advertised_rent).collect();
                let per_sqft: Vec<f64> =
                    members.iter().filter_map(|u| u.rent_per_sqft).collect();
                PropertyPerformance {
                    property,
                    total_units: members.len() as u64,
                    vacant_units: members
                        .iter()
                        .filter(|u| u.status == UnitStatus::Vacant)
                        .count() as u64,
                    avg_rent: round2(mean(&rents).unwrap_or(0.0)),
                    avg_rent_per_sqft: round2(mean(&per_sqft).unwrap_or(0.0)),
                    revenue_potential: members
                        .iter()
                        .filter_map(|u| u.annual_revenue_potential)
                        .sum(),
                }
            })
            .collect();
        property_performance
            .sort_by(|a, b| b.revenue_potential.total_cmp(&a.revenue_potential));
        property_performance.truncate(10);

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
        self.begin(targets).await?;
        let units = self.units.lock().await;
        let comps = self.comps.lock().await;

        // (position, premium pct, rent) for every unit that has comps.
        let mut positioned: Vec<(MarketPosition, f64, f64, &UnitSnapshot, f64)> = Vec::new();
        for unit in units.iter() {
            let Some(list) = comps.get(&unit.unit_id).filter(|l| !l.is_empty()) else {
                continue;
            };
            let prices: Vec<f64> = list.iter().map(|c| c.comp_price).collect();
            let avg = mean(&prices).unwrap_or(0.0);
            let premium = round1((unit.advertised_rent - avg) / avg * 100.0);
            let per_sqft: Vec<f64> = list.iter().map(|c| c.comp_price / c.comp_sqft).collect();
            positioned.push((
                MarketPosition::classify(unit.advertised_rent, avg),
                premium,
                unit.advertised_rent,
                unit,
                mean(&per_sqft).unwrap_or(0.0),
            ));
        }

        let mut buckets: BTreeMap<MarketPosition, Vec<(f64, f64)>> = BTreeMap::new();
        for (position, premium, rent, _, _) in &positioned {
            buckets.entry(*position).or_default().push((*premium, *rent));
        }
        let market_summary = buckets
            .into_iter()
            .map(|(market_position, members)| {
                let premiums: Vec<f64> = members.iter().map(|(p, _)| *p).collect();
                let rents: Vec<f64> = members.iter().map(|(_, r)| *r).collect();
                MarketPositionBucket {
                    market_position,
                    unit_count: members.len() as u64,
                    avg_premium_discount_pct: mean(&premiums).unwrap_or(0.0),
                    avg_rent: mean(&rents).unwrap_or(0.0),
                }
            })
            .collect();

        let mut by_type: BTreeMap<String, Vec<(&UnitSnapshot, f64)>> = BTreeMap::new();
        for (_, _, _, unit, market_per_sqft) in &positioned {
            by_type
                .entry(unit.unit_type.clone())
                .or_default()
                .push((*unit, *market_per_sqft));
        }
        let unit_type_comparison = by_type
            .into_iter()
            .map(|(unit_type, members)| {
                let ours: Vec<f64> = members.iter().filter_map(|(u, _)| u.rent_per_sqft).collect();
                let market: Vec<f64> = members.iter().map(|(_, m)| *m).collect();
                UnitTypePosition {
                    unit_type,
                    total_units: members.len() as u64,
                    our_avg_rent_per_sqft: mean(&ours).unwrap_or(0.0),
                    market_avg_rent_per_sqft: mean(&market).unwrap_or(0.0),
                }
            })
            .collect();

        Ok(MarketPositionAnalytics {
            market_summary,
            unit_type_comparison,
        })
    }

    async fn pricing_opportunities(
        &self,
        targets: &WarehouseTargets,
    ) -> Result<PricingOpportunities, WarehouseError> {
        self.begin(targets).await?;
        let units = self.units.lock().await;
        let comps = self.comps.lock().await;

        let mut gaps: Vec<RentOpportunity> = Vec::new();
        for unit in units.iter() {
            let Some(list) = comps.get(&unit.unit_id).filter(|l| !l.is_empty()) else {
                continue;
            };
            let prices: Vec<f64> = list.iter().map(|c| c.comp_price).collect();
            let avg = mean(&prices).unwrap_or(0.0);
            gaps.push(RentOpportunity {
                unit_id: unit.unit_id.clone(),
                property: unit.property.clone(),
                unit_type: unit.unit_type.clone(),
                status: unit.status,
                advertised_rent: unit.advertised_rent,
                pricing_urgency: unit.pricing_urgency,
                days_to_lease_end: unit.days_to_lease_end,
                avg_comp_price: avg,
                potential_rent_increase: round0(avg - unit.advertised_rent),
                annual_revenue_opportunity: round0((avg - unit.advertised_rent) * 12.0),
            });
        }

        let positives: Vec<f64> = gaps
            .iter()
            .map(|g| g.potential_rent_increase)
            .filter(|p| *p > 0.0)
            .collect();
        let summary = OpportunitySummary {
            units_with_50plus_opportunity: positives.iter().filter(|p| **p > 50.0).count() as u64,
            units_with_100plus_opportunity: positives.iter().filter(|p| **p > 100.0).count()
                as u64,
            total_monthly_opportunity: positives.iter().sum(),
            total_annual_opportunity: positives.iter().map(|p| p * 12.0).sum(),
            avg_opportunity_per_unit: mean(&positives),
        };

        let mut top_opportunities: Vec<RentOpportunity> = gaps
            .into_iter()
            .filter(|g| g.potential_rent_increase > 0.0)
            .collect();
        top_opportunities.sort_by(|a, b| {
            b.annual_revenue_opportunity
                .total_cmp(&a.annual_revenue_opportunity)
        });
        top_opportunities.truncate(20);

        Ok(PricingOpportunities {
            summary,
            top_opportunities,
        })
    }
}

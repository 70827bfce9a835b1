// SPDX-License-Identifier: Apache-2.0

//! SQL text for the mart queries. Table references are validated newtypes;
//! string parameters pass through [`escape_str`] before interpolation.

use super::WarehouseTargets;
use rentroll_api::ListUnitsParams;
use rentroll_model::TableRef;

const UNIT_COLUMNS: &str = "unit_id, property, bed, bath, sqft, status, advertised_rent, \
     market_rent, rent_per_sqft, move_out_date, lease_end_date, days_to_lease_end, \
     needs_pricing, rent_premium_pct, pricing_urgency, unit_type, size_category, \
     annual_revenue_potential, has_complete_data";

/// Double single quotes and drop control characters. Backslashes are doubled
/// too, standard-SQL strings treat them literally otherwise.
#[must_use]
pub fn escape_str(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .flat_map(|c| match c {
            '\'' => vec!['\'', '\''],
            '\\' => vec!['\\', '\\'],
            other => vec![other],
        })
        .collect()
}

fn unit_where_clause(params: &ListUnitsParams) -> String {
    let mut conditions = vec!["has_complete_data = TRUE".to_string()];
    if let Some(status) = params.filter.status {
        conditions.push(format!("status = '{}'", status.as_str()));
    }
    if let Some(property) = &params.filter.property {
        conditions.push(format!("property = '{}'", escape_str(property)));
    }
    if params.filter.needs_pricing_only {
        conditions.push("needs_pricing = TRUE".to_string());
    }
    conditions.join(" AND ")
}

#[must_use]
pub fn count_units(targets: &WarehouseTargets, params: &ListUnitsParams) -> String {
    format!(
        "SELECT COUNT(*) AS total_count FROM {} WHERE {}",
        targets.unit_snapshot.quoted(),
        unit_where_clause(params)
    )
}

#[must_use]
pub fn select_units(targets: &WarehouseTargets, params: &ListUnitsParams) -> String {
    format!(
        "SELECT {UNIT_COLUMNS} FROM {} WHERE {} \
         ORDER BY CASE WHEN needs_pricing THEN 0 ELSE 1 END, pricing_urgency DESC, property, unit_id \
         LIMIT {} OFFSET {}",
        targets.unit_snapshot.quoted(),
        unit_where_clause(params),
        params.page_size,
        params.offset()
    )
}

#[must_use]
pub fn select_unit(targets: &WarehouseTargets, unit_id: &str) -> String {
    format!(
        "SELECT {UNIT_COLUMNS} FROM {} WHERE unit_id = '{}'",
        targets.unit_snapshot.quoted(),
        escape_str(unit_id)
    )
}

#[must_use]
pub fn select_comparables(
    targets: &WarehouseTargets,
    unit_id: &str,
    similarity_threshold: f64,
    max_comps: usize,
) -> String {
    format!(
        "SELECT comp_id, comp_property, bed, bath, comp_sqft, comp_price, is_available, \
         sqft_delta_pct, price_gap_pct, similarity_score, comp_rank, total_comps, \
         avg_comp_price, median_comp_price, min_comp_price, max_comp_price, comp_price_stddev \
         FROM {} WHERE unit_id = '{}' AND similarity_score >= {similarity_threshold} \
         ORDER BY comp_rank LIMIT {max_comps}",
        targets.unit_competitor_pairs.quoted(),
        escape_str(unit_id)
    )
}

#[must_use]
pub fn select_vacant_units(targets: &WarehouseTargets, limit: usize) -> String {
    format!(
        "SELECT {UNIT_COLUMNS} FROM {} WHERE needs_pricing = TRUE AND has_complete_data = TRUE \
         ORDER BY CASE WHEN pricing_urgency = 'IMMEDIATE' THEN 0 \
         WHEN pricing_urgency = 'HIGH' THEN 1 \
         WHEN pricing_urgency = 'MEDIUM' THEN 2 ELSE 3 END, property, unit_id LIMIT {limit}",
        targets.unit_snapshot.quoted()
    )
}

#[must_use]
pub fn unit_type_summary(targets: &WarehouseTargets) -> String {
    format!(
        "SELECT unit_type, COUNT(*) AS total_units, \
         SUM(CASE WHEN needs_pricing THEN 1 ELSE 0 END) AS units_needing_pricing, \
         AVG(advertised_rent) AS avg_rent, AVG(rent_per_sqft) AS avg_rent_per_sqft \
         FROM {} WHERE has_complete_data = TRUE GROUP BY unit_type ORDER BY unit_type",
        targets.unit_snapshot.quoted()
    )
}

#[must_use]
pub fn select_properties(targets: &WarehouseTargets) -> String {
    format!(
        "SELECT DISTINCT property FROM {} WHERE property IS NOT NULL ORDER BY property",
        targets.unit_snapshot.quoted()
    )
}

#[must_use]
pub fn probe_count(table: &TableRef) -> String {
    format!("SELECT COUNT(*) AS row_count FROM {}", table.quoted())
}

#[must_use]
pub fn portfolio_metrics(targets: &WarehouseTargets) -> String {
    format!(
        "SELECT COUNT(*) AS total_units, \
         SUM(CASE WHEN status = 'VACANT' THEN 1 ELSE 0 END) AS vacant_units, \
         SUM(CASE WHEN status = 'OCCUPIED' THEN 1 ELSE 0 END) AS occupied_units, \
         SUM(CASE WHEN status = 'NOTICE' THEN 1 ELSE 0 END) AS notice_units, \
         SUM(CASE WHEN needs_pricing THEN 1 ELSE 0 END) AS units_needing_pricing, \
         SUM(annual_revenue_potential) AS total_revenue_potential, \
         SUM(CASE WHEN status = 'OCCUPIED' THEN advertised_rent * 12 ELSE 0 END) AS current_annual_revenue, \
         AVG(rent_per_sqft) AS avg_rent_per_sqft, \
         AVG(CASE WHEN status = 'OCCUPIED' THEN advertised_rent ELSE NULL END) AS avg_occupied_rent, \
         AVG(CASE WHEN status = 'VACANT' THEN advertised_rent ELSE NULL END) AS avg_vacant_rent \
         FROM {}",
        targets.unit_snapshot.quoted()
    )
}

#[must_use]
pub fn urgency_breakdown(targets: &WarehouseTargets) -> String {
    format!(
        "SELECT pricing_urgency, COUNT(*) AS unit_count FROM {} \
         WHERE needs_pricing = TRUE GROUP BY pricing_urgency",
        targets.unit_snapshot.quoted()
    )
}

#[must_use]
pub fn property_performance(targets: &WarehouseTargets) -> String {
    format!(
        "SELECT property, COUNT(*) AS total_units, \
         SUM(CASE WHEN status = 'VACANT' THEN 1 ELSE 0 END) AS vacant_units, \
         ROUND(AVG(advertised_rent), 2) AS avg_rent, \
         ROUND(AVG(rent_per_sqft), 2) AS avg_rent_per_sqft, \
         SUM(annual_revenue_potential) AS revenue_potential \
         FROM {} GROUP BY property ORDER BY revenue_potential DESC LIMIT 10",
        targets.unit_snapshot.quoted()
    )
}

/// Subquery averaging comp prices per unit, joined against the snapshot by
/// the market-position and opportunity queries.
fn comp_averages(targets: &WarehouseTargets) -> String {
    format!(
        "(SELECT unit_id, AVG(comp_price) AS avg_comp_price, \
         AVG(comp_price / comp_sqft) AS avg_comp_price_per_sqft \
         FROM {} GROUP BY unit_id)",
        targets.unit_competitor_pairs.quoted()
    )
}

#[must_use]
pub fn market_summary(targets: &WarehouseTargets) -> String {
    format!(
        "WITH unit_positions AS (\
         SELECT u.advertised_rent, \
         CASE WHEN u.advertised_rent > c.avg_comp_price THEN 'ABOVE_MARKET' \
         WHEN u.advertised_rent < c.avg_comp_price * 0.95 THEN 'BELOW_MARKET' \
         ELSE 'AT_MARKET' END AS market_position, \
         ROUND((u.advertised_rent - c.avg_comp_price) / c.avg_comp_price * 100, 1) AS premium_discount_pct \
         FROM {} u JOIN {} c ON u.unit_id = c.unit_id) \
         SELECT market_position, COUNT(*) AS unit_count, \
         AVG(premium_discount_pct) AS avg_premium_discount_pct, \
         AVG(advertised_rent) AS avg_rent \
         FROM unit_positions GROUP BY market_position ORDER BY market_position",
        targets.unit_snapshot.quoted(),
        comp_averages(targets)
    )
}

#[must_use]
pub fn unit_type_position(targets: &WarehouseTargets) -> String {
    format!(
        "SELECT u.unit_type, COUNT(*) AS total_units, \
         AVG(u.rent_per_sqft) AS our_avg_rent_per_sqft, \
         AVG(c.avg_comp_price_per_sqft) AS market_avg_rent_per_sqft \
         FROM {} u JOIN {} c ON u.unit_id = c.unit_id \
         GROUP BY u.unit_type ORDER BY u.unit_type",
        targets.unit_snapshot.quoted(),
        comp_averages(targets)
    )
}

#[must_use]
pub fn opportunity_summary(targets: &WarehouseTargets) -> String {
    format!(
        "WITH gaps AS (\
         SELECT ROUND(c.avg_comp_price - u.advertised_rent, 0) AS potential_rent_increase \
         FROM {} u JOIN {} c ON u.unit_id = c.unit_id) \
         SELECT \
         SUM(CASE WHEN potential_rent_increase > 50 THEN 1 ELSE 0 END) AS units_with_50plus_opportunity, \
         SUM(CASE WHEN potential_rent_increase > 100 THEN 1 ELSE 0 END) AS units_with_100plus_opportunity, \
         SUM(CASE WHEN potential_rent_increase > 0 THEN potential_rent_increase ELSE 0 END) AS total_monthly_opportunity, \
         SUM(CASE WHEN potential_rent_increase > 0 THEN potential_rent_increase * 12 ELSE 0 END) AS total_annual_opportunity, \
         AVG(CASE WHEN potential_rent_increase > 0 THEN potential_rent_increase ELSE NULL END) AS avg_opportunity_per_unit \
         FROM gaps",
        targets.unit_snapshot.quoted(),
        comp_averages(targets)
    )
}

#[must_use]
pub fn top_opportunities(targets: &WarehouseTargets, limit: usize) -> String {
    format!(
        "SELECT u.unit_id, u.property, u.unit_type, u.status, u.advertised_rent, \
         u.pricing_urgency, u.days_to_lease_end, c.avg_comp_price, \
         ROUND(c.avg_comp_price - u.advertised_rent, 0) AS potential_rent_increase, \
         ROUND((c.avg_comp_price - u.advertised_rent) * 12, 0) AS annual_revenue_opportunity \
         FROM {} u JOIN {} c ON u.unit_id = c.unit_id \
         WHERE c.avg_comp_price > u.advertised_rent \
         ORDER BY annual_revenue_opportunity DESC LIMIT {limit}",
        targets.unit_snapshot.quoted(),
        comp_averages(targets)
    )
}

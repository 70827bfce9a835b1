// SPDX-License-Identifier: Apache-2.0

use crate::errors::ApiError;
use rentroll_model::{UnitFilter, UnitStatus};
use std::collections::BTreeMap;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUnitsParams {
    pub page: u32,
    pub page_size: u32,
    pub filter: UnitFilter,
}

impl ListUnitsParams {
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

pub fn parse_list_units_params(
    query: &BTreeMap<String, String>,
) -> Result<ListUnitsParams, ApiError> {
    let page = match query.get("page") {
        Some(raw) => {
            let value = raw
                .parse::<u32>()
                .map_err(|_| ApiError::invalid_param("page", raw))?;
            if value == 0 {
                return Err(ApiError::invalid_param("page", raw));
            }
            value
        }
        None => 1,
    };

    let page_size = match query.get("page_size") {
        Some(raw) => {
            let value = raw
                .parse::<u32>()
                .map_err(|_| ApiError::invalid_param("page_size", raw))?;
            if value == 0 || value > MAX_PAGE_SIZE {
                return Err(ApiError::invalid_param("page_size", raw));
            }
            value
        }
        None => DEFAULT_PAGE_SIZE,
    };

    let status = match query.get("status") {
        Some(raw) => Some(
            UnitStatus::parse(raw).map_err(|_| ApiError::invalid_param("status", raw))?,
        ),
        None => None,
    };

    let needs_pricing_only = query
        .get("needs_pricing_only")
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    Ok(ListUnitsParams {
        page,
        page_size,
        filter: UnitFilter {
            status,
            property: query.get("property").cloned(),
            needs_pricing_only,
        },
    })
}

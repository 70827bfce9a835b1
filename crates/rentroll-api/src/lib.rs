// SPDX-License-Identifier: Apache-2.0

//! Wire contract for the RentRoll Optimizer HTTP API.
//!
//! Request/response DTOs, the error envelope, and query-parameter parsing.
//! No I/O: the server crate owns transport and status-code mapping.

#![forbid(unsafe_code)]

mod dto;
mod errors;
mod params;

pub const CRATE_NAME: &str = "rentroll-api";

pub use dto::{
    BatchOptimizeRequestDto, BatchOptimizeResponseDto, CompSummaryDto, ComparablesResponseDto,
    ConnectionTestResponseDto, HealthDto, MarketPositionResponseDto, OptimizationResultDto,
    OptimizeRequestDto, OptimizeResponseDto, PortfolioAnalyticsResponseDto,
    PricingOpportunitiesResponseDto, PropertiesResponseDto, SaveSettingsResponseDto,
    SettingsResponseDto, SettingsUpdateDto, SummaryResponseDto, TableTestResultDto,
    UnitsListResponseDto, DEFAULT_BATCH_MAX_UNITS,
};
pub use errors::{ApiError, ApiErrorCode};
pub use params::{
    parse_list_units_params, ListUnitsParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

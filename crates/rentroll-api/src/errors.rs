// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ApiErrorCode {
    InvalidQueryParameter,
    InvalidRequestBody,
    UnitNotFound,
    SettingsRejected,
    WarehouseUnavailable,
    Internal,
}

/// Wire-stable error envelope. Every non-2xx response carries one of these
/// under the top-level `error` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn invalid_param(name: &str, value: &str) -> Self {
        Self::new(
            ApiErrorCode::InvalidQueryParameter,
            format!("invalid query parameter: {name}"),
            json!({"parameter": name, "value": value}),
        )
    }

    #[must_use]
    pub fn invalid_body(reason: &str) -> Self {
        Self::new(
            ApiErrorCode::InvalidRequestBody,
            "invalid request body",
            json!({"reason": reason}),
        )
    }

    #[must_use]
    pub fn unit_not_found(unit_id: &str) -> Self {
        Self::new(
            ApiErrorCode::UnitNotFound,
            format!("unit not found: {unit_id}"),
            json!({"unit_id": unit_id}),
        )
    }

    #[must_use]
    pub fn settings_rejected(reason: &str) -> Self {
        Self::new(
            ApiErrorCode::SettingsRejected,
            "settings rejected",
            json!({"reason": reason}),
        )
    }

    #[must_use]
    pub fn warehouse_unavailable(reason: &str) -> Self {
        Self::new(
            ApiErrorCode::WarehouseUnavailable,
            "data warehouse unavailable",
            json!({"reason": reason}),
        )
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::new(ApiErrorCode::Internal, "internal error", json!({}))
    }
}

// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::table::{TableRef, ValidationError};

pub const DEFAULT_PROJECT_ID: &str = "rentroll-ai";
pub const DEFAULT_RENTROLL_TABLE: &str = "rentroll-ai.rentroll.Update_7_8_native";
pub const DEFAULT_COMPETITION_TABLE: &str = "rentroll-ai.rentroll.Competition";

/// The operator-tunable warehouse coordinates. These are the keys governed
/// by the layered configuration policy: settings surface over environment
/// over these compiled defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSettings {
    pub project_id: String,
    pub rentroll_table: TableRef,
    pub competition_table: TableRef,
}

impl TableSettings {
    pub fn new(
        project_id: &str,
        rentroll_table: &str,
        competition_table: &str,
    ) -> Result<Self, ValidationError> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(ValidationError("project id must not be empty".to_string()));
        }
        if !project_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ValidationError(
                "project id must match [A-Za-z0-9_-]+".to_string(),
            ));
        }
        Ok(Self {
            project_id: project_id.to_string(),
            rentroll_table: TableRef::parse(rentroll_table)?,
            competition_table: TableRef::parse(competition_table)?,
        })
    }
}

impl Default for TableSettings {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROJECT_ID,
            DEFAULT_RENTROLL_TABLE,
            DEFAULT_COMPETITION_TABLE,
        )
        .expect("compiled defaults are valid")
    }
}

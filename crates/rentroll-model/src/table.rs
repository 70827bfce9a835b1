// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

const TABLE_PART_MAX_LEN: usize = 128;

/// Fully-qualified warehouse table reference: `project.dataset.table`.
///
/// The dataset and table segments accept the characters BigQuery allows in
/// identifiers; the project segment additionally accepts `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TableRef(String);

impl TableRef {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError("table reference must not be empty".to_string()));
        }
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(ValidationError(
                "table reference must be project.dataset.table".to_string(),
            ));
        }
        let (project, dataset, table) = (parts[0], parts[1], parts[2]);
        validate_part("project", project, true)?;
        validate_part("dataset", dataset, false)?;
        validate_part("table", table, false)?;
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn project(&self) -> &str {
        self.0.split('.').next().unwrap_or("")
    }

    /// Backtick-quoted form for SQL interpolation.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("`{}`", self.0)
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_part(name: &str, value: &str, allow_dash: bool) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError(format!("table {name} segment must not be empty")));
    }
    if value.len() > TABLE_PART_MAX_LEN {
        return Err(ValidationError(format!(
            "table {name} segment exceeds max length {TABLE_PART_MAX_LEN}"
        )));
    }
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_dash && c == '-'));
    if !ok {
        let charset = if allow_dash { "[A-Za-z0-9_-]" } else { "[A-Za-z0-9_]" };
        return Err(ValidationError(format!(
            "table {name} segment must match {charset}+"
        )));
    }
    Ok(())
}

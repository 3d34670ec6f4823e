use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::Status;
use super::timestamp;

/// One entry of a ticket's change log, stored in the ticket's `log` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub user: String,
    #[serde(with = "timestamp::required")]
    pub timestamp: DateTime<Utc>,
    pub field: String,
    #[serde(default)]
    pub old_value: Value,
    #[serde(default)]
    pub new_value: Value,
}

impl AuditEntry {
    /// Generic field change.
    #[must_use]
    pub fn field_change(
        user: &str,
        timestamp: DateTime<Utc>,
        field: &str,
        old_value: Value,
        new_value: Value,
    ) -> Self {
        Self {
            user: user.to_string(),
            timestamp,
            field: field.to_string(),
            old_value,
            new_value,
        }
    }

    /// Entry recorded alongside every applied status patch.
    #[must_use]
    pub fn status_change(user: &str, timestamp: DateTime<Utc>, old: Status, new: Status) -> Self {
        Self::field_change(
            user,
            timestamp,
            "status",
            Value::from(old.as_str()),
            Value::from(new.as_str()),
        )
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::audit::AuditEntry;
use super::status::Status;
use super::timestamp;

/// Backend-assigned ticket identity.
pub type TicketId = i64;

/// A ticket row as held in the client cache.
///
/// Unknown columns land in `extra` so that a shallow merge or a write-back
/// never drops data the client does not model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    pub id: TicketId,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    pub project_id: Option<i64>,
    /// Display name joined from the project list; never written back.
    #[serde(deserialize_with = "null_as_default")]
    pub project_name: String,
    pub epic: Option<String>,
    pub assignee: Option<String>,
    pub created_by: Option<String>,
    #[serde(with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp::option")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp::option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Raw change log. Kept as JSON so entries written by other clients in
    /// shapes this crate does not know survive a write-back.
    #[serde(deserialize_with = "null_as_default")]
    pub log: Vec<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Ticket {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            description: None,
            status: Status::Open,
            priority: None,
            ticket_type: None,
            project_id: None,
            project_name: String::new(),
            epic: None,
            assignee: None,
            created_by: None,
            created_at: None,
            assigned_at: None,
            started_at: None,
            completed_at: None,
            updated_at: None,
            log: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl Ticket {
    /// Decode a backend row.
    ///
    /// # Errors
    ///
    /// Returns the serde error when a modeled column has an unusable value.
    pub fn from_row(row: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(row)
    }

    /// Encode as a JSON object, including local enrichment.
    #[must_use]
    pub fn to_object(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Log entries that parse as [`AuditEntry`].
    #[must_use]
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.log
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect()
    }

    /// The log column with `entry` appended, ready to send in an update.
    #[must_use]
    pub fn log_with(&self, entry: &AuditEntry) -> Vec<Value> {
        let mut log = self.log.clone();
        if let Ok(value) = serde_json::to_value(entry) {
            log.push(value);
        }
        log
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fields collected for a ticket about to be inserted. The backend assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl TicketDraft {
    /// Names of required fields that are missing or blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.project_id.is_none() {
            missing.push("project_id");
        }
        missing
    }

    /// Build the insert row: creator, creation time and, when an assignee is
    /// set, the assignment time.
    #[must_use]
    pub fn into_row(self, creator: &str, now: DateTime<Utc>) -> Value {
        let status = self.status.unwrap_or_default();
        let mut row = Map::new();
        row.insert("title".into(), Value::from(self.title.trim()));
        row.insert("status".into(), Value::from(status.as_str()));
        row.insert("created_by".into(), Value::from(creator));
        row.insert("created_at".into(), Value::from(now.to_rfc3339()));

        let optional = [
            ("description", self.description),
            ("priority", self.priority),
            ("type", self.ticket_type),
            ("epic", self.epic),
        ];
        for (column, value) in optional {
            if let Some(value) = value {
                row.insert(column.into(), Value::from(value));
            }
        }
        if let Some(project_id) = self.project_id {
            row.insert("project_id".into(), Value::from(project_id));
        }
        if let Some(assignee) = self.assignee {
            row.insert("assignee".into(), Value::from(assignee));
            row.insert("assigned_at".into(), Value::from(now.to_rfc3339()));
        }
        if status == Status::InProgress || status.is_terminal() {
            row.insert("started_at".into(), Value::from(now.to_rfc3339()));
        }
        if status.is_terminal() {
            row.insert("completed_at".into(), Value::from(now.to_rfc3339()));
        }
        Value::Object(row)
    }
}

//! Change notification normalization.
//!
//! The change channel delivers loosely typed JSON whose spelling depends on
//! the delivery path. Client libraries hand out
//! `{"eventType": "UPDATE", "new": {...}, "old": {...}}`; the raw socket and
//! webhook paths use `{"type": "UPDATE", "record": {...}, "old_record": {...}}`,
//! possibly wrapped in `payload`/`data` envelopes. Row columns may be camelCase
//! or snake_case.
//!
//! Everything is mapped to one canonical [`ChangeNotification`] here, once,
//! before any merge logic runs.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::ErrorCode;
use crate::model::TicketId;

const KIND_KEYS: [&str; 3] = ["eventType", "type", "event_type"];
const NEW_ROW_KEYS: [&str; 2] = ["new", "record"];
const OLD_ROW_KEYS: [&str; 2] = ["old", "old_record"];
const ENVELOPE_KEYS: [&str; 2] = ["payload", "data"];
const MAX_ENVELOPE_DEPTH: usize = 3;
/// Integer columns that some delivery paths send as text.
const INTEGER_COLUMNS: [&str; 1] = ["project_id"];

/// `(alternate spelling, canonical column)`.
const COLUMN_ALIASES: [(&str, &str); 9] = [
    ("projectId", "project_id"),
    ("createdAt", "created_at"),
    ("assignedAt", "assigned_at"),
    ("startedAt", "started_at"),
    ("completedAt", "completed_at"),
    ("updatedAt", "updated_at"),
    ("createdBy", "created_by"),
    ("ticketType", "type"),
    ("projectName", "project_name"),
];

/// Row-level change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized row payload: canonical column names, numeric id.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: TicketId,
    pub fields: Map<String, Value>,
}

/// A change notification after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotification {
    Insert(Row),
    Update(Row),
    Delete { id: TicketId },
}

/// Why a payload could not be normalized. Such payloads are logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedNotification {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no event kind")]
    MissingKind,
    #[error("unknown event kind '{0}'")]
    UnknownKind(String),
    #[error("{0} payload has no row")]
    MissingRow(ChangeKind),
    #[error("{0} row has no usable id")]
    MissingId(ChangeKind),
}

impl MalformedNotification {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::MalformedNotification
    }
}

impl ChangeNotification {
    /// Normalize a raw channel payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedNotification`] when the kind is missing or unknown,
    /// an insert/update carries no row, or the relevant row has no usable id.
    pub fn from_payload(payload: &Value) -> Result<Self, MalformedNotification> {
        let object = unwrap_envelope(payload)?;

        let kind_raw = KIND_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .ok_or(MalformedNotification::MissingKind)?;
        let kind = ChangeKind::parse(kind_raw)
            .ok_or_else(|| MalformedNotification::UnknownKind(kind_raw.to_string()))?;

        match kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let row = first_row(object, &NEW_ROW_KEYS)
                    .ok_or(MalformedNotification::MissingRow(kind))?;
                let row = normalize_row(row).ok_or(MalformedNotification::MissingId(kind))?;
                Ok(if kind == ChangeKind::Insert {
                    Self::Insert(row)
                } else {
                    Self::Update(row)
                })
            }
            ChangeKind::Delete => {
                let old = first_row(object, &OLD_ROW_KEYS)
                    .ok_or(MalformedNotification::MissingRow(kind))?;
                let id = old
                    .get("id")
                    .and_then(parse_id)
                    .ok_or(MalformedNotification::MissingId(kind))?;
                Ok(Self::Delete { id })
            }
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TicketId {
        match self {
            Self::Insert(row) | Self::Update(row) => row.id,
            Self::Delete { id } => *id,
        }
    }
}

fn unwrap_envelope(payload: &Value) -> Result<&Map<String, Value>, MalformedNotification> {
    let mut object = payload
        .as_object()
        .ok_or(MalformedNotification::NotAnObject)?;

    for _ in 0..MAX_ENVELOPE_DEPTH {
        if KIND_KEYS.iter().any(|key| object.contains_key(*key)) {
            break;
        }
        let inner = ENVELOPE_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_object));
        match inner {
            Some(inner) => object = inner,
            None => break,
        }
    }

    Ok(object)
}

/// First non-empty object under any of `keys`.
fn first_row<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_object))
        .find(|row| !row.is_empty())
}

fn parse_id(value: &Value) -> Option<TicketId> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// `"7"` becomes `7` and a blank string becomes null. Anything else is left
/// for the row decoder to judge.
fn coerce_integer(value: &mut Value) {
    let Value::String(text) = value else {
        return;
    };
    let text = text.trim();
    if text.is_empty() {
        *value = Value::Null;
    } else if let Ok(number) = text.parse::<i64>() {
        *value = Value::from(number);
    }
}

/// Canonicalize column names and the id. `None` when the row has no usable id.
fn normalize_row(raw: &Map<String, Value>) -> Option<Row> {
    let id = raw.get("id").and_then(parse_id)?;

    let mut fields = raw.clone();
    for (alias, canonical) in COLUMN_ALIASES {
        if let Some(value) = fields.remove(alias) {
            fields.entry(canonical.to_string()).or_insert(value);
        }
    }
    for column in INTEGER_COLUMNS {
        if let Some(value) = fields.get_mut(column) {
            coerce_integer(value);
        }
    }
    fields.insert("id".into(), Value::from(id));

    Some(Row { id, fields })
}

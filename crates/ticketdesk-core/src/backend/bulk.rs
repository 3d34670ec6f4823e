use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::model::TicketId;

/// One row of a bulk mutation: the columns to write for ticket `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdate {
    pub id: TicketId,
    pub updates: Map<String, Value>,
}

/// Argument object for the bulk update function: `{"updates": [...]}`.
#[must_use]
pub fn bulk_payload(updates: &[BulkUpdate]) -> Value {
    json!({ "updates": updates })
}

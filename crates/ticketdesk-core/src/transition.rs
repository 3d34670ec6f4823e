//! Status transition resolver.
//!
//! A status change is always written together with the lifecycle timestamps
//! it implies. [`resolve`] maps `(old status, new status)` plus the ticket's
//! current `started_at`/`completed_at` to the full set of field writes so that
//! a ticket's timestamps stay consistent with its status:
//!
//! - a ticket in a terminal status (Cancelled, Rejected, Completed) has both
//!   `started_at` and `completed_at` set;
//! - a ticket returned to Open from a terminal status has both cleared.
//!
//! The resolver is pure: given the same inputs and the same `now` it returns
//! the same patch. Appending the audit entry and performing the write are the
//! caller's job (see [`crate::service`]).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::model::{Status, Ticket};

/// What to do with one timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWrite {
    /// Leave the column untouched (not part of the write).
    Keep,
    /// Set the column to the given instant.
    Set(DateTime<Utc>),
    /// Write `null`.
    Clear,
}

impl FieldWrite {
    #[must_use]
    pub const fn is_keep(self) -> bool {
        matches!(self, Self::Keep)
    }

    fn apply(self, slot: &mut Option<DateTime<Utc>>) {
        match self {
            Self::Keep => {}
            Self::Set(ts) => *slot = Some(ts),
            Self::Clear => *slot = None,
        }
    }

    fn to_value(self) -> Option<Value> {
        match self {
            Self::Keep => None,
            Self::Set(ts) => Some(Value::from(ts.to_rfc3339())),
            Self::Clear => Some(Value::Null),
        }
    }
}

/// Rule table cell, before `now` is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Keep,
    SetNow,
    Clear,
}

impl Effect {
    const fn bind(self, now: DateTime<Utc>) -> FieldWrite {
        match self {
            Self::Keep => FieldWrite::Keep,
            Self::SetNow => FieldWrite::Set(now),
            Self::Clear => FieldWrite::Clear,
        }
    }
}

/// The timestamp values the resolver needs from the current ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampState {
    pub status: Status,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Ticket> for TimestampState {
    fn from(ticket: &Ticket) -> Self {
        Self {
            status: ticket.status,
            started_at: ticket.started_at,
            completed_at: ticket.completed_at,
        }
    }
}

/// The writes that accompany a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPatch {
    pub status: Status,
    pub started_at: FieldWrite,
    pub completed_at: FieldWrite,
}

impl StatusPatch {
    /// Apply the patch to a cached ticket.
    pub fn apply(&self, ticket: &mut Ticket) {
        ticket.status = self.status;
        self.started_at.apply(&mut ticket.started_at);
        self.completed_at.apply(&mut ticket.completed_at);
    }

    /// Columns to send to the backend: `status` plus every touched timestamp.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("status".into(), Value::from(self.status.as_str()));
        if let Some(value) = self.started_at.to_value() {
            fields.insert("started_at".into(), value);
        }
        if let Some(value) = self.completed_at.to_value() {
            fields.insert("completed_at".into(), value);
        }
        fields
    }
}

/// The rule table: `(started_at, completed_at)` effects for `old -> new`.
///
/// Pairs that are not listed leave both timestamps untouched.
#[must_use]
pub const fn rule(old: Status, new: Status) -> (Effect, Effect) {
    use Effect::{Clear, Keep, SetNow};
    use Status::{Blocked, Cancelled, Completed, InProgress, OnHold, Open, Rejected};

    match (old, new) {
        (Open, InProgress) => (SetNow, Keep),
        (Open, Cancelled | Rejected | Completed) => (SetNow, SetNow),

        (InProgress, Open) => (Clear, Keep),
        (InProgress, Cancelled | Rejected | Completed) => (Keep, SetNow),

        (OnHold | Blocked, InProgress) => (SetNow, Keep),
        (OnHold | Blocked, Rejected | Completed) => (SetNow, SetNow),

        (Cancelled | Rejected | Completed, Open) => (Clear, Clear),
        (Cancelled | Rejected | Completed, OnHold | InProgress) => (Keep, Clear),
        (Cancelled, Rejected | Completed)
        | (Rejected, Cancelled | Completed)
        | (Completed, Cancelled | Rejected) => (SetNow, SetNow),

        _ => (Keep, Keep),
    }
}

/// Compute the full patch for moving a ticket to `new_status`.
///
/// The table in [`rule`] is applied as-is. When `new_status` is terminal and
/// the table leaves a timestamp untouched that is currently null, the
/// timestamp is set to `now` so the terminal invariant still holds on paths
/// the table does not list (for example On Hold to Cancelled).
#[must_use]
pub fn resolve(current: TimestampState, new_status: Status, now: DateTime<Utc>) -> StatusPatch {
    let (started, completed) = rule(current.status, new_status);
    let mut patch = StatusPatch {
        status: new_status,
        started_at: started.bind(now),
        completed_at: completed.bind(now),
    };

    if new_status.is_terminal() && current.status != new_status {
        if patch.started_at.is_keep() && current.started_at.is_none() {
            patch.started_at = FieldWrite::Set(now);
        }
        if patch.completed_at.is_keep() && current.completed_at.is_none() {
            patch.completed_at = FieldWrite::Set(now);
        }
    }

    patch
}

/// Writes for an assignee change: `assigned_at` is set when someone is
/// attached (or replaced) and cleared when the assignee is removed.
#[must_use]
pub fn assignment_patch(
    old: Option<&str>,
    new: Option<&str>,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let new = new.map(str::trim).filter(|name| !name.is_empty());
    let mut fields = Map::new();
    match new {
        Some(name) => {
            fields.insert("assignee".into(), Value::from(name));
            if old != Some(name) {
                fields.insert("assigned_at".into(), Value::from(now.to_rfc3339()));
            }
        }
        None => {
            fields.insert("assignee".into(), Value::Null);
            fields.insert("assigned_at".into(), Value::Null);
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::{Effect, FieldWrite, TimestampState, assignment_patch, resolve, rule};
    use crate::model::{Status, Ticket};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn at(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn open_to_completed_sets_both() {
        let now = at(10);
        let patch = resolve(
            TimestampState {
                status: Status::Open,
                started_at: None,
                completed_at: None,
            },
            Status::Completed,
            now,
        );
        assert_eq!(patch.started_at, FieldWrite::Set(now));
        assert_eq!(patch.completed_at, FieldWrite::Set(now));
        assert_eq!(
            serde_json::Value::Object(patch.to_fields()),
            json!({
                "status": "Completed",
                "started_at": "2024-01-10T00:00:00+00:00",
                "completed_at": "2024-01-10T00:00:00+00:00",
            })
        );
    }

    #[test]
    fn cancelled_to_open_clears_both() {
        let patch = resolve(
            TimestampState {
                status: Status::Cancelled,
                started_at: Some(at(1)),
                completed_at: Some(at(2)),
            },
            Status::Open,
            at(10),
        );
        assert_eq!(
            serde_json::Value::Object(patch.to_fields()),
            json!({"status": "Open", "started_at": null, "completed_at": null})
        );
    }

    #[test]
    fn parked_states_never_touch_timestamps() {
        assert_eq!(rule(Status::OnHold, Status::Blocked), (Effect::Keep, Effect::Keep));
        assert_eq!(rule(Status::Blocked, Status::OnHold), (Effect::Keep, Effect::Keep));
    }

    #[test]
    fn unlisted_terminal_target_backfills_missing_timestamps() {
        let now = at(5);
        let patch = resolve(
            TimestampState {
                status: Status::OnHold,
                started_at: None,
                completed_at: None,
            },
            Status::Cancelled,
            now,
        );
        assert_eq!(patch.started_at, FieldWrite::Set(now));
        assert_eq!(patch.completed_at, FieldWrite::Set(now));

        let populated = resolve(
            TimestampState {
                status: Status::OnHold,
                started_at: Some(at(1)),
                completed_at: Some(at(2)),
            },
            Status::Cancelled,
            now,
        );
        assert_eq!(populated.started_at, FieldWrite::Keep);
        assert_eq!(populated.completed_at, FieldWrite::Keep);
    }

    #[test]
    fn apply_updates_cached_ticket() {
        let mut ticket = Ticket {
            id: 3,
            status: Status::InProgress,
            started_at: Some(at(1)),
            ..Ticket::default()
        };
        let patch = resolve(TimestampState::from(&ticket), Status::Open, at(4));
        patch.apply(&mut ticket);
        assert_eq!(ticket.status, Status::Open);
        assert!(ticket.started_at.is_none());
        assert!(ticket.completed_at.is_none());
    }

    #[test]
    fn assignment_sets_and_clears_assigned_at() {
        let now = at(7);
        let attach = assignment_patch(None, Some("ana"), now);
        assert_eq!(attach["assignee"], json!("ana"));
        assert_eq!(attach["assigned_at"], json!("2024-01-07T00:00:00+00:00"));

        let same = assignment_patch(Some("ana"), Some("ana"), now);
        assert!(same.get("assigned_at").is_none());

        let removed = assignment_patch(Some("ana"), Some("  "), now);
        assert_eq!(removed["assignee"], json!(null));
        assert_eq!(removed["assigned_at"], json!(null));
    }
}

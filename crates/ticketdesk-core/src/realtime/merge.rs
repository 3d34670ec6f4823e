//! Realtime ticket merger.
//!
//! The [`Merger`] applies one normalized [`ChangeNotification`] to the cached
//! ticket list and reports what happened.
//!
//! # Rules
//!
//! - **INSERT**: ignored while a creation owned by this session is in flight
//!   (the creator applies the insert response itself) and ignored when the id
//!   is already cached (duplicate delivery). Otherwise the row is joined with
//!   its project display name and prepended, keeping newest-first order.
//! - **UPDATE**: an id that is not cached is a benign race and a no-op.
//!   Otherwise the cached entry is shallow-merged with the partial row; columns
//!   missing from the row keep their cached values. The project name is
//!   re-resolved only when `project_id` changed.
//! - **DELETE**: removes the cached entry; an unknown id is a no-op.
//!
//! A row that cannot be decoded is logged and skipped; the cache is left as it
//! was. Nothing here raises a user-visible error.

use serde_json::Value;

use crate::model::{ProjectDirectory, Ticket, TicketId};

use super::guard::CreationFlag;
use super::notification::{ChangeNotification, Row};

/// Why a notification left the cache unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A local creation is in flight; the insert response will carry the row.
    CreationInFlight,
    /// INSERT for an id that is already cached.
    AlreadyCached,
    /// UPDATE or DELETE for an id that is not cached.
    NotCached,
    /// The row did not decode into a ticket.
    Undecodable(String),
}

/// Result of applying one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted { id: TicketId, title: String },
    Updated { id: TicketId },
    Deleted { id: TicketId },
    Skipped { id: TicketId, reason: SkipReason },
}

impl MergeOutcome {
    /// True when the cache changed and derived views need a refresh.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::Skipped { .. })
    }
}

/// Applies change notifications to a cached ticket list.
pub struct Merger<'a> {
    projects: &'a ProjectDirectory,
    creation: &'a CreationFlag,
}

impl<'a> Merger<'a> {
    #[must_use]
    pub const fn new(projects: &'a ProjectDirectory, creation: &'a CreationFlag) -> Self {
        Self { projects, creation }
    }

    /// Apply one notification to `tickets` (newest first).
    pub fn apply(&self, tickets: &mut Vec<Ticket>, notification: &ChangeNotification) -> MergeOutcome {
        let outcome = match notification {
            ChangeNotification::Insert(row) => self.merge_insert(tickets, row),
            ChangeNotification::Update(row) => self.merge_update(tickets, row),
            ChangeNotification::Delete { id } => Self::merge_delete(tickets, *id),
        };

        match &outcome {
            MergeOutcome::Skipped {
                id,
                reason: SkipReason::Undecodable(error),
            } => {
                tracing::warn!(
                    ticket_id = id,
                    kind = %notification.kind(),
                    error = %error,
                    "dropping change notification with undecodable row"
                );
            }
            MergeOutcome::Skipped { id, reason } => {
                tracing::debug!(ticket_id = id, kind = %notification.kind(), ?reason, "notification skipped");
            }
            _ => {
                tracing::debug!(ticket_id = notification.id(), kind = %notification.kind(), "notification merged");
            }
        }

        outcome
    }

    fn merge_insert(&self, tickets: &mut Vec<Ticket>, row: &Row) -> MergeOutcome {
        if self.creation.is_set() {
            return skipped(row.id, SkipReason::CreationInFlight);
        }
        if tickets.iter().any(|ticket| ticket.id == row.id) {
            return skipped(row.id, SkipReason::AlreadyCached);
        }

        let mut ticket = match Ticket::from_row(Value::Object(row.fields.clone())) {
            Ok(ticket) => ticket,
            Err(e) => return skipped(row.id, SkipReason::Undecodable(e.to_string())),
        };
        ticket.project_name = self.projects.display_name(ticket.project_id);

        let title = ticket.title.clone();
        tickets.insert(0, ticket);
        MergeOutcome::Inserted { id: row.id, title }
    }

    fn merge_update(&self, tickets: &mut [Ticket], row: &Row) -> MergeOutcome {
        let Some(slot) = tickets.iter_mut().find(|ticket| ticket.id == row.id) else {
            return skipped(row.id, SkipReason::NotCached);
        };

        let mut merged = slot.to_object();
        for (column, value) in &row.fields {
            merged.insert(column.clone(), value.clone());
        }

        let mut ticket = match Ticket::from_row(Value::Object(merged)) {
            Ok(ticket) => ticket,
            Err(e) => return skipped(row.id, SkipReason::Undecodable(e.to_string())),
        };
        ticket.project_name = if ticket.project_id == slot.project_id {
            slot.project_name.clone()
        } else {
            self.projects.display_name(ticket.project_id)
        };

        *slot = ticket;
        MergeOutcome::Updated { id: row.id }
    }

    fn merge_delete(tickets: &mut Vec<Ticket>, id: TicketId) -> MergeOutcome {
        let before = tickets.len();
        tickets.retain(|ticket| ticket.id != id);
        if tickets.len() == before {
            skipped(id, SkipReason::NotCached)
        } else {
            MergeOutcome::Deleted { id }
        }
    }
}

const fn skipped(id: TicketId, reason: SkipReason) -> MergeOutcome {
    MergeOutcome::Skipped { id, reason }
}

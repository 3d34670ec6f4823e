//! Derived views over the ticket cache: filtering, sorting, badge counts and
//! epic labels.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::model::{Status, Ticket, TicketId};

/// Assignee criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeFilter {
    Named(String),
    Unassigned,
}

/// Criteria for the active ticket list. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub statuses: Vec<Status>,
    pub project_id: Option<i64>,
    pub assignee: Option<AssigneeFilter>,
    pub epic: Option<String>,
    /// Case-insensitive match against title, description, epic and `#id`.
    pub text: Option<String>,
    pub hide_terminal: bool,
}

impl TicketFilter {
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&ticket.status) {
            return false;
        }
        if self.hide_terminal && ticket.status.is_terminal() {
            return false;
        }
        if self.project_id.is_some() && ticket.project_id != self.project_id {
            return false;
        }
        match &self.assignee {
            Some(AssigneeFilter::Unassigned) if ticket.assignee.is_some() => return false,
            Some(AssigneeFilter::Named(name)) => {
                let matches = ticket
                    .assignee
                    .as_deref()
                    .is_some_and(|assignee| assignee.eq_ignore_ascii_case(name));
                if !matches {
                    return false;
                }
            }
            _ => {}
        }
        if let Some(epic) = &self.epic {
            if ticket.epic.as_deref() != Some(epic.as_str()) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !text_matches(ticket, text) {
                return false;
            }
        }
        true
    }
}

fn text_matches(ticket: &Ticket, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    if let Some(id) = needle.strip_prefix('#') {
        return id.parse::<TicketId>().is_ok_and(|id| id == ticket.id);
    }
    [
        Some(ticket.title.as_str()),
        ticket.description.as_deref(),
        ticket.epic.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|haystack| haystack.to_lowercase().contains(&needle))
}

/// Sortable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Created,
    Updated,
    Status,
    Priority,
    Title,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "created" | "created_at" => Ok(Self::Created),
            "updated" | "updated_at" => Ok(Self::Updated),
            "status" => Ok(Self::Status),
            "priority" => Ok(Self::Priority),
            "title" => Ok(Self::Title),
            other => Err(format!(
                "invalid sort field '{other}': expected id, created, updated, status, priority or title"
            )),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Id => "id",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Title => "title",
        })
    }
}

/// Ordering of the active ticket list. Ties always fall back to id, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            field: SortField::Id,
            descending: true,
        }
    }
}

/// Rank of a free-text priority; unknown values sort after known ones.
fn priority_rank(priority: Option<&str>) -> u8 {
    match priority.map(str::to_ascii_lowercase).as_deref() {
        Some("urgent" | "critical") => 0,
        Some("high") => 1,
        Some("medium" | "normal") => 2,
        Some("low") => 3,
        Some(_) => 4,
        None => 5,
    }
}

impl SortOrder {
    fn compare(self, a: &Ticket, b: &Ticket) -> Ordering {
        let primary = match self.field {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Created => a.created_at.cmp(&b.created_at),
            SortField::Updated => a.updated_at.cmp(&b.updated_at),
            SortField::Status => a.status.rank().cmp(&b.status.rank()),
            SortField::Priority => priority_rank(a.priority.as_deref())
                .cmp(&priority_rank(b.priority.as_deref()))
                .reverse(),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        };
        let primary = if self.descending {
            primary.reverse()
        } else {
            primary
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

/// Ids of the tickets matching `filter`, in `order`.
#[must_use]
pub fn select(tickets: &[Ticket], filter: &TicketFilter, order: SortOrder) -> Vec<TicketId> {
    let mut matching: Vec<&Ticket> = tickets.iter().filter(|t| filter.matches(t)).collect();
    matching.sort_by(|a, b| order.compare(a, b));
    matching.into_iter().map(|ticket| ticket.id).collect()
}

/// Navigation badge counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BadgeCounts {
    pub total: usize,
    /// Tickets not in a terminal status.
    pub active: usize,
    /// Active tickets without an assignee.
    pub unassigned: usize,
    /// Active tickets assigned to the current user.
    pub mine: usize,
    pub by_status: BTreeMap<String, usize>,
}

impl BadgeCounts {
    #[must_use]
    pub fn compute(tickets: &[Ticket], current_user: Option<&str>) -> Self {
        let mut counts = Self {
            total: tickets.len(),
            ..Self::default()
        };
        for status in Status::ALL {
            counts.by_status.insert(status.as_str().to_string(), 0);
        }
        for ticket in tickets {
            *counts
                .by_status
                .entry(ticket.status.as_str().to_string())
                .or_default() += 1;
            if ticket.status.is_terminal() {
                continue;
            }
            counts.active += 1;
            match (ticket.assignee.as_deref(), current_user) {
                (None, _) => counts.unassigned += 1,
                (Some(assignee), Some(user)) if assignee.eq_ignore_ascii_case(user) => {
                    counts.mine += 1;
                }
                _ => {}
            }
        }
        counts
    }
}

/// Distinct epic labels used by tickets, optionally within one project.
#[must_use]
pub fn epics(tickets: &[Ticket], project_id: Option<i64>) -> Vec<String> {
    tickets
        .iter()
        .filter(|ticket| project_id.is_none() || ticket.project_id == project_id)
        .filter_map(|ticket| ticket.epic.as_deref())
        .map(str::trim)
        .filter(|epic| !epic.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

//! The single owned ticket cache.
//!
//! [`TicketStore`] holds the ticket list (newest first), the project directory,
//! the creation flag and the derived view. Every mutation goes through its
//! methods. Local actions refresh the view immediately; realtime merges only
//! schedule a trailing refresh so a burst of notifications re-renders once.

use serde_json::{Map, Value};
use std::time::{Duration, Instant};

use crate::model::{Project, ProjectDirectory, Ticket, TicketId};
use crate::realtime::{
    ChangeNotification, CreationFlag, CreationGuard, MergeOutcome, Merger, Row,
};
use crate::view::{self, BadgeCounts, SortOrder, TicketFilter};

/// Default delay of the trailing refresh.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(100);

/// Trailing debounce: each [`schedule`](Self::schedule) pushes the deadline
/// out, and [`due`](Self::due) fires once after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshDebounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Default for RefreshDebounce {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_DELAY)
    }
}

impl RefreshDebounce {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once per burst, when the deadline has passed.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub const fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[derive(Debug, Default)]
pub struct TicketStore {
    tickets: Vec<Ticket>,
    projects: ProjectDirectory,
    creation: CreationFlag,
    filter: TicketFilter,
    sort: SortOrder,
    current_user: Option<String>,
    view: Vec<TicketId>,
    badges: BadgeCounts,
    refresh: RefreshDebounce,
}

impl TicketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_refresh_delay(delay: Duration) -> Self {
        Self {
            refresh: RefreshDebounce::new(delay),
            ..Self::default()
        }
    }

    /// Replace the whole cache with a fresh bulk read.
    pub fn replace_all(&mut self, mut tickets: Vec<Ticket>, projects: Vec<Project>) {
        self.projects = ProjectDirectory::new(projects);
        for ticket in &mut tickets {
            ticket.project_name = self.projects.display_name(ticket.project_id);
        }
        tickets.sort_by(|a, b| b.id.cmp(&a.id));
        self.tickets = tickets;
        tracing::info!(
            tickets = self.tickets.len(),
            projects = self.projects.len(),
            "ticket cache loaded"
        );
        self.refresh_now();
    }

    /// Normalize and merge one raw change payload. Malformed payloads are
    /// logged and dropped (`None`). A mutation schedules a trailing refresh.
    pub fn apply_change(&mut self, payload: &Value, now: Instant) -> Option<MergeOutcome> {
        let notification = match ChangeNotification::from_payload(payload) {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(code = %e.code(), error = %e, "dropping malformed change notification");
                return None;
            }
        };
        let outcome = self.apply_notification(&notification);
        if outcome.is_mutation() {
            self.refresh.schedule(now);
        }
        Some(outcome)
    }

    fn apply_notification(&mut self, notification: &ChangeNotification) -> MergeOutcome {
        Merger::new(&self.projects, &self.creation).apply(&mut self.tickets, notification)
    }

    /// Hold INSERT suppression for the duration of a local creation.
    #[must_use]
    pub fn begin_creation(&self) -> CreationGuard {
        self.creation.acquire()
    }

    #[must_use]
    pub const fn creation_flag(&self) -> &CreationFlag {
        &self.creation
    }

    /// Prepend rows returned by a successful insert, in order, so the last
    /// one ends up first. A row the channel already delivered is replaced.
    pub fn insert_created(&mut self, created: Vec<Ticket>) {
        for mut ticket in created {
            self.tickets.retain(|cached| cached.id != ticket.id);
            ticket.project_name = self.projects.display_name(ticket.project_id);
            self.tickets.insert(0, ticket);
        }
        self.refresh_now();
    }

    /// Shallow-merge columns written by a successful update. Returns false
    /// when the id is not cached or the merged row does not decode.
    pub fn merge_fields(&mut self, id: TicketId, fields: &Map<String, Value>) -> bool {
        let notification = ChangeNotification::Update(Row {
            id,
            fields: fields.clone(),
        });
        let merged = self.apply_notification(&notification).is_mutation();
        if merged {
            self.refresh_now();
        }
        merged
    }

    #[must_use]
    pub fn get(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.iter().find(|ticket| ticket.id == id)
    }

    /// Every cached ticket, newest first.
    #[must_use]
    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    #[must_use]
    pub const fn projects(&self) -> &ProjectDirectory {
        &self.projects
    }

    /// Tickets of the last computed view, in display order.
    pub fn view(&self) -> impl Iterator<Item = &Ticket> + '_ {
        self.view.iter().filter_map(|id| self.get(*id))
    }

    #[must_use]
    pub fn view_ids(&self) -> &[TicketId] {
        &self.view
    }

    #[must_use]
    pub const fn badges(&self) -> &BadgeCounts {
        &self.badges
    }

    #[must_use]
    pub fn epics(&self, project_id: Option<i64>) -> Vec<String> {
        view::epics(&self.tickets, project_id)
    }

    #[must_use]
    pub const fn filter(&self) -> &TicketFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: TicketFilter) {
        self.filter = filter;
        self.refresh_now();
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
        self.refresh_now();
    }

    /// User whose assignments count toward the `mine` badge.
    pub fn set_current_user(&mut self, user: Option<String>) {
        self.current_user = user;
        self.refresh_now();
    }

    /// Recompute the view if the trailing refresh is due. Returns true when
    /// the caller should re-render.
    pub fn poll_refresh(&mut self, now: Instant) -> bool {
        if self.refresh.due(now) {
            self.recompute();
            true
        } else {
            false
        }
    }

    /// Run a pending refresh immediately (for example when the feed ends).
    pub fn flush_refresh(&mut self) -> bool {
        if self.refresh.is_pending() {
            self.refresh_now();
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn next_refresh_deadline(&self) -> Option<Instant> {
        self.refresh.deadline()
    }

    fn refresh_now(&mut self) {
        self.refresh.cancel();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.view = view::select(&self.tickets, &self.filter, self.sort);
        self.badges = BadgeCounts::compute(&self.tickets, self.current_user.as_deref());
        tracing::trace!(visible = self.view.len(), "view recomputed");
    }
}

//! Persistence-side orchestration.
//!
//! [`TicketService`] turns user actions into backend writes and applies them
//! to the [`TicketStore`]. Writes are last-write-wins: no version check is
//! sent, and the cache is only changed after the backend accepted the write.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::backend::{
    BulkUpdate, DataApi, RetryPolicy, SelectQuery, Sleeper, Tables, bulk_payload, fetch_all,
};
use crate::error::{ErrorCategory, TicketError};
use crate::model::{AuditEntry, Project, Status, Ticket, TicketDraft, TicketId};
use crate::notify::{CreationNotifier, LogToasts, Toast, ToastSink};
use crate::store::TicketStore;
use crate::transition::{StatusPatch, TimestampState, assignment_patch, resolve};

/// Summary of a bulk status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub updated: Vec<TicketId>,
    /// Tickets already in the target status; nothing was written for them.
    pub unchanged: Vec<TicketId>,
}

/// Check every draft before anything is sent.
///
/// # Errors
///
/// [`TicketError::Validation`] with the union of missing fields, in first-seen
/// order.
pub fn validate_drafts(drafts: &[TicketDraft]) -> Result<(), TicketError> {
    let mut missing: Vec<&'static str> = Vec::new();
    for field in drafts.iter().flat_map(TicketDraft::missing_fields) {
        if !missing.contains(&field) {
            missing.push(field);
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TicketError::Validation { fields: missing })
    }
}

pub struct TicketService<A, S> {
    api: A,
    sleeper: S,
    retry: RetryPolicy,
    tables: Tables,
    notifier: Option<Box<dyn CreationNotifier>>,
    toasts: Box<dyn ToastSink>,
}

impl<A: DataApi, S: Sleeper> TicketService<A, S> {
    pub fn new(api: A, sleeper: S) -> Self {
        Self {
            api,
            sleeper,
            retry: RetryPolicy::default(),
            tables: Tables::default(),
            notifier: None,
            toasts: Box::new(LogToasts),
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_tables(mut self, tables: Tables) -> Self {
        self.tables = tables;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn CreationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn with_toasts(mut self, toasts: Box<dyn ToastSink>) -> Self {
        self.toasts = toasts;
        self
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Bulk read tickets and projects into `store`. Rows that do not decode
    /// are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Load`] when either read fails; the store is left
    /// untouched.
    pub fn load(&self, store: &mut TicketStore) -> Result<usize, TicketError> {
        let ticket_rows = fetch_all(
            &self.api,
            &SelectQuery::new(self.tables.tickets.as_str()).order_by("id", false),
        )
        .map_err(|source| TicketError::Load {
            what: "tickets",
            source,
        })?;
        let project_rows = fetch_all(
            &self.api,
            &SelectQuery::new(self.tables.projects.as_str()).order_by("name", true),
        )
        .map_err(|source| TicketError::Load {
            what: "projects",
            source,
        })?;

        let tickets: Vec<Ticket> = ticket_rows
            .into_iter()
            .filter_map(|row| match Ticket::from_row(row) {
                Ok(ticket) => Some(ticket),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable ticket row");
                    None
                }
            })
            .collect();
        let projects: Vec<Project> = project_rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(project) => Some(project),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable project row");
                    None
                }
            })
            .collect();

        let count = tickets.len();
        store.replace_all(tickets, projects);
        Ok(count)
    }

    /// Move one ticket to `new_status` with its timestamp writes and an audit
    /// entry.
    ///
    /// # Errors
    ///
    /// - [`TicketError::NotFound`] if the id is not cached.
    /// - [`TicketError::Unchanged`] if the ticket is already in `new_status`.
    /// - [`TicketError::Write`] once retries are exhausted; the cache is left
    ///   as it was and an error toast is raised.
    pub fn change_status(
        &self,
        store: &mut TicketStore,
        id: TicketId,
        new_status: Status,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<StatusPatch, TicketError> {
        let ticket = store.get(id).ok_or(TicketError::NotFound(id))?;
        if ticket.status == new_status {
            return Err(TicketError::Unchanged {
                id,
                from: ticket.status,
                to: new_status,
            });
        }

        let patch = resolve(TimestampState::from(ticket), new_status, now);
        let entry = AuditEntry::status_change(user, now, ticket.status, new_status);
        let mut fields = patch.to_fields();
        fields.insert("log".into(), Value::Array(ticket.log_with(&entry)));

        let stored = self.write(id, &fields).map_err(|e| self.raise(e))?;
        store.merge_fields(id, &stored_columns(fields, &stored));
        tracing::info!(ticket_id = id, status = %new_status, "status changed");
        Ok(patch)
    }

    /// Attach, replace or remove the assignee. Returns the columns written;
    /// empty when the assignee did not change.
    ///
    /// # Errors
    ///
    /// [`TicketError::NotFound`] or [`TicketError::Write`].
    pub fn assign(
        &self,
        store: &mut TicketStore,
        id: TicketId,
        assignee: Option<&str>,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<Map<String, Value>, TicketError> {
        let ticket = store.get(id).ok_or(TicketError::NotFound(id))?;
        let old = ticket.assignee.as_deref();
        let mut fields = assignment_patch(old, assignee, now);
        if fields.get("assignee") == Some(&old.map_or(Value::Null, Value::from)) {
            return Ok(Map::new());
        }

        let entry = AuditEntry::field_change(
            user,
            now,
            "assignee",
            old.map_or(Value::Null, Value::from),
            fields.get("assignee").cloned().unwrap_or(Value::Null),
        );
        fields.insert("log".into(), Value::Array(ticket.log_with(&entry)));

        let stored = self.write(id, &fields).map_err(|e| self.raise(e))?;
        store.merge_fields(id, &stored_columns(fields.clone(), &stored));
        tracing::info!(ticket_id = id, "assignee changed");
        Ok(fields)
    }

    /// Insert new tickets. Drafts are validated before any request is made.
    /// INSERT notifications are suppressed while the insert is in flight; the
    /// returned rows are prepended to the cache and then announced.
    ///
    /// # Errors
    ///
    /// - [`TicketError::Validation`] naming every missing field.
    /// - [`TicketError::Create`] when the insert is rejected.
    /// - [`TicketError::Decode`] when the backend returns unusable rows.
    pub fn create(
        &self,
        store: &mut TicketStore,
        drafts: Vec<TicketDraft>,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<TicketId>, TicketError> {
        validate_drafts(&drafts)?;
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Value> = drafts
            .into_iter()
            .map(|draft| draft.into_row(user, now))
            .collect();

        let created = {
            let _guard = store.begin_creation();
            let stored = self
                .api
                .insert(&self.tables.tickets, &rows)
                .map_err(|e| self.raise(TicketError::Create(e)))?;
            let created = stored
                .into_iter()
                .map(Ticket::from_row)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| TicketError::Decode(e.to_string()))?;
            store.insert_created(created.clone());
            created
        };

        let ids: Vec<TicketId> = created.iter().map(|ticket| ticket.id).collect();
        tracing::info!(count = ids.len(), "tickets created");
        self.toasts.push(Toast::success(format!(
            "Created {} ticket{}",
            ids.len(),
            if ids.len() == 1 { "" } else { "s" }
        )));

        if let Some(notifier) = &self.notifier {
            let named: Vec<Ticket> = ids
                .iter()
                .filter_map(|id| store.get(*id).cloned())
                .collect();
            if let Err(e) = notifier.notify_created(&named, user) {
                tracing::warn!(code = %e.code(), error = %e, "creation announcement failed");
                self.toasts
                    .push(Toast::error(format!("{}: {e}", e.code().message())));
            }
        }

        Ok(ids)
    }

    /// Move several tickets to `new_status` in one bulk call. Each ticket gets
    /// its own resolver patch and audit entry.
    ///
    /// # Errors
    ///
    /// - [`TicketError::NotFound`] for the first id that is not cached; nothing
    ///   is written.
    /// - [`TicketError::Bulk`] once retries are exhausted; the cache is left as
    ///   it was.
    pub fn bulk_status(
        &self,
        store: &mut TicketStore,
        ids: &[TicketId],
        new_status: Status,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<BulkOutcome, TicketError> {
        let mut updates = Vec::with_capacity(ids.len());
        let mut unchanged = Vec::new();
        for &id in ids {
            let ticket = store.get(id).ok_or(TicketError::NotFound(id))?;
            if ticket.status == new_status {
                unchanged.push(id);
                continue;
            }
            let patch = resolve(TimestampState::from(ticket), new_status, now);
            let entry = AuditEntry::status_change(user, now, ticket.status, new_status);
            let mut fields = patch.to_fields();
            fields.insert("log".into(), Value::Array(ticket.log_with(&entry)));
            updates.push(BulkUpdate { id, updates: fields });
        }

        if updates.is_empty() {
            return Ok(BulkOutcome {
                updated: Vec::new(),
                unchanged,
            });
        }

        let args = bulk_payload(&updates);
        let count = updates.len();
        self.retry
            .run(&self.sleeper, "bulk status", |_| {
                self.api.rpc(&self.tables.bulk_rpc, &args)
            })
            .map_err(|source| self.raise(TicketError::Bulk { count, source }))?;

        let mut updated = Vec::with_capacity(count);
        for update in &updates {
            store.merge_fields(update.id, &update.updates);
            updated.push(update.id);
        }
        tracing::info!(count, status = %new_status, "bulk status applied");
        Ok(BulkOutcome { updated, unchanged })
    }

    fn write(&self, id: TicketId, fields: &Map<String, Value>) -> Result<Value, TicketError> {
        self.retry
            .run(&self.sleeper, "update ticket", |_| {
                self.api.update(&self.tables.tickets, id, fields)
            })
            .map_err(|source| TicketError::Write { id, source })
    }

    /// Surface a recoverable write failure as an error toast and hand the
    /// error back.
    fn raise(&self, error: TicketError) -> TicketError {
        if error.category() == ErrorCategory::RecoverableWrite {
            self.toasts.push(Toast::error(error.to_string()));
        }
        error
    }
}

/// Columns to merge after an update: what was sent, overlaid with the row the
/// backend returned so server-maintained columns are picked up.
fn stored_columns(mut sent: Map<String, Value>, stored: &Value) -> Map<String, Value> {
    let row = match stored {
        Value::Array(rows) => rows.first(),
        other => Some(other),
    };
    if let Some(Value::Object(columns)) = row {
        sent.extend(columns.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::{stored_columns, validate_drafts};
    use crate::error::TicketError;
    use crate::model::TicketDraft;
    use serde_json::{Value, json};

    #[test]
    fn missing_fields_are_unioned_in_order() {
        let drafts = [
            TicketDraft {
                title: "Has title".into(),
                ..TicketDraft::default()
            },
            TicketDraft {
                project_id: Some(1),
                ..TicketDraft::default()
            },
        ];
        let err = validate_drafts(&drafts).unwrap_err();
        assert!(matches!(
            err,
            TicketError::Validation { ref fields } if fields == &["project_id", "title"]
        ));
    }

    #[test]
    fn complete_drafts_pass() {
        let draft = TicketDraft {
            title: "Printer jam".into(),
            project_id: Some(2),
            ..TicketDraft::default()
        };
        assert!(validate_drafts(&[draft]).is_ok());
        assert!(validate_drafts(&[]).is_ok());
    }

    #[test]
    fn returned_row_overrides_sent_columns() {
        let sent = json!({"status": "Blocked", "log": []});
        let Value::Object(sent) = sent else { unreachable!() };

        let stored = json!([{"id": 2, "status": "Blocked", "updated_at": "2024-07-04T09:30:05Z"}]);
        let merged = stored_columns(sent.clone(), &stored);
        assert_eq!(merged["updated_at"], "2024-07-04T09:30:05Z");
        assert_eq!(merged["log"], json!([]));

        assert_eq!(stored_columns(sent.clone(), &Value::Null), sent);
    }
}

//! Hosted backend contract.
//!
//! The client talks to three collaborators: a relational data API (paged
//! select, update, insert), an RPC endpoint for bulk mutation, and the change
//! channel (see [`crate::realtime`]). [`DataApi`] covers the first two.
//!
//! Implementations:
//!
//! - [`RestClient`]: HTTP against a PostgREST-style gateway.
//! - [`MemoryBackend`]: in-process tables with scripted failures.

pub mod bulk;
pub mod memory;
pub mod paginate;
pub mod rest;
pub mod retry;

pub use bulk::{BulkUpdate, bulk_payload};
pub use memory::{Call, MemoryBackend};
pub use paginate::{PAGE_SIZE, fetch_all, fetch_all_with};
pub use rest::RestClient;
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::TicketId;

/// Failures reported by a [`DataApi`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend response could not be decoded: {0}")]
    Decode(String),

    #[error("no row with id {id} in {table}")]
    NotFound { table: String, id: TicketId },
}

impl BackendError {
    /// Whether repeating the same request may succeed.
    ///
    /// Transport failures, timeouts, throttling and server errors are
    /// transient; client errors and decode failures are not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::Decode(_) | Self::NotFound { .. } => false,
        }
    }
}

/// Table and function names on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default = "default_tickets_table")]
    pub tickets: String,
    #[serde(default = "default_projects_table")]
    pub projects: String,
    #[serde(default = "default_bulk_rpc")]
    pub bulk_rpc: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            tickets: default_tickets_table(),
            projects: default_projects_table(),
            bulk_rpc: default_bulk_rpc(),
        }
    }
}

fn default_tickets_table() -> String {
    "tickets".to_string()
}

fn default_projects_table() -> String {
    "projects".to_string()
}

fn default_bulk_rpc() -> String {
    "bulk_update_tickets".to_string()
}

/// A paged read of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: String,
    /// Column list in PostgREST syntax; `*` for all.
    pub columns: String,
    /// `(column, ascending)`.
    pub order: Option<(String, bool)>,
}

impl SelectQuery {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            order: None,
        }
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some((column.into(), ascending));
        self
    }
}

/// Relational data API plus RPC.
pub trait DataApi {
    /// Read `limit` rows starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the request fails or the body is not a
    /// JSON array.
    fn select_page(
        &self,
        query: &SelectQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, BackendError>;

    /// Update one row by id and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] when no row matched.
    fn update(
        &self,
        table: &str,
        id: TicketId,
        fields: &Map<String, Value>,
    ) -> Result<Value, BackendError>;

    /// Insert rows and return them as stored, ids included.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the insert is rejected.
    fn insert(&self, table: &str, rows: &[Value]) -> Result<Vec<Value>, BackendError>;

    /// Call a stored function.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the call fails.
    fn rpc(&self, function: &str, args: &Value) -> Result<Value, BackendError>;
}

impl<T: DataApi + ?Sized> DataApi for &T {
    fn select_page(
        &self,
        query: &SelectQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, BackendError> {
        (**self).select_page(query, offset, limit)
    }

    fn update(
        &self,
        table: &str,
        id: TicketId,
        fields: &Map<String, Value>,
    ) -> Result<Value, BackendError> {
        (**self).update(table, id, fields)
    }

    fn insert(&self, table: &str, rows: &[Value]) -> Result<Vec<Value>, BackendError> {
        (**self).insert(table, rows)
    }

    fn rpc(&self, function: &str, args: &Value) -> Result<Value, BackendError> {
        (**self).rpc(function, args)
    }
}

use std::fmt;

use crate::backend::BackendError;
use crate::model::{Status, TicketId};

/// Machine-readable error codes for scripts and agents driving `td`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotConfigured,
    ConfigParseError,
    TicketNotFound,
    InvalidStatus,
    ValidationFailed,
    BackendReadFailed,
    BackendWriteFailed,
    MalformedNotification,
    SubscriptionFailed,
    NotifyFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotConfigured => "E1001",
            Self::ConfigParseError => "E1002",
            Self::TicketNotFound => "E2001",
            Self::InvalidStatus => "E2002",
            Self::ValidationFailed => "E2003",
            Self::BackendReadFailed => "E3001",
            Self::BackendWriteFailed => "E3002",
            Self::MalformedNotification => "E4001",
            Self::SubscriptionFailed => "E4002",
            Self::NotifyFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotConfigured => "Backend not configured",
            Self::ConfigParseError => "Config file parse error",
            Self::TicketNotFound => "Ticket not found",
            Self::InvalidStatus => "Invalid status value",
            Self::ValidationFailed => "Required fields missing",
            Self::BackendReadFailed => "Failed to load data from backend",
            Self::BackendWriteFailed => "Failed to save changes",
            Self::MalformedNotification => "Malformed change notification",
            Self::SubscriptionFailed => "Change channel subscription failed",
            Self::NotifyFailed => "Creation notification failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotConfigured => {
                Some("Set [backend] url and api_key in config.toml or TICKETDESK_URL/TICKETDESK_API_KEY.")
            }
            Self::ConfigParseError => Some("Fix syntax in config.toml and retry."),
            Self::TicketNotFound => Some("Reload the ticket list; it may have been deleted."),
            Self::InvalidStatus => Some(
                "Use one of: Open, In Progress, On Hold, Blocked, Cancelled, Rejected, Completed.",
            ),
            Self::ValidationFailed => Some("Fill in the highlighted fields and retry."),
            Self::BackendReadFailed => Some("Check connectivity and reload."),
            Self::BackendWriteFailed => Some("The change was not saved. Retry in a moment."),
            Self::MalformedNotification | Self::SubscriptionFailed => None,
            Self::NotifyFailed => Some("Tickets were created; only the announcement failed."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// How an error surfaces to the person at the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Initial load failed; nothing to show but an error panel and a reload action.
    FatalRead,
    /// A write failed; local state stays as it was and a toast is raised.
    RecoverableWrite,
    /// A realtime payload could not be used; logged and dropped.
    Malformed,
    /// Input rejected before any network call.
    Validation,
}

/// Errors from the ticket service layer.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket {0} not found")]
    NotFound(TicketId),

    #[error("missing required fields: {}", fields.join(", "))]
    Validation { fields: Vec<&'static str> },

    #[error("failed to load {what}: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("failed to update ticket {id}: {source}")]
    Write {
        id: TicketId,
        #[source]
        source: BackendError,
    },

    #[error("failed to create tickets: {0}")]
    Create(#[source] BackendError),

    #[error("bulk update of {count} tickets failed: {source}")]
    Bulk {
        count: usize,
        #[source]
        source: BackendError,
    },

    #[error("ticket {id} has no transition from {from} to {to}")]
    Unchanged { id: TicketId, from: Status, to: Status },

    #[error("backend returned an unusable row: {0}")]
    Decode(String),
}

impl TicketError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::TicketNotFound,
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::Load { .. } => ErrorCode::BackendReadFailed,
            Self::Write { .. } | Self::Create(_) | Self::Bulk { .. } => {
                ErrorCode::BackendWriteFailed
            }
            Self::Unchanged { .. } => ErrorCode::InvalidStatus,
            Self::Decode(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Category in the client error taxonomy.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Load { .. } => ErrorCategory::FatalRead,
            Self::Validation { .. } | Self::Unchanged { .. } => ErrorCategory::Validation,
            Self::NotFound(_)
            | Self::Write { .. }
            | Self::Create(_)
            | Self::Bulk { .. }
            | Self::Decode(_) => ErrorCategory::RecoverableWrite,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

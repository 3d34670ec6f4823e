//! Toasts and the outbound creation announcement.
//!
//! A toast is a short, user-facing message raised on write failures and on
//! realtime inserts. The creation announcement is a fire-and-forget POST to a
//! relay endpoint that forwards new tickets to a chat channel; its failure is
//! only ever a toast.

use serde::Serialize;
use serde_json::json;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::ErrorCode;
use crate::model::Ticket;

/// Path of the relay endpoint, relative to the application base URL.
pub const DISCORD_NOTIFY_PATH: &str = "/api/discord/notify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

impl fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

/// Destination for toasts.
pub trait ToastSink {
    fn push(&self, toast: Toast);
}

/// Writes toasts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogToasts;

impl ToastSink for LogToasts {
    fn push(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Error => tracing::warn!(message = %toast.message, "toast"),
            ToastLevel::Info | ToastLevel::Success => {
                tracing::info!(level = %toast.level, message = %toast.message, "toast");
            }
        }
    }
}

/// Shared in-memory queue; clones see the same toasts.
#[derive(Debug, Clone, Default)]
pub struct ToastQueue {
    inner: Rc<RefCell<VecDeque<Toast>>>,
}

impl ToastQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every queued toast, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<Toast> {
        self.inner.borrow_mut().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl ToastSink for ToastQueue {
    fn push(&self, toast: Toast) {
        self.inner.borrow_mut().push_back(toast);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("notify endpoint returned HTTP {0}")]
    Status(u16),
    #[error("notify endpoint unreachable: {0}")]
    Transport(String),
}

impl NotifyError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::NotifyFailed
    }
}

/// Announces freshly created tickets.
pub trait CreationNotifier {
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the announcement could not be delivered.
    fn notify_created(&self, tickets: &[Ticket], creator: &str) -> Result<(), NotifyError>;
}

/// Request body for the relay endpoint.
#[must_use]
pub fn creation_payload(tickets: &[Ticket], creator: &str) -> serde_json::Value {
    json!({
        "insertedTickets": tickets,
        "creatorName": creator,
    })
}

/// Posts creation announcements to `<base>/api/discord/notify`.
pub struct DiscordNotifier {
    agent: ureq::Agent,
    endpoint: String,
}

impl DiscordNotifier {
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: format!("{}{DISCORD_NOTIFY_PATH}", base_url.trim_end_matches('/')),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CreationNotifier for DiscordNotifier {
    fn notify_created(&self, tickets: &[Ticket], creator: &str) -> Result<(), NotifyError> {
        self.agent
            .post(&self.endpoint)
            .send_json(creation_payload(tickets, creator))
            .map_err(|err| match err {
                ureq::Error::Status(status, _) => NotifyError::Status(status),
                ureq::Error::Transport(transport) => NotifyError::Transport(transport.to_string()),
            })?;
        tracing::debug!(count = tickets.len(), "creation announced");
        Ok(())
    }
}

//! Subcommand handlers and the plumbing they share.

pub mod assign;
pub mod bulk_status;
pub mod completions;
pub mod create;
pub mod list;
pub mod show;
pub mod status;
pub mod watch;

use anyhow::Context as _;
use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use ticketdesk_core::backend::{RestClient, ThreadSleeper};
use ticketdesk_core::config::Config;
use ticketdesk_core::error::ErrorCode;
use ticketdesk_core::model::{Project, Ticket, TicketId};
use ticketdesk_core::notify::{DiscordNotifier, Toast, ToastQueue};
use ticketdesk_core::service::TicketService;
use ticketdesk_core::store::TicketStore;
use ticketdesk_core::view::BadgeCounts;

use crate::identity;
use crate::output::{CliError, OutputMode};

/// Service wired to the hosted backend.
pub type Service = TicketService<RestClient, ThreadSleeper>;

/// Everything a handler needs from the global flags and config.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub output: OutputMode,
    pub user_flag: Option<String>,
    pub quiet: bool,
}

impl Context {
    pub fn current_user(&self) -> Option<String> {
        identity::resolve_user(self.user_flag.as_deref(), self.config.user.as_deref())
    }

    pub fn require_user(&self) -> Result<String, CliError> {
        identity::require_user(self.user_flag.as_deref(), self.config.user.as_deref())
    }

    /// Empty store with the configured refresh delay and "mine" user.
    pub fn new_store(&self) -> TicketStore {
        let mut store = TicketStore::with_refresh_delay(self.config.realtime.refresh_debounce());
        store.set_current_user(self.current_user());
        store
    }

    /// Build a service for the configured backend. Toasts raised by the
    /// service land in `toasts`.
    ///
    /// # Errors
    ///
    /// Fails with `E1001` when no backend URL or API key is configured.
    pub fn connect(&self, toasts: &ToastQueue) -> anyhow::Result<Service> {
        let backend = &self.config.backend;
        let (url, api_key) = backend.credentials().ok_or_else(|| {
            CliError::coded(ErrorCode::NotConfigured, "no backend url and api key configured")
        })?;

        let api = RestClient::new(url, api_key, backend.timeout());
        let mut service = TicketService::new(api, ThreadSleeper)
            .with_retry(backend.retry_policy())
            .with_tables(backend.tables.clone())
            .with_toasts(Box::new(toasts.clone()));
        if let Some(base_url) = self.config.notify.target() {
            service = service.with_notifier(Box::new(DiscordNotifier::new(
                base_url,
                backend.timeout(),
            )));
        }
        tracing::debug!(url, "backend connected");
        Ok(service)
    }

    /// Connect and load the full cache.
    ///
    /// # Errors
    ///
    /// Configuration or backend read failures.
    pub fn connect_loaded(&self, toasts: &ToastQueue) -> anyhow::Result<(Service, TicketStore)> {
        let service = self.connect(toasts)?;
        let mut store = self.new_store();
        let count = service.load(&mut store)?;
        tracing::debug!(count, "tickets loaded");
        Ok((service, store))
    }

    /// Print queued toasts to stderr unless `--quiet`, then hand back
    /// `result`. Toasts raised by a failed write show before the error.
    pub fn finish<T, E>(&self, toasts: &ToastQueue, result: Result<T, E>) -> Result<T, E> {
        self.finish_to(&mut io::stderr().lock(), toasts, result)
    }

    fn finish_to<T, E>(
        &self,
        out: &mut dyn io::Write,
        toasts: &ToastQueue,
        result: Result<T, E>,
    ) -> Result<T, E> {
        for toast in toasts.drain() {
            if !self.quiet {
                // stderr is best effort
                let _ = writeln!(out, "{}", toast_line(&toast));
            }
        }
        result
    }
}

/// `[level] message`.
pub fn toast_line(toast: &Toast) -> String {
    format!("[{}] {}", toast.level, toast.message)
}

/// Where read-only commands get their tickets from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Read tickets and projects from a JSON snapshot instead of the backend.
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,
}

impl SourceArgs {
    /// Fill a fresh store from the snapshot or the backend.
    ///
    /// # Errors
    ///
    /// Snapshot read/parse failures, or backend configuration and read failures.
    pub fn load(&self, ctx: &Context) -> anyhow::Result<TicketStore> {
        match &self.snapshot {
            Some(path) => {
                let (tickets, projects) = read_snapshot(path)?;
                let mut store = ctx.new_store();
                store.replace_all(tickets, projects);
                Ok(store)
            }
            None => {
                let (_, store) = ctx.connect_loaded(&ToastQueue::new())?;
                Ok(store)
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    tickets: Vec<Value>,
    #[serde(default)]
    projects: Vec<Project>,
}

/// Read `{"tickets": [...], "projects": [...]}`. Ticket rows that do not
/// decode are skipped with a warning, as on a backend load.
///
/// # Errors
///
/// Fails when the file cannot be read or is not a snapshot object.
pub fn read_snapshot(path: &Path) -> anyhow::Result<(Vec<Ticket>, Vec<Project>)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;

    let tickets = snapshot
        .tickets
        .into_iter()
        .filter_map(|row| match Ticket::from_row(row) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable snapshot row");
                None
            }
        })
        .collect();
    Ok((tickets, snapshot.projects))
}

/// Accepts `12` or `#12`.
pub fn parse_ticket_id(raw: &str) -> Result<TicketId, String> {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('#')
        .unwrap_or(trimmed)
        .parse::<TicketId>()
        .map_err(|_| format!("invalid ticket id '{raw}'"))
}

/// One-line badge summary, e.g. `6 tickets  4 active  1 unassigned  2 mine  (Open 3, Blocked 1)`.
pub fn badge_summary(badges: &BadgeCounts) -> String {
    let mut line = format!(
        "{} tickets  {} active  {} unassigned  {} mine",
        badges.total, badges.active, badges.unassigned, badges.mine
    );
    let by_status: Vec<String> = badges
        .by_status
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(status, count)| format!("{status} {count}"))
        .collect();
    if !by_status.is_empty() {
        line.push_str(&format!("  ({})", by_status.join(", ")));
    }
    line
}

//! Drives one change feed into a [`TicketStore`].
//!
//! Each [`LiveSession::step`] lets the supervisor (re)subscribe when due,
//! waits for at most one message, merges it, and fires the debounced refresh
//! when its deadline has passed. Callers loop over `step` with the current
//! time.

use std::time::{Duration, Instant};

use super::feed::{ChangeFeed, ChannelStatus, FeedError, FeedMessage};
use super::merge::MergeOutcome;
use super::supervisor::{ReconnectPolicy, Supervisor, SupervisorAction};
use crate::error::ErrorCode;
use crate::store::TicketStore;

/// Something the caller may want to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Status(ChannelStatus),
    Merged(MergeOutcome),
    /// The view was recomputed; re-render.
    Refreshed,
}

pub struct LiveSession<F> {
    feed: F,
    supervisor: Supervisor,
    channel: String,
    table: String,
}

impl<F: ChangeFeed> LiveSession<F> {
    pub fn new(
        feed: F,
        channel: impl Into<String>,
        table: impl Into<String>,
        policy: ReconnectPolicy,
        now: Instant,
    ) -> Self {
        Self {
            feed,
            supervisor: Supervisor::new(policy, now),
            channel: channel.into(),
            table: table.into(),
        }
    }

    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.supervisor.is_subscribed()
    }

    #[must_use]
    pub const fn feed(&self) -> &F {
        &self.feed
    }

    /// Run one iteration, blocking for at most `max_wait`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] once the feed is exhausted. Transport
    /// errors while subscribing are handed to the supervisor instead.
    pub fn step(
        &mut self,
        store: &mut TicketStore,
        now: Instant,
        max_wait: Duration,
    ) -> Result<Vec<SessionEvent>, FeedError> {
        let mut events = Vec::new();

        if let Some(SupervisorAction::Subscribe { attempt }) = self.supervisor.poll(now) {
            tracing::debug!(channel = %self.channel, attempt, "subscribing");
            match self.feed.subscribe(&self.channel, &self.table) {
                Ok(()) => {}
                Err(FeedError::Closed) => return Err(FeedError::Closed),
                Err(e) => {
                    tracing::warn!(code = %ErrorCode::SubscriptionFailed, error = %e, attempt, "subscribe request failed");
                    self.supervisor.on_subscribe_failed(now);
                }
            }
        }

        let mut deadline = self.supervisor.next_deadline();
        if let Some(refresh) = store.next_refresh_deadline() {
            deadline = deadline.min(refresh);
        }
        let wait = deadline.saturating_duration_since(now).min(max_wait);

        match self.feed.next_message(wait)? {
            Some(FeedMessage::Status(status)) => {
                self.supervisor.on_status(status, now);
                events.push(SessionEvent::Status(status));
            }
            Some(FeedMessage::Change(payload)) => {
                if let Some(outcome) = store.apply_change(&payload, now) {
                    events.push(SessionEvent::Merged(outcome));
                }
            }
            None => {}
        }

        if store.poll_refresh(now) {
            events.push(SessionEvent::Refreshed);
        }
        Ok(events)
    }
}

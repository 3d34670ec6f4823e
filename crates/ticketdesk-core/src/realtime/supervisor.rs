//! Self-healing subscription policy.
//!
//! The [`Supervisor`] decides when to (re)subscribe to the change channel:
//!
//! - once at startup;
//! - after a fixed backoff when the channel reports an error or a timeout;
//! - on a periodic liveness check when the subscribed flag is not set
//!   (the handshake never completed, or the channel closed quietly).
//!
//! It holds no transport; callers feed it statuses and the current time and
//! act on the returned [`SupervisorAction`]. Time is injected so the policy
//! is testable without sleeping.

use std::time::{Duration, Instant};

use super::feed::ChannelStatus;
use crate::error::ErrorCode;

/// Backoff and liveness timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before resubscribing after an error or timeout.
    pub retry_backoff: Duration,
    /// Period of the liveness check.
    pub liveness_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(5),
            liveness_interval: Duration::from_secs(30),
        }
    }
}

/// What the caller should do now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    /// Issue a subscribe request. `attempt` counts consecutive attempts since
    /// the last successful subscription, starting at 1.
    Subscribe { attempt: u32 },
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    policy: ReconnectPolicy,
    started: bool,
    subscribed: bool,
    retry_at: Option<Instant>,
    next_liveness: Instant,
    attempts: u32,
}

impl Supervisor {
    #[must_use]
    pub fn new(policy: ReconnectPolicy, now: Instant) -> Self {
        Self {
            policy,
            started: false,
            subscribed: false,
            retry_at: None,
            next_liveness: now + policy.liveness_interval,
            attempts: 0,
        }
    }

    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    #[must_use]
    pub const fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Record a lifecycle status reported by the channel.
    pub fn on_status(&mut self, status: ChannelStatus, now: Instant) {
        match status {
            ChannelStatus::Subscribed => {
                tracing::info!(attempts = self.attempts, "change channel subscribed");
                self.subscribed = true;
                self.retry_at = None;
                self.attempts = 0;
            }
            ChannelStatus::ChannelError | ChannelStatus::TimedOut => {
                tracing::warn!(
                    code = %ErrorCode::SubscriptionFailed,
                    %status,
                    backoff = ?self.policy.retry_backoff,
                    "change channel failed; scheduling resubscribe"
                );
                self.subscribed = false;
                self.schedule_retry(now);
            }
            ChannelStatus::Closed => {
                tracing::info!("change channel closed");
                self.subscribed = false;
            }
        }
    }

    /// Record that a subscribe request could not be issued at all.
    pub fn on_subscribe_failed(&mut self, now: Instant) {
        self.subscribed = false;
        self.schedule_retry(now);
    }

    /// Decide whether to subscribe now.
    pub fn poll(&mut self, now: Instant) -> Option<SupervisorAction> {
        if !self.started {
            self.started = true;
            return Some(self.subscribe());
        }

        if let Some(at) = self.retry_at {
            if now >= at {
                self.retry_at = None;
                return Some(self.subscribe());
            }
        }

        if now >= self.next_liveness {
            self.next_liveness = now + self.policy.liveness_interval;
            if !self.subscribed && self.retry_at.is_none() {
                tracing::warn!("liveness check found channel unsubscribed; resubscribing");
                return Some(self.subscribe());
            }
        }

        None
    }

    /// Earliest instant at which [`Supervisor::poll`] may act.
    #[must_use]
    pub fn next_deadline(&self) -> Instant {
        self.retry_at
            .map_or(self.next_liveness, |at| at.min(self.next_liveness))
    }

    fn schedule_retry(&mut self, now: Instant) {
        if self.retry_at.is_none() {
            self.retry_at = Some(now + self.policy.retry_backoff);
        }
    }

    fn subscribe(&mut self) -> SupervisorAction {
        self.attempts = self.attempts.saturating_add(1);
        self.subscribed = false;
        SupervisorAction::Subscribe {
            attempt: self.attempts,
        }
    }
}

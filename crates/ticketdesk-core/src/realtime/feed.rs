//! Change feed transports.
//!
//! A [`ChangeFeed`] delivers two kinds of messages from one ordered channel:
//! subscription lifecycle updates and raw change payloads. Payloads stay raw
//! JSON here; normalization happens in [`super::notification`].

use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Subscription lifecycle reported by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

impl ChannelStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribed => "SUBSCRIBED",
            Self::ChannelError => "CHANNEL_ERROR",
            Self::TimedOut => "TIMED_OUT",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SUBSCRIBED" => Ok(Self::Subscribed),
            "CHANNEL_ERROR" => Ok(Self::ChannelError),
            "TIMED_OUT" => Ok(Self::TimedOut),
            "CLOSED" => Ok(Self::Closed),
            other => Err(format!("unknown channel status '{other}'")),
        }
    }
}

/// One message from the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Status(ChannelStatus),
    Change(Value),
}

impl FeedMessage {
    /// Classify a decoded line: `{"status": "<STATUS>"}` is a lifecycle
    /// update, anything else is a change payload.
    #[must_use]
    pub fn classify(value: Value) -> Self {
        let status = value
            .as_object()
            .filter(|object| object.len() == 1)
            .and_then(|object| object.get("status"))
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<ChannelStatus>().ok());
        match status {
            Some(status) => Self::Status(status),
            None => Self::Change(value),
        }
    }
}

/// Feed transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("change feed closed")]
    Closed,
    #[error("change feed failed: {0}")]
    Transport(String),
}

/// Source of subscription lifecycle updates and change payloads.
pub trait ChangeFeed {
    /// Subscribe (or resubscribe) to `channel`, scoped to `table`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] when the request could not be issued.
    fn subscribe(&mut self, channel: &str, table: &str) -> Result<(), FeedError>;

    /// Wait up to `timeout` for the next message. `Ok(None)` means nothing
    /// arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] once the source is exhausted.
    fn next_message(&mut self, timeout: Duration) -> Result<Option<FeedMessage>, FeedError>;
}

/// Newline-delimited JSON read from any reader on a background thread.
///
/// Used behind a bridge process that relays the hosted channel to stdout, or
/// to replay a captured session from a file. A line source has no
/// handshake: subscribing succeeds immediately while the source is open.
/// Lines that are not JSON are logged and skipped.
pub struct LineFeed {
    rx: Receiver<FeedMessage>,
    pending: VecDeque<FeedMessage>,
    closed: bool,
}

impl LineFeed {
    /// Start reading `reader` on a background thread.
    pub fn spawn<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for (line_no, line) in reader.lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(line = line_no + 1, error = %e, "change feed read failed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(&line) {
                    Ok(value) => {
                        if tx.send(FeedMessage::classify(value)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(line = line_no + 1, error = %e, "skipping non-JSON feed line");
                    }
                }
            }
        });

        Self {
            rx,
            pending: VecDeque::new(),
            closed: false,
        }
    }
}

impl ChangeFeed for LineFeed {
    fn subscribe(&mut self, channel: &str, table: &str) -> Result<(), FeedError> {
        if self.closed {
            return Err(FeedError::Closed);
        }
        tracing::debug!(channel, table, "line feed subscribed");
        self.pending
            .push_back(FeedMessage::Status(ChannelStatus::Subscribed));
        Ok(())
    }

    fn next_message(&mut self, timeout: Duration) -> Result<Option<FeedMessage>, FeedError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }
        if self.closed {
            return Err(FeedError::Closed);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                Err(FeedError::Closed)
            }
        }
    }
}

/// In-process feed with scripted messages, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    queue: VecDeque<FeedMessage>,
    subscriptions: Vec<(String, String)>,
    failing_subscribes: usize,
    ack_subscribe: bool,
}

impl MemoryFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every successful subscribe with a `SUBSCRIBED` status.
    #[must_use]
    pub const fn acknowledging(mut self) -> Self {
        self.ack_subscribe = true;
        self
    }

    /// Make the next `count` subscribe calls fail.
    pub const fn fail_subscribes(&mut self, count: usize) {
        self.failing_subscribes = count;
    }

    pub fn push(&mut self, message: FeedMessage) {
        self.queue.push_back(message);
    }

    pub fn push_change(&mut self, payload: Value) {
        self.push(FeedMessage::Change(payload));
    }

    /// `(channel, table)` for every successful subscribe, oldest first.
    #[must_use]
    pub fn subscriptions(&self) -> &[(String, String)] {
        &self.subscriptions
    }
}

impl ChangeFeed for MemoryFeed {
    fn subscribe(&mut self, channel: &str, table: &str) -> Result<(), FeedError> {
        if self.failing_subscribes > 0 {
            self.failing_subscribes -= 1;
            return Err(FeedError::Transport("subscribe rejected".into()));
        }
        self.subscriptions
            .push((channel.to_string(), table.to_string()));
        if self.ack_subscribe {
            self.queue
                .push_back(FeedMessage::Status(ChannelStatus::Subscribed));
        }
        Ok(())
    }

    fn next_message(&mut self, _timeout: Duration) -> Result<Option<FeedMessage>, FeedError> {
        Ok(self.queue.pop_front())
    }
}

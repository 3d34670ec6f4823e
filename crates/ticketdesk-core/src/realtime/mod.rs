//! Realtime change channel: payload normalization, cache merge, creation
//! suppression, feed transports and the reconnecting supervisor.
//!
//! Notifications are processed strictly one at a time in arrival order:
//! normalize at the edge ([`notification`]), then merge ([`merge`]). Only the
//! re-render that follows a merge is debounced (see [`crate::store`]).

pub mod feed;
pub mod guard;
pub mod merge;
pub mod notification;
pub mod session;
pub mod supervisor;

pub use feed::{ChangeFeed, ChannelStatus, FeedError, FeedMessage, LineFeed, MemoryFeed};
pub use guard::{CreationFlag, CreationGuard};
pub use merge::{MergeOutcome, Merger, SkipReason};
pub use notification::{ChangeKind, ChangeNotification, MalformedNotification, Row};
pub use session::{LiveSession, SessionEvent};
pub use supervisor::{ReconnectPolicy, Supervisor, SupervisorAction};

//! ticketdesk-core library.
//!
//! Owns the client-side ticket cache of a hosted ticket tracker and the two
//! pieces of lifecycle logic that keep it coherent:
//!
//! - [`transition`]: derives the timestamp writes that accompany a status
//!   change.
//! - [`realtime`]: normalizes change notifications from the backend's
//!   publish/subscribe channel and merges them into the cache.
//!
//! [`store::TicketStore`] is the cache itself; [`service::TicketService`]
//! performs backend writes through [`backend::DataApi`] and applies them to it.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per concern, mapped to [`error::ErrorCode`];
//!   `anyhow::Result` for configuration loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod realtime;
pub mod service;
pub mod store;
pub mod transition;
pub mod view;

//! Ticket data model: statuses, tickets, projects and audit entries.

pub mod audit;
pub mod project;
pub mod status;
pub mod ticket;
pub mod timestamp;

pub use audit::AuditEntry;
pub use project::{Project, ProjectDirectory};
pub use status::{ParseStatusError, Status};
pub use ticket::{Ticket, TicketDraft, TicketId};

//! `td status`: move one ticket to a new status.
//!
//! The lifecycle timestamps that go with the move are derived by the
//! transition resolver and written in the same update as the status.

use chrono::Utc;
use clap::Args;
use serde::Serialize;
use serde_json::{Map, Value};
use ticketdesk_core::model::{Status, TicketId};
use ticketdesk_core::notify::ToastQueue;

use super::{Context, parse_ticket_id};
use crate::output::render;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Ticket id (`12` or `#12`).
    #[arg(value_parser = parse_ticket_id)]
    pub id: TicketId,

    /// Target status, e.g. `open`, `in-progress`, `"On Hold"`, `completed`.
    pub status: Status,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    ok: bool,
    id: TicketId,
    status: Status,
    /// Columns sent to the backend, audit log excluded.
    written: Map<String, Value>,
}

pub fn run_status(args: &StatusArgs, ctx: &Context) -> anyhow::Result<()> {
    let user = ctx.require_user()?;
    let toasts = ToastQueue::new();
    let (service, mut store) = ctx.connect_loaded(&toasts)?;

    let attempt = service.change_status(&mut store, args.id, args.status, &user, Utc::now());
    let patch = ctx.finish(&toasts, attempt)?;

    let result = StatusOutput {
        ok: true,
        id: args.id,
        status: patch.status,
        written: patch.to_fields(),
    };
    render(ctx.output, &result, |r, w| {
        writeln!(w, "✓ #{}: {}", r.id, r.status)?;
        for (column, value) in r.written.iter().filter(|(c, _)| *c != "status") {
            match value {
                Value::Null => writeln!(w, "  {column} cleared")?,
                Value::String(ts) => writeln!(w, "  {column} = {ts}")?,
                other => writeln!(w, "  {column} = {other}")?,
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: StatusArgs,
    }

    #[test]
    fn parses_id_and_status() {
        let w = Wrapper::parse_from(["test", "#42", "on-hold"]);
        assert_eq!(w.args.id, 42);
        assert_eq!(w.args.status, Status::OnHold);
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(Wrapper::try_parse_from(["test", "1", "Done-ish"]).is_err());
    }
}

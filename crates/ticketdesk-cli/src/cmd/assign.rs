//! `td assign`: set, replace or clear a ticket's assignee.

use chrono::Utc;
use clap::Args;
use serde::Serialize;
use ticketdesk_core::model::TicketId;
use ticketdesk_core::notify::ToastQueue;

use super::{Context, parse_ticket_id};
use crate::output::render;

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Ticket id (`12` or `#12`).
    #[arg(value_parser = parse_ticket_id)]
    pub id: TicketId,

    /// Person to assign.
    #[arg(value_name = "ASSIGNEE", required_unless_present = "clear")]
    pub assignee: Option<String>,

    /// Remove the current assignee.
    #[arg(long, conflicts_with = "assignee")]
    pub clear: bool,
}

#[derive(Debug, Serialize)]
struct AssignOutput {
    ok: bool,
    id: TicketId,
    assignee: Option<String>,
    changed: bool,
}

pub fn run_assign(args: &AssignArgs, ctx: &Context) -> anyhow::Result<()> {
    let user = ctx.require_user()?;
    let assignee = if args.clear {
        None
    } else {
        args.assignee.as_deref()
    };

    let toasts = ToastQueue::new();
    let (service, mut store) = ctx.connect_loaded(&toasts)?;
    let attempt = service.assign(&mut store, args.id, assignee, &user, Utc::now());
    let written = ctx.finish(&toasts, attempt)?;

    let result = AssignOutput {
        ok: true,
        id: args.id,
        assignee: store.get(args.id).and_then(|t| t.assignee.clone()),
        changed: !written.is_empty(),
    };
    render(ctx.output, &result, |r, w| match (&r.assignee, r.changed) {
        (_, false) => writeln!(w, "#{}: assignee unchanged", r.id),
        (Some(name), true) => writeln!(w, "✓ #{}: assigned {name}", r.id),
        (None, true) => writeln!(w, "✓ #{}: unassigned", r.id),
    })
}

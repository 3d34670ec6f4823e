//! `td bulk-status`: move several tickets to one status in a single call.

use chrono::Utc;
use clap::Args;
use serde::Serialize;
use ticketdesk_core::model::{Status, TicketId};
use ticketdesk_core::notify::ToastQueue;

use super::{Context, parse_ticket_id};
use crate::output::render;

#[derive(Args, Debug)]
pub struct BulkStatusArgs {
    /// Ticket ids (`12` or `#12`).
    #[arg(required = true, num_args = 1.., value_parser = parse_ticket_id)]
    pub ids: Vec<TicketId>,

    /// Target status for every listed ticket.
    #[arg(short, long)]
    pub status: Status,
}

#[derive(Debug, Serialize)]
struct BulkOutput {
    ok: bool,
    status: Status,
    updated: Vec<TicketId>,
    unchanged: Vec<TicketId>,
}

fn id_list(ids: &[TicketId]) -> String {
    ids.iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run_bulk_status(args: &BulkStatusArgs, ctx: &Context) -> anyhow::Result<()> {
    let user = ctx.require_user()?;
    let mut ids: Vec<TicketId> = Vec::with_capacity(args.ids.len());
    for id in &args.ids {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }

    let toasts = ToastQueue::new();
    let (service, mut store) = ctx.connect_loaded(&toasts)?;
    let attempt = service.bulk_status(&mut store, &ids, args.status, &user, Utc::now());
    let outcome = ctx.finish(&toasts, attempt)?;

    let result = BulkOutput {
        ok: true,
        status: args.status,
        updated: outcome.updated,
        unchanged: outcome.unchanged,
    };
    render(ctx.output, &result, |r, w| {
        if !r.updated.is_empty() {
            writeln!(w, "✓ {} -> {}", id_list(&r.updated), r.status)?;
        }
        if !r.unchanged.is_empty() {
            writeln!(w, "  already {}: {}", r.status, id_list(&r.unchanged))?;
        }
        Ok(())
    })
}

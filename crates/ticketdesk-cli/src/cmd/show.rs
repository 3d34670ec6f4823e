//! `td show`: one ticket with its change history.

use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::Value;
use std::io::{self, Write};
use ticketdesk_core::error::TicketError;
use ticketdesk_core::model::{Ticket, TicketId};

use super::{Context, SourceArgs, parse_ticket_id};
use crate::output::{pretty_kv, pretty_section, render};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Ticket id (`12` or `#12`).
    #[arg(value_parser = parse_ticket_id)]
    pub id: TicketId,

    #[command(flatten)]
    pub source: SourceArgs,
}

fn when(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "(none)".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_ticket(t: &Ticket, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("#{} {}", t.id, t.title))?;
    pretty_kv(w, "Status", t.status.as_str())?;
    let project = if t.project_name.is_empty() {
        "-"
    } else {
        t.project_name.as_str()
    };
    pretty_kv(w, "Project", project)?;
    for (key, value) in [
        ("Epic", &t.epic),
        ("Type", &t.ticket_type),
        ("Priority", &t.priority),
        ("Assignee", &t.assignee),
        ("Created by", &t.created_by),
    ] {
        pretty_kv(w, key, value.as_deref().unwrap_or("-"))?;
    }
    pretty_kv(w, "Created", when(t.created_at))?;
    pretty_kv(w, "Assigned", when(t.assigned_at))?;
    pretty_kv(w, "Started", when(t.started_at))?;
    pretty_kv(w, "Completed", when(t.completed_at))?;

    if let Some(description) = t.description.as_deref().filter(|d| !d.trim().is_empty()) {
        writeln!(w)?;
        writeln!(w, "{}", description.trim_end())?;
    }

    let history = t.audit_entries();
    if !history.is_empty() {
        writeln!(w)?;
        pretty_section(w, "History")?;
        for entry in history {
            writeln!(
                w,
                "{}  {}  {}: {} -> {}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.user,
                entry.field,
                cell(&entry.old_value),
                cell(&entry.new_value)
            )?;
        }
    }
    Ok(())
}

pub fn run_show(args: &ShowArgs, ctx: &Context) -> anyhow::Result<()> {
    let store = args.source.load(ctx)?;
    let ticket = store.get(args.id).ok_or(TicketError::NotFound(args.id))?;
    render(ctx.output, ticket, write_ticket)
}

//! `td list`: the active ticket list with filters and sort order.

use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use ticketdesk_core::model::{Status, Ticket};
use ticketdesk_core::view::{AssigneeFilter, SortField, SortOrder, TicketFilter};

use super::{Context, SourceArgs, badge_summary};
use crate::output::{ListItem, OutputMode, render_list};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only tickets in this status (repeatable).
    #[arg(short, long = "status", value_name = "STATUS")]
    pub statuses: Vec<Status>,

    /// Only tickets in this project id.
    #[arg(short, long)]
    pub project: Option<i64>,

    /// Only tickets assigned to this person.
    #[arg(short, long, conflicts_with_all = ["unassigned", "mine"])]
    pub assignee: Option<String>,

    /// Only tickets without an assignee.
    #[arg(long, conflicts_with = "mine")]
    pub unassigned: bool,

    /// Only tickets assigned to the current user.
    #[arg(long)]
    pub mine: bool,

    /// Only tickets in this epic.
    #[arg(long)]
    pub epic: Option<String>,

    /// Case-insensitive text match on title, description, epic or `#id`.
    #[arg(long)]
    pub search: Option<String>,

    /// Hide Cancelled, Rejected and Completed tickets.
    #[arg(long)]
    pub active: bool,

    /// Sort column: id, created, updated, status, priority, title.
    #[arg(long, default_value = "id")]
    pub sort: SortField,

    /// Ascending instead of descending.
    #[arg(long)]
    pub asc: bool,

    /// Maximum tickets to show.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

impl ListArgs {
    fn filter(&self, ctx: &Context) -> anyhow::Result<TicketFilter> {
        let assignee = if self.unassigned {
            Some(AssigneeFilter::Unassigned)
        } else if self.mine {
            Some(AssigneeFilter::Named(ctx.require_user()?))
        } else {
            self.assignee.clone().map(AssigneeFilter::Named)
        };

        Ok(TicketFilter {
            statuses: self.statuses.clone(),
            project_id: self.project,
            assignee,
            epic: self.epic.clone(),
            text: self.search.clone(),
            hide_terminal: self.active,
        })
    }

    const fn order(&self) -> SortOrder {
        SortOrder {
            field: self.sort,
            descending: !self.asc,
        }
    }
}

/// One ticket in list output; serializes as the ticket itself.
#[derive(Serialize)]
#[serde(transparent)]
pub struct TicketRow<'a>(pub &'a Ticket);

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

impl ListItem for TicketRow<'_> {
    const COLUMNS: &'static [&'static str] = &["ID", "STATUS", "PRIORITY", "ASSIGNEE", "TITLE"];

    fn cells(&self) -> Vec<String> {
        let t = self.0;
        vec![
            t.id.to_string(),
            t.status.to_string(),
            or_dash(t.priority.as_deref()).to_string(),
            or_dash(t.assignee.as_deref()).to_string(),
            t.title.clone(),
        ]
    }

    fn write_card(&self, w: &mut dyn Write) -> io::Result<()> {
        let t = self.0;
        writeln!(w, "#{:<5} {:<12} {}", t.id, t.status.as_str(), t.title)?;
        writeln!(
            w,
            "       {}  {}  {}",
            or_dash(Some(t.project_name.as_str())),
            or_dash(t.assignee.as_deref()),
            or_dash(t.priority.as_deref())
        )
    }
}

pub fn run_list(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let filter = args.filter(ctx)?;
    let mut store = args.source.load(ctx)?;
    store.set_filter(filter);
    store.set_sort(args.order());

    let rows: Vec<TicketRow<'_>> = store
        .view()
        .take(args.limit.unwrap_or(usize::MAX))
        .map(TicketRow)
        .collect();
    render_list(&rows, ctx.output)?;

    if ctx.output == OutputMode::Pretty && !ctx.quiet {
        println!("{}", badge_summary(store.badges()));
    }
    Ok(())
}

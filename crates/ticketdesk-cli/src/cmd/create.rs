//! `td create`: insert one ticket from flags or several from a JSON file.
//!
//! Drafts are validated before anything touches the network. After a
//! successful insert the creation is announced through the notify relay when
//! `[notify]` is configured.

use anyhow::Context as _;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use ticketdesk_core::model::{Status, TicketDraft, TicketId};
use ticketdesk_core::notify::ToastQueue;
use ticketdesk_core::service::validate_drafts;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Ticket title.
    #[arg(short, long)]
    pub title: Option<String>,

    /// Project id.
    #[arg(short, long)]
    pub project: Option<i64>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    /// Ticket type, e.g. `bug` or `request`.
    #[arg(long = "type")]
    pub ticket_type: Option<String>,

    #[arg(long)]
    pub epic: Option<String>,

    #[arg(short, long)]
    pub assignee: Option<String>,

    /// Initial status; defaults to Open.
    #[arg(short, long)]
    pub status: Option<Status>,

    /// JSON file with one draft object or an array of drafts.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["title", "project", "description"])]
    pub file: Option<PathBuf>,
}

impl CreateArgs {
    fn drafts(&self) -> anyhow::Result<Vec<TicketDraft>> {
        if let Some(path) = &self.file {
            return read_drafts(path);
        }
        Ok(vec![TicketDraft {
            title: self.title.clone().unwrap_or_default(),
            description: self.description.clone(),
            status: self.status,
            priority: self.priority.clone(),
            ticket_type: self.ticket_type.clone(),
            project_id: self.project,
            epic: self.epic.clone(),
            assignee: self.assignee.clone(),
        }])
    }
}

fn read_drafts(path: &Path) -> anyhow::Result<Vec<TicketDraft>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
    let drafts = match value {
        Value::Array(_) => serde_json::from_value(value),
        other => serde_json::from_value(other).map(|draft| vec![draft]),
    }
    .with_context(|| format!("{} does not contain ticket drafts", path.display()))?;
    Ok(drafts)
}

#[derive(Debug, Serialize)]
struct CreateOutput {
    ok: bool,
    ids: Vec<TicketId>,
}

pub fn run_create(args: &CreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let drafts = args.drafts()?;
    validate_drafts(&drafts)?;
    let user = ctx.require_user()?;

    let toasts = ToastQueue::new();
    let (service, mut store) = ctx.connect_loaded(&toasts)?;
    let attempt = service.create(&mut store, drafts, &user, Utc::now());
    let ids = ctx.finish(&toasts, attempt)?;

    render(ctx.output, &CreateOutput { ok: true, ids }, |r, w| {
        for id in &r.ids {
            let title = store.get(*id).map_or("", |t| t.title.as_str());
            writeln!(w, "✓ created #{id} {title}")?;
        }
        Ok(())
    })
}

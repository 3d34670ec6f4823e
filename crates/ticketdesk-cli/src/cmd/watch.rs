//! `td watch`: keep the cache live from a stream of change notifications.
//!
//! Notifications arrive as newline-delimited JSON on stdin (from a bridge that
//! relays the hosted channel) or from a captured file. Each one is merged as it
//! arrives; the badge summary is reprinted after every debounced refresh.

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use ticketdesk_core::model::TicketId;
use ticketdesk_core::notify::Toast;
use ticketdesk_core::realtime::{FeedError, LineFeed, LiveSession, MergeOutcome, SessionEvent};
use ticketdesk_core::store::TicketStore;
use ticketdesk_core::view::BadgeCounts;

use super::{Context, SourceArgs, badge_summary, toast_line};
use crate::output::OutputMode;

/// Upper bound on one blocking wait, so deadlines are rechecked regularly.
const MAX_WAIT: Duration = Duration::from_secs(1);

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Newline-delimited change payloads; defaults to stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Channel name; defaults to `[realtime] channel`.
    #[arg(long)]
    pub channel: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchLine<'a> {
    Ready { tickets: usize },
    Channel { status: &'a str },
    Inserted { id: TicketId, title: &'a str },
    Updated { id: TicketId },
    Deleted { id: TicketId },
    Refresh { visible: usize, badges: &'a BadgeCounts },
}

impl WatchLine<'_> {
    const fn is_detail(&self) -> bool {
        matches!(
            self,
            Self::Channel { .. } | Self::Updated { .. } | Self::Deleted { .. }
        )
    }

    fn human(&self) -> String {
        match self {
            Self::Ready { tickets } => format!("watching {tickets} tickets"),
            Self::Channel { status } => format!("channel {status}"),
            Self::Inserted { id, title } => {
                toast_line(&Toast::info(format!("New ticket #{id}: {title}")))
            }
            Self::Updated { id } => format!("updated #{id}"),
            Self::Deleted { id } => format!("deleted #{id}"),
            Self::Refresh { badges, .. } => badge_summary(badges),
        }
    }
}

fn emit(out: &mut dyn Write, ctx: &Context, line: &WatchLine<'_>) -> anyhow::Result<()> {
    match ctx.output {
        OutputMode::Json => {
            serde_json::to_writer(&mut *out, line)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            if ctx.quiet && line.is_detail() {
                return Ok(());
            }
            writeln!(out, "{}", line.human())?;
        }
    }
    out.flush()?;
    Ok(())
}

fn refresh_line(store: &TicketStore) -> WatchLine<'_> {
    WatchLine::Refresh {
        visible: store.view_ids().len(),
        badges: store.badges(),
    }
}

fn report(
    out: &mut dyn Write,
    ctx: &Context,
    store: &TicketStore,
    event: &SessionEvent,
) -> anyhow::Result<()> {
    match event {
        SessionEvent::Status(status) => emit(
            out,
            ctx,
            &WatchLine::Channel {
                status: status.as_str(),
            },
        ),
        SessionEvent::Merged(MergeOutcome::Inserted { id, title }) => {
            emit(out, ctx, &WatchLine::Inserted { id: *id, title })
        }
        SessionEvent::Merged(MergeOutcome::Updated { id }) => {
            emit(out, ctx, &WatchLine::Updated { id: *id })
        }
        SessionEvent::Merged(MergeOutcome::Deleted { id }) => {
            emit(out, ctx, &WatchLine::Deleted { id: *id })
        }
        SessionEvent::Merged(MergeOutcome::Skipped { id, reason }) => {
            tracing::debug!(ticket_id = id, ?reason, "notification skipped");
            Ok(())
        }
        SessionEvent::Refreshed => emit(out, ctx, &refresh_line(store)),
    }
}

fn open_input(input: Option<&Path>) -> anyhow::Result<Box<dyn BufRead + Send>> {
    Ok(match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

pub fn run_watch(args: &WatchArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut store = args.source.load(ctx)?;
    let feed = LineFeed::spawn(open_input(args.input.as_deref())?);

    let realtime = &ctx.config.realtime;
    let channel = args
        .channel
        .clone()
        .unwrap_or_else(|| realtime.channel.clone());
    let mut session = LiveSession::new(
        feed,
        channel,
        ctx.config.backend.tables.tickets.clone(),
        realtime.reconnect_policy(),
        Instant::now(),
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    emit(
        &mut out,
        ctx,
        &WatchLine::Ready {
            tickets: store.len(),
        },
    )?;

    loop {
        match session.step(&mut store, Instant::now(), MAX_WAIT) {
            Ok(events) => {
                for event in &events {
                    report(&mut out, ctx, &store, event)?;
                }
            }
            Err(FeedError::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!("change feed closed");
    if store.flush_refresh() {
        emit(&mut out, ctx, &refresh_line(&store))?;
    }
    Ok(())
}

#![forbid(unsafe_code)]

mod cmd;
mod identity;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use ticketdesk_core::config::resolve_config;
use ticketdesk_core::error::ErrorCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "td: terminal client for the ticketdesk tracker",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Name recorded in audit entries (overrides TICKETDESK_USER and config).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Config file to use instead of the default lookup.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Load config and settle the output mode.
    fn context(&self) -> Result<cmd::Context, CliError> {
        let cwd = env::current_dir().map_err(|e| CliError::new(e.to_string()))?;
        let effective = resolve_config(self.config.as_deref(), &cwd)
            .map_err(|e| CliError::coded(ErrorCode::ConfigParseError, format!("{e:#}")))?;
        let output = output::resolve_output_mode(
            self.format,
            self.json,
            effective.config.output.as_deref(),
        );
        Ok(cmd::Context {
            config: effective.config,
            output,
            user_flag: self.user.clone(),
            quiet: self.quiet,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List tickets",
        long_about = "List tickets with optional filters and sort order.",
        after_help = "EXAMPLES:\n    # Active tickets, newest first\n    td list --active\n\n    # Unassigned tickets in project 2, by priority\n    td list -p 2 --unassigned --sort priority\n\n    # Offline from a snapshot\n    td list --snapshot tickets.json --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one ticket",
        long_about = "Show full details and change history for a single ticket.",
        after_help = "EXAMPLES:\n    # Show a ticket\n    td show 42\n\n    # Emit machine-readable output\n    td show '#42' --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Change a ticket's status",
        long_about = "Move a ticket to a new status. Started and completed timestamps are written alongside.",
        after_help = "EXAMPLES:\n    # Start work\n    td status 42 in-progress\n\n    # Close it\n    td status 42 completed"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Assign or unassign a ticket",
        after_help = "EXAMPLES:\n    # Assign\n    td assign 42 \"Sam Rivera\"\n\n    # Unassign\n    td assign 42 --clear"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Create tickets",
        long_about = "Create one ticket from flags or several from a JSON file.",
        after_help = "EXAMPLES:\n    # Create a ticket\n    td create --title \"Printer jam\" --project 2\n\n    # Create several\n    td create --file drafts.json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Change the status of several tickets at once",
        after_help = "EXAMPLES:\n    # Close three tickets\n    td bulk-status 4 7 9 --status completed"
    )]
    BulkStatus(cmd::bulk_status::BulkStatusArgs),

    #[command(
        next_help_heading = "Realtime",
        about = "Follow live ticket changes",
        long_about = "Merge newline-delimited change notifications into the ticket cache and print badge counts after each refresh.",
        after_help = "EXAMPLES:\n    # Follow a bridge process\n    realtime-bridge | td watch\n\n    # Replay a captured session offline\n    td watch --snapshot tickets.json --input changes.jsonl"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    td completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TICKETDESK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "ticketdesk=debug,td=debug,info"
        } else {
            "ticketdesk=info,td=info,warn"
        })
    });

    let format = env::var("TICKETDESK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for command output.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(command: Commands, ctx: &cmd::Context) -> anyhow::Result<()> {
    match command {
        Commands::List(args) => cmd::list::run_list(&args, ctx),
        Commands::Show(args) => cmd::show::run_show(&args, ctx),
        Commands::Status(args) => cmd::status::run_status(&args, ctx),
        Commands::Assign(args) => cmd::assign::run_assign(&args, ctx),
        Commands::Create(args) => cmd::create::run_create(&args, ctx),
        Commands::BulkStatus(args) => cmd::bulk_status::run_bulk_status(&args, ctx),
        Commands::Watch(args) => cmd::watch::run_watch(&args, ctx),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn fail(mode: OutputMode, error: &CliError) -> ExitCode {
    if let Err(e) = output::render_error(mode, error) {
        eprintln!("error: {} ({e})", error.message);
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let ctx = match cli.context() {
        Ok(ctx) => ctx,
        Err(error) => {
            return fail(output::resolve_output_mode(cli.format, cli.json, None), &error);
        }
    };

    match run(cli.command, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            fail(ctx.output, &CliError::from_anyhow(&err))
        }
    }
}

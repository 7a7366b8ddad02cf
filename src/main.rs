mod artifact;
mod commands;
mod core;
mod host;
mod pipeline;
mod trigger;
mod ui;

use clap::{ArgAction, Args, Parser, Subcommand};
use commands::EventArgs;
use commands::run::RunOptions;
use core::error::{RailError, print_error};
use tracing_subscriber::EnvFilter;

/// Tag-triggered build and draft-release pipeline
#[derive(Parser)]
#[command(name = "draftrail")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Log more (-v info, -vv debug); DRAFTRAIL_LOG overrides
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

/// Event that asks for a run. Defaults come from the GitHub Actions environment.
#[derive(Args, Debug, Clone)]
struct EventOpts {
  /// Event name: push, workflow_dispatch, ...
  #[arg(long, env = "GITHUB_EVENT_NAME", default_value = "workflow_dispatch")]
  event: String,
  /// Ref of the event: refs/tags/v1.2.0, refs/heads/main, or a bare tag
  #[arg(long = "ref", env = "GITHUB_REF")]
  git_ref: Option<String>,
  /// Release tag for a manual dispatch (default: tag at HEAD matching the pattern)
  #[arg(long)]
  tag: Option<String>,
}

impl From<EventOpts> for EventArgs {
  fn from(opts: EventOpts) -> Self {
    EventArgs {
      event: opts.event,
      git_ref: opts.git_ref,
      tag: opts.tag,
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Setup
  // ============================================================================
  /// Write a default draftrail.toml
  Init {
    /// Overwrite an existing configuration
    #[arg(long)]
    force: bool,
    /// Publish to a local directory instead of GitHub
    #[arg(long)]
    local: bool,
  },

  // ============================================================================
  // Pipeline
  // ============================================================================
  /// Decide whether an event starts a run, without running anything
  Trigger {
    #[command(flatten)]
    event: EventOpts,
    /// Output the decision in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Evaluate the trigger, then build and release
  Run {
    #[command(flatten)]
    event: EventOpts,
    /// Print the plan without executing anything
    #[arg(long)]
    dry_run: bool,
    /// Build even if tracked files have uncommitted changes
    #[arg(long)]
    allow_dirty: bool,
    /// Output the plan or the final run record in JSON format
    #[arg(long)]
    json: bool,
    /// GitHub repository (owner/name) overriding host.repository
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,
  },

  /// Run the build stage only
  Build {
    #[command(flatten)]
    event: EventOpts,
    /// Build even if tracked files have uncommitted changes
    #[arg(long)]
    allow_dirty: bool,
  },

  /// Run the release stage for an earlier run
  Release {
    /// Run id printed by `draftrail build`
    #[arg(long = "run")]
    run_id: String,
    /// Release tag overriding the one recorded for the run
    #[arg(long)]
    tag: Option<String>,
    /// GitHub repository (owner/name) overriding host.repository
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,
  },

  // ============================================================================
  // Inspection
  // ============================================================================
  /// List recorded runs and their stage outcomes
  Status {
    /// Output runs in JSON format
    #[arg(long)]
    json: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

/// Logs go to stderr so stdout stays clean for summaries and --json
fn init_tracing(verbose: u8) {
  let default_level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_env("DRAFTRAIL_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let workspace_root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  let ctx = match core::context::WorkspaceContext::build(&workspace_root) {
    Ok(ctx) => ctx,
    // init may replace a broken config, so it runs without one
    Err(_) if matches!(cli.command, Commands::Init { force: true, .. }) => core::context::WorkspaceContext {
      root: workspace_root.clone(),
      config: None,
    },
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    Commands::Init { force, local } => commands::run_init(&ctx, force, local),
    Commands::Trigger { event, json } => commands::run_trigger(&ctx, event.into(), json),
    Commands::Run {
      event,
      dry_run,
      allow_dirty,
      json,
      repository,
    } => commands::run_pipeline(
      &ctx,
      event.into(),
      RunOptions {
        dry_run,
        allow_dirty,
        json,
        repository,
      },
    ),
    Commands::Build { event, allow_dirty } => commands::run_build(&ctx, event.into(), allow_dirty),
    Commands::Release {
      run_id,
      tag,
      repository,
    } => commands::run_release(&ctx, &run_id, tag, repository.as_deref()),
    Commands::Status { json } => commands::run_status(&ctx, json),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: RailError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}

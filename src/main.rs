mod archive;
mod commands;
mod core;
mod descriptor;
mod mail;
mod maven;
mod prerelease;
mod storage;
mod ui;
mod utils;

#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use core::context::{AppContext, Overrides};
use core::error::{PrereleaseError, PrereleaseResult, print_error};
use std::path::PathBuf;
use storage::cleanup::{CleanupRegistry, ExitGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Build Maven prereleases from Subversion, archive them, promote them into releases
#[derive(Parser)]
#[command(name = "prerelease")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// Working copy (default: current directory)
  #[arg(short, long, global = true)]
  dir: Option<PathBuf>,

  /// Storage tier, primary first; replaces the configured tiers
  #[arg(long = "storage", global = true)]
  storages: Vec<PathBuf>,

  /// Seconds to wait for an archive lock
  #[arg(long, global = true)]
  timeout: Option<u64>,

  /// Config file instead of the search order
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Debug logging (overridden by PRERELEASE_LOG)
  #[arg(short, long, global = true)]
  verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Working copy
  // ============================================================================
  /// Show revision, tag and prerelease of the working copy
  Status {
    /// Output status in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Create the prerelease of the working copy revision
  Create,

  /// svn update, then create
  Update,

  /// Check the release policy without building anything
  Check,

  /// Promote the prerelease of the working copy revision, creating it if needed
  Promote,

  /// svn update, then promote
  UpdatePromote,

  /// Create from a url instead of a working copy
  BareCreate {
    /// Subversion url of trunk or a branch
    url: String,
  },

  /// Promote from a url instead of a working copy
  BarePromote {
    /// Subversion url of trunk or a branch
    url: String,
  },

  // ============================================================================
  // Storage maintenance
  // ============================================================================
  /// List prereleases in all storage tiers
  List {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Move old prereleases to the next storage tier
  Swap {
    /// Minimum age in days (default: swap_after_days from the config)
    #[arg(long)]
    days: Option<u64>,
  },

  /// Stage all but the newest prereleases of every project for removal
  Wipe {
    /// Prereleases to keep per project (default: keep from the config)
    #[arg(long)]
    keep: Option<usize>,
  },

  /// Find locks left behind by crashed processes
  Locksmith {
    /// Delete the stale locks
    #[arg(long)]
    delete: bool,
    /// Read the process table with ps (tools.ps) instead of sysinfo
    #[arg(long)]
    ps: bool,
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

/// Logs go to stderr; PRERELEASE_LOG takes EnvFilter directives
fn init_logging(verbose: bool) {
  let default = if verbose { "prerelease=debug,info" } else { "info" };
  let filter = EnvFilter::try_from_env("PRERELEASE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let registry = CleanupRegistry::new();
  registry.install_panic_hook();
  let guard = ExitGuard::new(registry.clone());

  let result = run(cli, registry);

  // process::exit skips destructors
  drop(guard);
  if let Err(err) = result {
    handle_error(err);
  }
}

fn run(cli: Cli, registry: CleanupRegistry) -> PrereleaseResult<()> {
  let cwd = std::env::current_dir().map_err(|e| PrereleaseError::message(format!("Failed to get current directory: {}", e)))?;
  let dir = cli.dir.unwrap_or_else(|| cwd.clone());
  let overrides = Overrides {
    config: cli.config,
    storages: cli.storages,
    timeout: cli.timeout,
  };
  let ctx = AppContext::build(overrides.load(&cwd)?, registry);

  match cli.command {
    // Working copy
    Commands::Status { json } => commands::run_status(&ctx, &dir, json),
    Commands::Create => commands::run_create(&ctx, &dir),
    Commands::Update => commands::run_update(&ctx, &dir),
    Commands::Check => commands::run_check(&ctx, &dir),
    Commands::Promote => commands::run_promote(&ctx, &dir),
    Commands::UpdatePromote => commands::run_update_promote(&ctx, &dir),
    Commands::BareCreate { url } => commands::run_bare_create(&ctx, &url),
    Commands::BarePromote { url } => commands::run_bare_promote(&ctx, &url),

    // Storage maintenance
    Commands::List { json } => commands::run_list(&ctx, json),
    Commands::Swap { days } => commands::run_swap(&ctx, days),
    Commands::Wipe { keep } => commands::run_wipe(&ctx, keep),
    Commands::Locksmith { delete, ps } => commands::run_locksmith(&ctx, delete, ps),
  }
}

fn handle_error(err: PrereleaseError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}

mod commands;
mod core;
mod pipeline;
mod release;
mod ui;
mod utils;

use crate::core::context::{BuildContext, Overrides};
use crate::core::error::{RailError, print_error};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Version, build, downgrade, test and publish a JVM library from git tags
#[derive(Parser)]
#[command(name = "release-rail")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// This run is the external CI publish job (the most recent tag decides the channel)
  #[arg(long, global = true, env = "EXTERNAL_PUBLISH", value_parser = FalseyValueParser::new())]
  external_ci: bool,

  /// Release channel override: dev or release
  #[arg(long, global = true, env = "RELEASE_CHANNEL", value_name = "CHANNEL")]
  release_channel: Option<String>,

  /// Path to rail.toml (default: rail.toml, .rail.toml or .config/rail.toml)
  #[arg(long, global = true, value_name = "PATH")]
  config: Option<PathBuf>,

  /// More log output (-v info, -vv debug); RUST_LOG takes precedence
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Inspection
  // ============================================================================
  /// Print the version, tag and channel resolved from tag history
  ResolveVersion {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Print the current target and the downgrade matrix
  Targets {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  // ============================================================================
  // Building
  // ============================================================================
  /// Run the build command and recompress its archives
  BuildCurrent,

  /// Downgrade the primary archive for one target
  Downgrade {
    /// Target display name or Java version (e.g. 8, 17)
    target: String,
  },

  /// Run the test suite on the current runtime
  TestCurrent,

  /// Downgrade archive and tests for one target, then run the tests
  TestDowngraded {
    /// Target display name or Java version (e.g. 8, 17)
    target: String,
  },

  /// Recompress one archive in place
  Postprocess {
    /// Archive to recompress
    artifact: PathBuf,
  },

  /// Build the current target and downgrade to every older target
  Assemble {
    /// Cancel lanes that have not started once one fails
    #[arg(long)]
    fail_fast: bool,
  },

  /// Run tests on the current runtime and on every downgraded target
  Check {
    /// Cancel lanes that have not started once one fails
    #[arg(long)]
    fail_fast: bool,
  },

  // ============================================================================
  // Releasing
  // ============================================================================
  /// Build, verify every target, then publish the release
  Publish {
    /// Print the release plan without building or contacting any host
    #[arg(long)]
    dry_run: bool,
    /// Do not publish to the Maven repository
    #[arg(long)]
    skip_maven: bool,
    /// Do not create a GitHub release
    #[arg(long)]
    skip_github: bool,
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

/// Logs go to stderr so stdout stays machine-readable with --json
fn init_logging(verbose: u8) {
  let default_level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
    .try_init()
    .ok();
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(2);
    }
  };

  // Resolve the version once; every command reads the same context
  let overrides = Overrides {
    config_path: cli.config,
    external_ci: cli.external_ci,
    release_channel: cli.release_channel,
  };
  let ctx = match BuildContext::build(&root, &overrides) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    // Inspection
    Commands::ResolveVersion { json } => commands::run_resolve_version(&ctx, json),
    Commands::Targets { json } => commands::run_targets(&ctx, json),

    // Building
    Commands::BuildCurrent => commands::run_build_current(&ctx),
    Commands::Downgrade { target } => commands::run_downgrade(&ctx, &target),
    Commands::TestCurrent => commands::run_test_current(&ctx),
    Commands::TestDowngraded { target } => commands::run_test_downgraded(&ctx, &target),
    Commands::Postprocess { artifact } => commands::run_postprocess(&ctx, artifact),
    Commands::Assemble { fail_fast } => commands::run_assemble(&ctx, fail_fast),
    Commands::Check { fail_fast } => commands::run_check(&ctx, fail_fast),

    // Releasing
    Commands::Publish {
      dry_run,
      skip_maven,
      skip_github,
    } => commands::run_publish(&ctx, dry_run, skip_maven, skip_github),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: RailError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}

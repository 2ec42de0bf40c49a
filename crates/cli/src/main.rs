mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::ModeArg;
use output::OutputFormat;

/// kiln - ABI-aware rule graphs for JVM libraries
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct WorkspaceArgs {
  /// Path to the workspace manifest
  #[arg(short, long, default_value = "kiln.toml")]
  workspace: PathBuf,

  /// Path to a build configuration file
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Output format
  #[arg(short, long, value_enum, default_value_t)]
  output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
  /// Construct the rule graph of the given targets (default: all)
  Plan {
    #[command(flatten)]
    ws: WorkspaceArgs,

    /// Targets to plan
    targets: Vec<String>,
  },

  /// Show the ABI target a library's dependents compile against
  Abi {
    #[command(flatten)]
    ws: WorkspaceArgs,

    /// Library target
    target: String,
  },

  /// Show the build steps of a rule
  Steps {
    #[command(flatten)]
    ws: WorkspaceArgs,

    /// Target (library or ABI flavor)
    target: String,
  },

  /// Compare a class ABI with a source ABI
  Verify {
    /// Class ABI jar or directory
    class_abi: PathBuf,

    /// Source ABI jar or directory
    source_abi: PathBuf,

    /// Verification mode
    #[arg(long, value_enum, default_value = "fail")]
    mode: ModeArg,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Plan { ws, targets } => cmd::cmd_plan(&ws.workspace, ws.config.as_deref(), &targets, ws.output, cli.verbose),
    Commands::Abi { ws, target } => cmd::cmd_abi(&ws.workspace, ws.config.as_deref(), &target, ws.output),
    Commands::Steps { ws, target } => cmd::cmd_steps(&ws.workspace, ws.config.as_deref(), &target, ws.output),
    Commands::Verify {
      class_abi,
      source_abi,
      mode,
    } => cmd::cmd_verify(&class_abi, &source_abi, mode),
  }
}

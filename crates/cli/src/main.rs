mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use procman::consts::DESCRIPTOR_FILENAME;

use crate::output::{OutputFormat, print_error};

/// procman - run named processes and build pinned packages
#[derive(Parser)]
#[command(name = "procman")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show host platform information
  Info,

  /// Print the content hash of a file or directory
  Hash {
    /// File or directory to hash
    path: PathBuf,
  },

  /// Verify a descriptor's pins and print the build plan
  Check {
    /// Path to the descriptor
    #[arg(default_value = DESCRIPTOR_FILENAME)]
    descriptor: PathBuf,

    /// Download cache for base environments
    #[arg(long)]
    cache_dir: Option<PathBuf>,
  },

  /// Verify a descriptor and run its build
  Build {
    /// Path to the descriptor
    #[arg(default_value = DESCRIPTOR_FILENAME)]
    descriptor: PathBuf,

    /// Output directory for the artifact
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Download cache for base environments
    #[arg(long)]
    cache_dir: Option<PathBuf>,
  },

  /// Run shell commands as named processes
  Run {
    /// Processes to run, as NAME=COMMAND
    #[arg(required = true, value_name = "NAME=COMMAND")]
    processes: Vec<String>,

    /// How long the director waits for events before re-checking the table
    #[arg(long, value_parser = humantime::parse_duration, default_value = "200ms")]
    poll_interval: Duration,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result: Result<()> = match cli.command {
    Commands::Info => cmd::cmd_info(cli.output),
    Commands::Hash { path } => cmd::cmd_hash(&path, cli.output),
    Commands::Check { descriptor, cache_dir } => cmd::cmd_check(&descriptor, cache_dir, cli.output),
    Commands::Build {
      descriptor,
      out,
      cache_dir,
    } => cmd::cmd_build(&descriptor, &out, cache_dir, cli.output),
    Commands::Run {
      processes,
      poll_interval,
    } => cmd::cmd_run(&processes, poll_interval, cli.output),
  };

  if let Err(e) = result {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}

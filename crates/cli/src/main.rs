// parcelmerge CLI - merge per-provider property records into one entity

mod exit_codes;
mod merge;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "parcelmerge")]
#[command(about = "Reconcile property records from valuation, listing and assessor sources")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging to stderr (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge provider records into one canonical property entity
    #[command(after_help = "\
Examples:
  parcelmerge merge --address '4217 Larkspur Ln, Austin, TX 78745' \\
      --valuation zest.json --listing listing.json --assessor cad.json --json
  parcelmerge merge --address '12 Oak Ave, Dayton, OH' --assessor cad.json \\
      --meta meta.json --config county-first.toml --output merged.json
  parcelmerge merge --address '1 Main St' --listing l.json --assessor a.json \\
      --fail-on-conflict --deterministic")]
    Merge(merge::MergeArgs),

    /// Validate a merge policy file without running a merge
    #[command(after_help = "\
Examples:
  parcelmerge validate county-first.toml")]
    Validate {
        /// Path to the policy .toml file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

/// Log output goes to stderr so `--json` stdout stays a single document.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too.
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Merge(args) => merge::cmd_merge(args),
        Commands::Validate { config } => merge::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

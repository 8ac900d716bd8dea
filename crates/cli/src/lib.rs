//! Command line front end for the form engine.

pub mod commands;
pub mod util;

use std::ffi::OsString;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use xforms_runtime::{FormError, MutationError};
use xforms_xpath::XPathParseError;

use crate::util::CliResult;

#[derive(Parser, Debug)]
#[command(name = "xforms-cli", version, about = "Evaluate XPath expressions and inspect reactive form instances")]
pub struct Cli {
    #[arg(
        long = "log-level",
        value_enum,
        global = true,
        default_value_t = LogLevel::Warn,
        help = "Log level written to stderr. RUST_LOG takes precedence when set."
    )]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate an expression against a form instance or an empty document.
    Eval(commands::eval::EvalArgs),
    /// Load a form, apply mutations in order and print the resulting snapshot.
    Snapshot(commands::snapshot::SnapshotArgs),
    /// Print the canonical serialization of a parsed expression.
    Parse(commands::parse::ParseArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Cli {
    /// Parse arguments and keep the command line order of snapshot mutations.
    pub fn try_parse_ordered<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Cli::command().try_get_matches_from(args)?;
        let mut cli = Cli::from_arg_matches(&matches)?;
        if let Commands::Snapshot(args) = &mut cli.command
            && let Some(("snapshot", sub)) = matches.subcommand()
        {
            args.record_order(sub);
        }
        Ok(cli)
    }
}

pub fn run() -> CliResult<()> {
    let cli = Cli::try_parse_ordered(std::env::args_os()).unwrap_or_else(|error| error.exit());
    init_tracing(cli.log_level);
    let output = execute(&cli.command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

pub fn execute(command: &Commands) -> CliResult<String> {
    match command {
        Commands::Eval(args) => commands::eval::run(args),
        Commands::Snapshot(args) => commands::snapshot::run(args),
        Commands::Parse(args) => commands::parse::run(args),
    }
}

/// Process exit status for a failed run: 2 when the form, an expression or a
/// mutation was rejected, 1 for anything else (I/O, serialization).
pub fn exit_code(error: &anyhow::Error) -> i32 {
    let rejected = error.chain().any(|cause| {
        cause.is::<FormError>()
            || cause.is::<MutationError>()
            || cause.is::<xforms_xpath::Error>()
            || cause.is::<XPathParseError>()
    });
    if rejected { 2 } else { 1 }
}

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

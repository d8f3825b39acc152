pub mod commands;

use chatorder_core::config::{LogFormat, LoggingConfig};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "chatorder",
    about = "Chatorder operator CLI",
    long_about = "Inspect webhook configuration, check readiness, and send extracted order requests to the order backend.",
    after_help = "Examples:\n  chatorder doctor --json\n  chatorder config\n  chatorder send --input turn.json --dry-run\n  cat turn.json | chatorder send --input -"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, webhook secret, and retry budget")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Build a webhook request from extraction output and send it")]
    Send {
        #[arg(long, help = "Path to the extraction JSON, or `-` for stdin")]
        input: String,
        #[arg(long, help = "Session id used for metadata and log correlation")]
        session_id: Option<String>,
        #[arg(long, help = "Print the route and payload without sending")]
        dry_run: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Send { input, session_id, dry_run } => {
            commands::send::run(commands::send::SendArgs { input, session_id, dry_run })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single command outcome.
pub fn init_logging(config: &LoggingConfig) {
    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A second init (e.g. repeated runs in one test process) keeps the first subscriber.
    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

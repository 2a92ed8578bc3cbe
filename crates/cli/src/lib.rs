pub mod bootstrap;
pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use construkt_core::config::{LogFormat, LoggingConfig};

const DEFAULT_USER: &str = "cli-user";

#[derive(Debug, Parser)]
#[command(
    name = "construkt",
    about = "Construkt assistant operator CLI",
    long_about = "Talk to the Construkt assistant, manage its catalog database, and inspect configuration.",
    after_help = "Examples:\n  construkt seed\n  construkt ask \"do you have portland cement\"\n  construkt chat --user alice"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Interactive conversation over stdin, one message per line")]
    Chat {
        #[arg(long, default_value = DEFAULT_USER, help = "Conversation owner")]
        user: String,
    },
    #[command(about = "Handle a single message and print the turn result as JSON")]
    Ask {
        #[arg(long, default_value = DEFAULT_USER, help = "Conversation owner")]
        user: String,
        message: String,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo construction catalog and verify its contents")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Evict stored conversations idle for longer than the context timeout")]
    Cleanup,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { user } => commands::chat::run(&user),
        Command::Ask { user, message } => commands::ask::run(&user, &message),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Cleanup => commands::cleanup::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable; repeated calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

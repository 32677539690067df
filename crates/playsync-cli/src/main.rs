use clap::{ArgAction, Parser, Subcommand};
use playsync_config::{Config, PathManager};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "playsync")]
#[command(about = "Playsync - Mirror what you are watching across media servers and Trakt")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Directory holding config.toml and credentials.toml
    #[arg(long, global = true, value_name = "DIR")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll sources and replay playback onto targets until interrupted
    #[command(long_about = "Start one worker per configured sync group. Each worker polls its source on the group interval and forwards start, pause and stop events to its targets. Stops on Ctrl+C or SIGTERM.")]
    Run {
        /// Write logs to a daily-rotated file in the log directory instead of stderr
        #[arg(long, action = ArgAction::SetTrue)]
        log_file: bool,
    },
    /// Validate the configuration and show how sync groups resolve
    Check,
    /// Show or change configuration and credentials
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    Show,

    /// Store a Trakt access token
    #[command(long_about = "Store Trakt OAuth tokens in credentials.toml. The client id goes in the [trakt] section of config.toml.")]
    Trakt {
        #[arg(long)]
        access_token: String,

        #[arg(long)]
        refresh_token: Option<String>,

        /// Token lifetime in seconds
        #[arg(long, value_name = "SECONDS")]
        expires_in: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let paths = PathManager::resolve(cli.config.as_deref());

    // The level from the config file applies when neither -v nor RUST_LOG is set
    let log_level = Config::load_from_file(&paths.config_file())
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "info".to_string());
    let log_dir = match &cli.command {
        Commands::Run { log_file: true } => Some(paths.log_dir()),
        _ => None,
    };
    logging::init_logging(cli.verbose, cli.quiet, &log_level, log_dir)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    let result = match cli.command {
        Commands::Run { .. } => commands::run::run(&paths, &output).await,
        Commands::Check => commands::check::run_check(&paths, &output),
        Commands::Config { cmd } => commands::config::run_config(cmd, &paths, &output),
    };
    // color-eyre reports the error itself in human mode
    if let Err(e) = &result {
        if output.format() != output::OutputFormat::Human {
            output.error(e.to_string());
        }
    }
    result
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tweetguard_cli::cli::client::print_json;
use tweetguard_cli::cli::{
    is_daemon_running, run_daemon, send_command, socket_path, CliCommand, CliConfig,
};

#[derive(Parser)]
#[command(name = "tweetguard")]
#[command(about = "Operator console for the reply-spam reporter")]
struct Cli {
    /// Start daemon in foreground
    #[arg(long)]
    daemon: bool,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (socketPath, dataDir, fixture, engine)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// JSON config passed internally (used when spawning daemon)
    #[arg(long, hide = true)]
    config_json: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor a user's replies page
    AddUser {
        handle: String,
        /// Tweets to gather per sweep (default 30)
        #[arg(long, short = 'n')]
        target: Option<u32>,
    },

    /// Stop monitoring a user
    RemoveUser { handle: String },

    /// List monitored users
    ListUsers,

    /// Add one or more keywords
    AddKeyword {
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// Add a regular expression matched against tweet bodies
    AddRegex { pattern: String },

    /// Mark a user as a known spammer
    AddSpammer { handle: String },

    /// List keywords and patterns with their match counts
    ListRules,

    /// Print and clear the oldest unreported tweets
    Print {
        #[arg(default_value_t = 10)]
        count: usize,
    },

    /// Reconcile the unreported staging area with its id index
    Fix,

    /// Clear the tweet queue
    Clear,

    /// Clear both queues and reload the page
    Reset,

    /// Stop the current run
    Stop,

    /// Pause the current run once
    Pause,

    /// Sweep monitored users and report spam in their reply threads
    Run,

    /// Print the replies on the current tweet page
    DumpReplies,

    /// Get daemon status
    Status {
        /// Quick check if daemon is running (doesn't auto-start daemon)
        #[arg(long)]
        running: bool,
    },

    /// Shutdown the daemon
    Shutdown,
}

fn main() {
    let cli = Cli::parse();

    // Load config from file or JSON string
    let config = load_config(&cli);

    // Run daemon mode
    if cli.daemon {
        if let Err(e) = run_daemon(config) {
            eprintln!("Daemon error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let command = match cli.command {
        Some(Commands::AddUser { handle, target }) => CliCommand::AddUser { handle, target },
        Some(Commands::RemoveUser { handle }) => CliCommand::RemoveUser { handle },
        Some(Commands::ListUsers) => CliCommand::ListUsers,
        Some(Commands::AddKeyword { terms }) => CliCommand::AddKeyword { terms },
        Some(Commands::AddRegex { pattern }) => CliCommand::AddRegex { pattern },
        Some(Commands::AddSpammer { handle }) => CliCommand::AddSpammer { handle },
        Some(Commands::ListRules) => CliCommand::ListRules,
        Some(Commands::Print { count }) => CliCommand::PrintUnreported { count },
        Some(Commands::Fix) => CliCommand::FixUnreported,
        Some(Commands::Clear) => CliCommand::Clear,
        Some(Commands::Reset) => CliCommand::Reset,
        Some(Commands::Stop) => CliCommand::Stop,
        Some(Commands::Pause) => CliCommand::Pause,
        Some(Commands::Run) => CliCommand::Run,
        Some(Commands::DumpReplies) => CliCommand::DumpReplies,
        Some(Commands::Status { running }) => {
            if running {
                // Quick check without auto-starting daemon
                let is_running = is_daemon_running(config.as_ref());
                let path = socket_path(config.as_ref());
                let status = serde_json::json!({
                    "running": is_running,
                    "socket_path": path.display().to_string(),
                });
                if let Err(e) = print_json(&status, cli.pretty) {
                    eprintln!("Error: {}", e);
                }
                std::process::exit(if is_running { 0 } else { 1 });
            }
            CliCommand::Status
        }
        Some(Commands::Shutdown) => CliCommand::Shutdown,
        None => {
            // No command - show help
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    // Send command to daemon
    if let Err(e) = send_command(command, cli.pretty, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file or JSON string
fn load_config(cli: &Cli) -> Option<CliConfig> {
    // Priority: --config-json (internal) > --config (file)
    if let Some(ref json) = cli.config_json {
        match CliConfig::from_json(json) {
            Ok(config) => return Some(config),
            Err(e) => {
                eprintln!("Warning: Failed to parse config JSON: {}", e);
            }
        }
    }

    if let Some(ref path) = cli.config {
        match CliConfig::load(path) {
            Ok(config) => return Some(config),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    None
}

use clap::{Parser, Subcommand};

mod commands;
mod server;

#[derive(Parser)]
#[command(name = "nightwatch", version, about = "Nightwatch CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator daemon
    Run(commands::run::RunArgs),
    /// Current phase and participant states
    Status,
    /// Sleep statistics
    Stats {
        /// Limit to one participant id
        participant: Option<String>,
    },
    /// Sleep session history
    History {
        /// Limit to one participant id
        participant: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Status => commands::status::run(),
        Commands::Stats { participant } => commands::stats::run(participant),
        Commands::History { participant } => commands::history::run(participant),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

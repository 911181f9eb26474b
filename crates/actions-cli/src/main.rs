mod cmd;
mod output;

use actions_core::config::Config;
use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(
    name = "actions",
    about = "Agent action handlers: invoke them locally, or serve them over HTTP",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file (default: ./actions.yaml when present)
    #[arg(long, global = true, env = "ACTIONS_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve invocation events over HTTP
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
    },

    /// Run a single invocation event and print the response envelope
    Invoke {
        /// Handler to dispatch to (default: ACTIONS_HANDLER / config `handler`)
        #[arg(long)]
        handler: Option<String>,

        /// Event document to read (default: stdin)
        #[arg(long)]
        event: Option<PathBuf>,
    },

    /// List handlers and the operations each accepts
    Operations,

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Invoke { .. } => {
            tracing::Level::from_str(&config.log_level).unwrap_or(tracing::Level::INFO)
        }
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(config, port),
        Commands::Invoke { handler, event } => {
            cmd::invoke::run(config, handler.as_deref(), event.as_deref())
        }
        Commands::Operations => cmd::operations::run(cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use sharegate::common::config::{apply_overrides, load_config, ConfigOverrides, Transport};
use sharegate::common::config_commands;
use sharegate::server::{run_server, run_share};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sharegate")]
#[command(about = "Share one file behind a receiver confirmation gate", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sender page and API; start shares from the browser
    Serve {
        #[command(flatten)]
        opts: RuntimeOpts,
    },

    /// Share a file right away and wait for the receiver
    Share {
        #[arg(help = "Path to the file to share")]
        file: PathBuf,

        #[command(flatten)]
        opts: RuntimeOpts,
    },

    /// Inspect or reset the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the config file, or the defaults when none exists
    Show,
    /// Overwrite the config file with defaults
    Reset {
        #[arg(long, short = 'y', help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

#[derive(Args, Clone, Copy)]
struct RuntimeOpts {
    #[arg(long, value_enum, help = "How the receiver reaches this machine")]
    transport: Option<Transport>,

    #[arg(long, short, help = "Port to listen on (0 picks a free one)")]
    port: Option<u16>,

    #[arg(long, help = "Seconds the receiver has to confirm")]
    timeout: Option<u64>,
}

impl From<RuntimeOpts> for ConfigOverrides {
    fn from(opts: RuntimeOpts) -> Self {
        ConfigOverrides {
            transport: opts.transport,
            port: opts.port,
            timeout: opts.timeout,
        }
    }
}

fn init_tracing() {
    // RUST_LOG wins over the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { opts } => {
            let config = apply_overrides(load_config()?, &opts.into())?;
            run_server(config).await?;
        }
        Commands::Share { file, opts } => {
            let config = apply_overrides(load_config()?, &opts.into())?;
            run_share(config, file).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Path => config_commands::run_config_path()?,
            ConfigAction::Show => config_commands::run_config_show()?,
            ConfigAction::Reset { yes } => {
                config_commands::run_config_reset(yes)?;
            }
        },
    }

    Ok(())
}

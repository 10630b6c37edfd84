use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;

/// Paper account used when `--account` is not given.
const DEFAULT_ACCOUNT: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

#[derive(Parser)]
#[command(name = "wvp")]
#[command(about = "Wave ledger client (paper ledger)", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> overlay ...)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// JSON array of entries loaded into the paper ledger before the command
    #[arg(long, global = true)]
    seed: Option<String>,

    /// Wallet account to sign with
    #[arg(long, global = true, default_value = DEFAULT_ACCOUNT)]
    account: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Fetch the log and print it newest first
    Log {
        /// Print the view as a JSON array
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Connect, submit one wave, and wait for it to be confirmed
    Wave {
        #[arg(long)]
        message: String,
    },

    /// Open the live feed and print client events as JSON lines
    Watch {
        /// How long to keep the feed open
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,

        /// Waves to submit while watching (repeatable)
        #[arg(long = "wave")]
        waves: Vec<String>,
    },
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();
    let open = || {
        commands::open_session(
            &cli.config_paths,
            cli.seed.as_deref(),
            &cli.account,
            init_tracing,
        )
    };

    match &cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = wvp_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
        Commands::Log { json } => commands::log::run(&open()?, *json).await?,
        Commands::Wave { message } => commands::wave::run(&open()?, message).await?,
        Commands::Watch { duration_ms, waves } => {
            commands::watch::run(&open()?, waves, Duration::from_millis(*duration_ms)).await?
        }
    }

    Ok(())
}

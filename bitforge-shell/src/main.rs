//! bitforge: command-line shell for the Bitforge gaming-social platform

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bitforge_client::{ApiClient, FileTokenStore};
use bitforge_sdk::{AppContext, SdkError};
use bitforge_shell::{execute, Command, Config};
use clap::Parser;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "bitforge")]
#[command(about = "Feeds, clans, forums and the codeBits store from the terminal")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "bitforge.toml")]
    config: PathBuf,

    /// Platform API base URL (overrides config file)
    #[arg(long, env = "BITFORGE_API_URL")]
    api_url: Option<String>,

    /// Where the session token is stored (overrides config file)
    #[arg(short, long, env = "BITFORGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "bitforge_sdk=trace"
    #[arg(long, env = "BITFORGE_LOG", default_value = "bitforge=info,bitforge_sdk=info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(&cli.config)?;
    config.apply_overrides(cli.api_url, cli.data_dir);

    let data_dir = config.storage.resolved_data_dir();
    debug!(api = %config.api.base_url, data_dir = %data_dir.display(), "Configuration loaded");

    let tokens = FileTokenStore::open(&data_dir).context("opening session store")?;
    let client = ApiClient::new(config.api.clone(), Arc::new(tokens))?;
    let ctx = AppContext::new(client, config.sync.clone());

    match ctx.session.restore().await {
        Ok(Some(session)) => info!(user_id = %session.user_id(), "Session restored"),
        Ok(None) => debug!("No stored session"),
        Err(e) => warn!(error = %e, "Could not restore session"),
    }

    match execute(&ctx, cli.command).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            match e.downcast_ref::<SdkError>() {
                Some(sdk) => eprintln!("Error: {}", sdk.user_message()),
                None => eprintln!("Error: {:#}", e),
            }
            std::process::exit(1);
        }
    }
}

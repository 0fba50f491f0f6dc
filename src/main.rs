//! CLI entry point for graph-client, a Microsoft Graph app-only console.
//!
//! Loads `graph-client.toml` (plus environment overrides), reads the client
//! secret from `GRAPH_CLIENT_SECRET`, initializes the directory facade and
//! hands it to the interactive menu.
//!
//! Exit codes:
//! - 0: the user exited the menu
//! - 1: configuration or startup error
//! - 2: argument validation error (clap handles this automatically)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use graph_client::auth::CredentialManager;
use graph_client::config::{AppConfig, CLIENT_SECRET_ENV, DEFAULT_CONFIG_FILE};
use graph_client::console::Console;
use graph_client::directory::Directory;
use graph_client::photos::PhotoStore;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. A missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Azure AD tenant ID. Overrides the configuration file.
    #[arg(long)]
    tenant_id: Option<String>,

    /// Azure AD application (client) ID. Overrides the configuration file.
    #[arg(long)]
    client_id: Option<String>,

    /// Azure AD client secret. Prefer the GRAPH_CLIENT_SECRET environment
    /// variable to keep the secret out of shell history.
    #[arg(long, env = CLIENT_SECRET_ENV, hide_env_values = true)]
    secret: Option<String>,

    /// Open each downloaded profile photo in the default image viewer.
    #[arg(long)]
    open_photos: bool,
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("could not load {}", cli.config.display()))?;
    config.apply_env_overrides();
    if let Some(tenant_id) = &cli.tenant_id {
        config.settings.tenant_id = tenant_id.clone();
    }
    if let Some(client_id) = &cli.client_id {
        config.settings.client_id = client_id.clone();
    }
    if cli.open_photos {
        config.photos.open_viewer = true;
    }
    Ok(config)
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let settings = config
        .settings(cli.secret.as_deref())
        .context("could not load app settings")?;

    let credentials = Arc::new(CredentialManager::with_authority(&config.graph.authority));
    let directory = Directory::with_base_url(
        credentials,
        &config.graph.base_url,
        config.graph.request_timeout(),
    );
    directory
        .initialize(&settings)
        .context("could not initialize graph for app-only auth")?;

    println!("Microsoft Graph app-only console");

    let stdin = std::io::stdin();
    let mut console = Console::new(
        stdin.lock(),
        std::io::stdout(),
        PhotoStore::new(&config.photos.directory),
    )
    .open_viewer(config.photos.open_viewer)
    .domains(config.domains.names.clone());

    console
        .run(&directory)
        .await
        .context("console I/O failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; only complain when it exists but can't be read.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            error!("{e:#}");
            eprintln!("Configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging.level);
    info!("program started");

    match run(cli, config).await {
        Ok(()) => {
            info!("program ended");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("stopped program because of error: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

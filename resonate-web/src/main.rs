//! resonate-web: HTTP server for the Resonate musician network
//!
//! Resolves configuration (CLI > env > TOML > compiled defaults), opens or
//! creates the SQLite database under the root folder and serves the API.

use anyhow::{Context, Result};
use clap::Parser;
use resonate_common::config::{ConfigOverrides, RootFolderInitializer, ServerConfig};
use resonate_common::db::init_database;
use resonate_web::{build_router, AppState};
use std::path::PathBuf;
use tracing::{error, info, warn};

const MODULE_NAME: &str = "resonate-web";

#[derive(Debug, Parser)]
#[command(name = "resonate-web", version, about = "Social network for musicians")]
struct Args {
    /// Folder holding the database (overrides RESONATE_ROOT_FOLDER and the config file)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long = "bind", env = "RESONATE_BIND")]
    bind_address: Option<String>,

    /// Port to listen on
    #[arg(long, env = "RESONATE_PORT")]
    port: Option<u16>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolved before tracing exists; fallbacks are kept in `config.warnings`
    // and logged once the subscriber is installed.
    let config = ServerConfig::load(
        MODULE_NAME,
        ConfigOverrides {
            root_folder: args.root_folder,
            bind_address: args.bind_address,
            port: args.port,
            log_level: args.log_level,
        },
    );

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Build identification first, before any database work
    info!(
        "Starting Resonate ({}) v{} [{}] built {} ({})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    for warning in &config.warnings {
        warn!("{}", warning);
    }

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .with_context(|| format!("Failed to create root folder {}", config.root_folder.display()))?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    if config.debug {
        warn!("Debug mode: session cookies are not marked Secure");
    }

    let state = AppState::new(pool, config.session_ttl_hours, !config.debug);
    let app = build_router(state);

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("{} listening on http://{}", MODULE_NAME, address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}

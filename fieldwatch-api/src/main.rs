//! fieldwatch-api - field reporting backend
//!
//! Serves agent registration, Form 34A intake, and the reconciliation and
//! tally reports over one SQLite database in the root folder.

use anyhow::{Context, Result};
use clap::Parser;
use fieldwatch_api::{build_router, extraction::extractor_from_config, AppState};
use fieldwatch_common::config::{
    prepare_root_folder, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV,
};
use fieldwatch_common::db::init::init_database;
use fieldwatch_common::store::SqliteStore;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "fieldwatch-api", version, about = "Field reporting backend")]
struct Args {
    /// Root folder holding fieldwatch.db
    #[arg(long)]
    root_folder: Option<String>,

    /// Address to listen on, overrides config.toml
    #[arg(long, env = "FIELDWATCH_BIND")]
    bind: Option<String>,

    /// Vision extraction endpoint, overrides config.toml
    #[arg(long, env = "FIELDWATCH_VISION_ENDPOINT")]
    vision_endpoint: Option<String>,

    /// Bearer key for the vision extraction endpoint
    #[arg(long, env = "FIELDWATCH_VISION_API_KEY", hide_env_values = true)]
    vision_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting fieldwatch-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = TomlConfig::load().context("Failed to load config.toml")?;
    if let Some(endpoint) = args.vision_endpoint {
        config.vision.endpoint = Some(endpoint);
    }
    if let Some(key) = args.vision_api_key {
        config.vision.api_key = Some(key);
    }
    let bind_address = args.bind.unwrap_or_else(|| config.bind_address.clone());

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let db_path = prepare_root_folder(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let extractor = extractor_from_config(&config.vision)?;
    if extractor.is_available() {
        info!("Vision extraction enabled");
    } else {
        warn!("No vision endpoint configured; form uploads will fail extraction");
    }

    let state = AppState::new(SqliteStore::new(pool), extractor, config.max_videos_per_agent);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("fieldwatch-api listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

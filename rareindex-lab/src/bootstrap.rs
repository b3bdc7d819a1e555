//! Startup shared by the server and the management commands

use anyhow::{Context, Result};
use rareindex_common::config::{database_path, resolve_root_folder, RareIndexConfig};
use rareindex_common::db::init::init_database;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber; `RUST_LOG` wins over the configured level
pub fn init_tracing(config: &RareIndexConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolved paths and an open, migrated database
pub struct Environment {
    pub config: RareIndexConfig,
    pub root_folder: PathBuf,
    pub media_dir: PathBuf,
    pub pool: SqlitePool,
}

impl Environment {
    pub async fn open(config: RareIndexConfig, cli_root: Option<&Path>) -> Result<Self> {
        let root_folder = resolve_root_folder(cli_root, &config);
        std::fs::create_dir_all(&root_folder)
            .with_context(|| format!("Cannot create root folder {}", root_folder.display()))?;
        info!("Root folder: {}", root_folder.display());

        let media_dir = config.media_dir(&root_folder);
        std::fs::create_dir_all(&media_dir)
            .with_context(|| format!("Cannot create media directory {}", media_dir.display()))?;

        let db_path = database_path(&root_folder);
        info!("Database path: {}", db_path.display());
        let pool = init_database(&db_path)
            .await
            .context("Failed to initialize database")?;

        Ok(Self {
            config,
            root_folder,
            media_dir,
            pool,
        })
    }
}

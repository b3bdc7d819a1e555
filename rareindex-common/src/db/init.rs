//! Database initialization
//!
//! Opens (or creates) the SQLite database, applies connection pragmas and
//! brings the schema up to date: registry tables, column sync, migrations.

use crate::db::migrations::{create_schema_version_table, run_migrations};
use crate::db::table_schemas::model_registry;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open the database at `db_path`, creating file and schema if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    initialize_schema(&pool).await?;
    Ok(pool)
}

/// Create tables, sync columns and run migrations on an open pool
///
/// Idempotent; tests call this directly on in-memory pools.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    model_registry().create_all(pool).await?;
    run_migrations(pool).await?;
    Ok(())
}

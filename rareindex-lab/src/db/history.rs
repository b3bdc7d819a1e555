//! Audit history
//!
//! Every create/update/delete made through the service appends one row with
//! a JSON snapshot of the object as it was after the change.

use anyhow::Result;
use rareindex_common::models::HistoryAction;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{SqliteExecutor, SqlitePool};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub table_name: String,
    pub object_id: i64,
    pub action: String,
    pub changed_by: Option<i64>,
    pub changed_at: String,
    pub snapshot: Option<Json<serde_json::Value>>,
}

pub async fn record<'e>(
    db: impl SqliteExecutor<'e>,
    table_name: &str,
    object_id: i64,
    action: HistoryAction,
    changed_by: Option<i64>,
    snapshot: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO history (table_name, object_id, action, changed_by, snapshot)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(table_name)
    .bind(object_id)
    .bind(action.as_str())
    .bind(changed_by)
    .bind(Json(snapshot))
    .execute(db)
    .await?;
    Ok(())
}

/// Oldest first
pub async fn history_for(pool: &SqlitePool, table_name: &str, object_id: i64) -> Result<Vec<HistoryEntry>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, table_name, object_id, action, changed_by, changed_at, snapshot
        FROM history
        WHERE table_name = ? AND object_id = ?
        ORDER BY id
        "#,
    )
    .bind(table_name)
    .bind(object_id)
    .fetch_all(pool)
    .await?)
}

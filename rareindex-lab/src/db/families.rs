//! Family persistence

use anyhow::Result;
use rareindex_common::models::Family;
use serde::Serialize;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

const FAMILY_COLUMNS: &str = "id, family_id, description, created_by, created_at";

/// Family with its member count, for listings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FamilySummary {
    pub id: i64,
    pub family_id: String,
    pub description: Option<String>,
    pub individual_count: i64,
}

pub async fn create_family(
    conn: &mut SqliteConnection,
    family_id: &str,
    description: Option<&str>,
    created_by: Option<i64>,
) -> Result<i64> {
    let id = sqlx::query_scalar(
        "INSERT INTO families (family_id, description, created_by) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(family_id)
    .bind(description)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn get_family<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Family>> {
    Ok(sqlx::query_as(&format!("SELECT {} FROM families WHERE id = ?", FAMILY_COLUMNS))
        .bind(id)
        .fetch_optional(db)
        .await?)
}

/// Look up by the natural key (`RB_2025_01`, ...)
pub async fn find_family_by_code<'e>(db: impl SqliteExecutor<'e>, family_id: &str) -> Result<Option<Family>> {
    Ok(sqlx::query_as(&format!("SELECT {} FROM families WHERE family_id = ?", FAMILY_COLUMNS))
        .bind(family_id)
        .fetch_optional(db)
        .await?)
}

pub async fn list_families(pool: &SqlitePool) -> Result<Vec<FamilySummary>> {
    Ok(sqlx::query_as(
        r#"
        SELECT f.id, f.family_id, f.description, COUNT(i.id) AS individual_count
        FROM families f
        LEFT JOIN individuals i ON i.family_id = f.id
        GROUP BY f.id
        ORDER BY f.family_id
        "#,
    )
    .fetch_all(pool)
    .await?)
}

/// Delete a family and, through cascades, everything recorded under it
pub async fn delete_family(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    super::notes::delete_family_notes(&mut *conn, id).await?;
    sqlx::query("DELETE FROM families WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

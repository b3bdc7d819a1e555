//! Classifications and stored provider annotations

use anyhow::Result;
use rareindex_common::models::{AcmgClassification, Annotation, Classification, Inheritance};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

pub async fn insert_classification(
    conn: &mut SqliteConnection,
    variant_id: i64,
    user_id: Option<i64>,
    classification: AcmgClassification,
    inheritance: Inheritance,
    notes: Option<&str>,
) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO classifications (variant_id, user_id, classification, inheritance, notes)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(variant_id)
    .bind(user_id)
    .bind(classification.as_str())
    .bind(inheritance.as_str())
    .bind(notes)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Newest first
pub async fn classifications_for(pool: &SqlitePool, variant_id: i64) -> Result<Vec<Classification>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, variant_id, user_id, classification, inheritance, notes, created_at
        FROM classifications
        WHERE variant_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(variant_id)
    .fetch_all(pool)
    .await?)
}

/// Insert or replace the payload for (variant, source, source_version)
pub async fn save_annotation<'e>(
    db: impl SqliteExecutor<'e>,
    variant_id: i64,
    source: &str,
    source_version: &str,
    data: &serde_json::Value,
) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO annotations (variant_id, source, source_version, data)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(variant_id, source, source_version) DO UPDATE SET data = excluded.data
        RETURNING id
        "#,
    )
    .bind(variant_id)
    .bind(source)
    .bind(source_version)
    .bind(Json(data))
    .fetch_one(db)
    .await?;
    Ok(id)
}

/// Newest first
pub async fn annotations_for(pool: &SqlitePool, variant_id: i64) -> Result<Vec<Annotation>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, variant_id, source, source_version, data, created_at
        FROM annotations
        WHERE variant_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(variant_id)
    .fetch_all(pool)
    .await?)
}

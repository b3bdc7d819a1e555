//! Notes attached to lab records
//!
//! A note points at its record by table name and id, so no foreign key
//! removes it; deleting a family clears the notes of its members.

use anyhow::Result;
use rareindex_common::models::{Note, NoteTarget};
use sqlx::{SqliteExecutor, SqlitePool};

pub async fn create_note<'e>(
    db: impl SqliteExecutor<'e>,
    target: NoteTarget,
    object_id: i64,
    content: &str,
    created_by: Option<i64>,
) -> Result<i64> {
    let id = sqlx::query_scalar(
        "INSERT INTO notes (content, content_type, object_id, created_by) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(content)
    .bind(target.as_str())
    .bind(object_id)
    .bind(created_by)
    .fetch_one(db)
    .await?;
    Ok(id)
}

pub async fn get_note<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Note>> {
    Ok(sqlx::query_as(
        "SELECT id, content, content_type, object_id, created_by, created_at, updated_at FROM notes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?)
}

/// Newest first
pub async fn notes_for(pool: &SqlitePool, target: NoteTarget, object_id: i64) -> Result<Vec<Note>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, content, content_type, object_id, created_by, created_at, updated_at
        FROM notes
        WHERE content_type = ? AND object_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(target.as_str())
    .bind(object_id)
    .fetch_all(pool)
    .await?)
}

/// Notes on the family itself and on each of its members
pub async fn delete_family_notes<'e>(db: impl SqliteExecutor<'e>, family_id: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM notes
        WHERE (content_type = 'families' AND object_id = ?1)
           OR (content_type = 'individuals'
               AND object_id IN (SELECT id FROM individuals WHERE family_id = ?1))
        "#,
    )
    .bind(family_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

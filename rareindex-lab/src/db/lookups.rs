//! Statuses and name lookup tables (get-or-create helpers)

use anyhow::Result;
use rareindex_common::models::{NamedItem, PipelineType, Status};
use sqlx::{SqliteConnection, SqliteExecutor};

/// Name/description lookup tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedTable {
    Institution,
    IdentifierType,
    SampleType,
    TestType,
    AnalysisType,
}

impl NamedTable {
    fn table(&self) -> &'static str {
        match self {
            NamedTable::Institution => "institutions",
            NamedTable::IdentifierType => "identifier_types",
            NamedTable::SampleType => "sample_types",
            NamedTable::TestType => "test_types",
            NamedTable::AnalysisType => "analysis_types",
        }
    }
}

pub async fn get_or_create_named(
    conn: &mut SqliteConnection,
    table: NamedTable,
    name: &str,
    created_by: Option<i64>,
) -> Result<i64> {
    let select = format!("SELECT id FROM {} WHERE name = ?", table.table());
    if let Some(id) = sqlx::query_scalar::<_, i64>(&select)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(id);
    }

    let insert = format!(
        "INSERT INTO {} (name, created_by) VALUES (?, ?) RETURNING id",
        table.table()
    );
    let id = sqlx::query_scalar(&insert)
        .bind(name)
        .bind(created_by)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

pub async fn list_named<'e>(db: impl SqliteExecutor<'e>, table: NamedTable) -> Result<Vec<NamedItem>> {
    let sql = format!("SELECT id, name, description FROM {} ORDER BY name", table.table());
    Ok(sqlx::query_as(&sql).fetch_all(db).await?)
}

/// Get or create a status scoped to `content_type` (a model table, or none)
pub async fn get_or_create_status(
    conn: &mut SqliteConnection,
    name: &str,
    content_type: Option<&str>,
    color: &str,
    created_by: Option<i64>,
) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM statuses WHERE name = ? AND content_type IS ?",
    )
    .bind(name)
    .bind(content_type)
    .fetch_optional(&mut *conn)
    .await?
    {
        return Ok(id);
    }

    let id = sqlx::query_scalar(
        "INSERT INTO statuses (name, content_type, color, created_by) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(content_type)
    .bind(color)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn get_status<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Status>> {
    Ok(
        sqlx::query_as("SELECT id, name, description, color, content_type FROM statuses WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?,
    )
}

pub async fn get_or_create_pipeline_type(
    conn: &mut SqliteConnection,
    name: &str,
    version: Option<&str>,
    created_by: Option<i64>,
) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM pipeline_types WHERE name = ? AND version IS ?",
    )
    .bind(name)
    .bind(version)
    .fetch_optional(&mut *conn)
    .await?
    {
        return Ok(id);
    }

    let id = sqlx::query_scalar(
        "INSERT INTO pipeline_types (name, version, created_by) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(version)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn find_pipeline_type_by_name<'e>(db: impl SqliteExecutor<'e>, name: &str) -> Result<Option<PipelineType>> {
    Ok(sqlx::query_as(
        "SELECT id, name, version, description FROM pipeline_types WHERE name = ? ORDER BY id LIMIT 1",
    )
    .bind(name)
    .fetch_optional(db)
    .await?)
}

pub async fn get_or_create_hpo_term(conn: &mut SqliteConnection, term_id: &str, label: &str) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM hpo_terms WHERE term_id = ?")
        .bind(term_id)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(id);
    }

    let id = sqlx::query_scalar("INSERT INTO hpo_terms (term_id, label) VALUES (?, ?) RETURNING id")
        .bind(term_id)
        .bind(label)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

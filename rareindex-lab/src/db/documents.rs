//! Uploaded documents: analysis reports and request forms

use anyhow::Result;
use rareindex_common::models::{AnalysisReport, AnalysisRequestForm};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

/// Tables whose rows carry a source document and a generated preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentTable {
    AnalysisReport,
    RequestForm,
}

impl DocumentTable {
    pub const ALL: [DocumentTable; 2] = [DocumentTable::AnalysisReport, DocumentTable::RequestForm];

    pub fn table(&self) -> &'static str {
        match self {
            DocumentTable::AnalysisReport => "analysis_reports",
            DocumentTable::RequestForm => "analysis_request_forms",
        }
    }
}

/// Source and preview paths of one document row (relative to the media root)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentPaths {
    pub id: i64,
    pub file_path: Option<String>,
    pub preview_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewReport {
    pub pipeline_id: i64,
    pub analysis_id: Option<i64>,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub created_by: Option<i64>,
}

pub async fn create_report(conn: &mut SqliteConnection, report: &NewReport) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO analysis_reports (pipeline_id, analysis_id, description, file_path, report_date, created_by)
        VALUES (?, ?, ?, ?, DATE('now'), ?)
        RETURNING id
        "#,
    )
    .bind(report.pipeline_id)
    .bind(report.analysis_id)
    .bind(&report.description)
    .bind(&report.file_path)
    .bind(report.created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn link_report_variant<'e>(db: impl SqliteExecutor<'e>, report_id: i64, variant_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO analysis_report_variants (report_id, variant_id) VALUES (?, ?)")
        .bind(report_id)
        .bind(variant_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn get_report<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<AnalysisReport>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, pipeline_id, analysis_id, description, file_path, preview_path, created_at
        FROM analysis_reports WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?)
}

pub async fn reports_for_analysis(pool: &SqlitePool, analysis_id: i64) -> Result<Vec<AnalysisReport>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, pipeline_id, analysis_id, description, file_path, preview_path, created_at
        FROM analysis_reports WHERE analysis_id = ? ORDER BY id
        "#,
    )
    .bind(analysis_id)
    .fetch_all(pool)
    .await?)
}

pub async fn create_request_form(
    conn: &mut SqliteConnection,
    individual_id: i64,
    description: Option<&str>,
    file_path: Option<&str>,
    created_by: Option<i64>,
) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO analysis_request_forms (individual_id, description, file_path, created_by)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(individual_id)
    .bind(description)
    .bind(file_path)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn get_request_form<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<AnalysisRequestForm>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, individual_id, description, file_path, preview_path, created_at
        FROM analysis_request_forms WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?)
}

pub async fn document_paths(pool: &SqlitePool, table: DocumentTable, id: i64) -> Result<Option<DocumentPaths>> {
    let sql = format!("SELECT id, file_path, preview_path FROM {} WHERE id = ?", table.table());
    Ok(sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?)
}

pub async fn set_preview_path(pool: &SqlitePool, table: DocumentTable, id: i64, preview_path: &str) -> Result<()> {
    let sql = format!("UPDATE {} SET preview_path = ? WHERE id = ?", table.table());
    sqlx::query(&sql).bind(preview_path).bind(id).execute(pool).await?;
    Ok(())
}

/// Rows with a source file but no preview yet
pub async fn documents_missing_preview(pool: &SqlitePool, table: DocumentTable) -> Result<Vec<i64>> {
    let sql = format!(
        r#"
        SELECT id FROM {}
        WHERE file_path IS NOT NULL AND file_path != ''
          AND (preview_path IS NULL OR preview_path = '')
        ORDER BY id
        "#,
        table.table()
    );
    Ok(sqlx::query_scalar(&sql).fetch_all(pool).await?)
}

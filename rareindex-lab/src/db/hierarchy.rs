//! Samples, tests, pipelines and analyses
//!
//! The chain is Individual -> Sample -> Test -> Pipeline -> Analysis; the
//! queries here walk it in both directions.

use anyhow::Result;
use chrono::NaiveDate;
use rareindex_common::models::{Analysis, Pipeline};
use serde::Serialize;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

/// Fields shared by the four hierarchy levels on insert
#[derive(Debug, Clone, Copy, Default)]
pub struct StepFields {
    pub type_id: Option<i64>,
    pub status_id: Option<i64>,
    pub date: Option<NaiveDate>,
    /// `isolation_by` for samples, `performed_by` otherwise
    pub user_id: Option<i64>,
    pub created_by: Option<i64>,
}

pub async fn create_sample(conn: &mut SqliteConnection, individual_id: i64, fields: StepFields) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO samples (individual_id, sample_type_id, status_id, receipt_date, isolation_by, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(individual_id)
    .bind(fields.type_id)
    .bind(fields.status_id)
    .bind(fields.date)
    .bind(fields.user_id)
    .bind(fields.created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn create_test(conn: &mut SqliteConnection, sample_id: i64, fields: StepFields) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO tests (sample_id, test_type_id, status_id, performed_date, performed_by, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(sample_id)
    .bind(fields.type_id)
    .bind(fields.status_id)
    .bind(fields.date)
    .bind(fields.user_id)
    .bind(fields.created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// `type_id` is required for pipelines
pub async fn create_pipeline(
    conn: &mut SqliteConnection,
    test_id: i64,
    pipeline_type_id: i64,
    fields: StepFields,
) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO pipelines (test_id, type_id, status_id, performed_date, performed_by, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(test_id)
    .bind(pipeline_type_id)
    .bind(fields.status_id)
    .bind(fields.date)
    .bind(fields.user_id)
    .bind(fields.created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn create_analysis(conn: &mut SqliteConnection, pipeline_id: i64, fields: StepFields) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO analyses (pipeline_id, type_id, status_id, performed_date, performed_by, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(pipeline_id)
    .bind(fields.type_id)
    .bind(fields.status_id)
    .bind(fields.date)
    .bind(fields.user_id)
    .bind(fields.created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn get_analysis<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Analysis>> {
    Ok(sqlx::query_as(
        "SELECT id, pipeline_id, type_id, status_id, performed_date, performed_by, created_at FROM analyses WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?)
}

pub async fn get_pipeline<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Pipeline>> {
    Ok(sqlx::query_as(
        "SELECT id, test_id, type_id, status_id, performed_date, performed_by, created_at FROM pipelines WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?)
}

/// Full ancestry of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AnalysisLineage {
    pub analysis_id: i64,
    pub pipeline_id: i64,
    pub test_id: i64,
    pub sample_id: i64,
    pub individual_id: i64,
}

pub async fn analysis_lineage(pool: &SqlitePool, analysis_id: i64) -> Result<Option<AnalysisLineage>> {
    Ok(sqlx::query_as(
        r#"
        SELECT a.id AS analysis_id, p.id AS pipeline_id, t.id AS test_id,
               s.id AS sample_id, s.individual_id
        FROM analyses a
        JOIN pipelines p ON p.id = a.pipeline_id
        JOIN tests t ON t.id = p.test_id
        JOIN samples s ON s.id = t.sample_id
        WHERE a.id = ?
        "#,
    )
    .bind(analysis_id)
    .fetch_optional(pool)
    .await?)
}

/// Selectable option in context pickers
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChoiceOption {
    pub id: i64,
    pub label: String,
}

/// Tests performed on any sample of the individual
pub async fn tests_for_individual(pool: &SqlitePool, individual_id: i64) -> Result<Vec<ChoiceOption>> {
    Ok(sqlx::query_as(
        r#"
        SELECT t.id,
               COALESCE(tt.name, 'Test') || ' #' || t.id ||
               COALESCE(' (' || t.performed_date || ')', '') AS label
        FROM tests t
        JOIN samples s ON s.id = t.sample_id
        LEFT JOIN test_types tt ON tt.id = t.test_type_id
        WHERE s.individual_id = ?
        ORDER BY t.id
        "#,
    )
    .bind(individual_id)
    .fetch_all(pool)
    .await?)
}

/// Analyses under any pipeline of the test
pub async fn analyses_for_test(pool: &SqlitePool, test_id: i64) -> Result<Vec<ChoiceOption>> {
    Ok(sqlx::query_as(
        r#"
        SELECT a.id,
               COALESCE(at.name, 'Analysis') || ' #' || a.id || ' / ' || pt.name AS label
        FROM analyses a
        JOIN pipelines p ON p.id = a.pipeline_id
        JOIN pipeline_types pt ON pt.id = p.type_id
        LEFT JOIN analysis_types at ON at.id = a.type_id
        WHERE p.test_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(test_id)
    .fetch_all(pool)
    .await?)
}

/// Every analysis reachable from the individual's samples
pub async fn analyses_for_individual(pool: &SqlitePool, individual_id: i64) -> Result<Vec<ChoiceOption>> {
    Ok(sqlx::query_as(
        r#"
        SELECT a.id,
               COALESCE(at.name, 'Analysis') || ' #' || a.id || ' / ' || pt.name AS label
        FROM analyses a
        JOIN pipelines p ON p.id = a.pipeline_id
        JOIN pipeline_types pt ON pt.id = p.type_id
        JOIN tests t ON t.id = p.test_id
        JOIN samples s ON s.id = t.sample_id
        LEFT JOIN analysis_types at ON at.id = a.type_id
        WHERE s.individual_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(individual_id)
    .fetch_all(pool)
    .await?)
}

/// Samples -> tests -> pipelines -> analyses of one individual, for detail views
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkflowRow {
    pub sample_id: i64,
    pub sample_type: Option<String>,
    pub test_id: Option<i64>,
    pub test_type: Option<String>,
    pub pipeline_id: Option<i64>,
    pub pipeline_type: Option<String>,
    pub pipeline_status: Option<String>,
    pub analysis_id: Option<i64>,
    pub analysis_type: Option<String>,
}

pub async fn workflow_for_individual(pool: &SqlitePool, individual_id: i64) -> Result<Vec<WorkflowRow>> {
    Ok(sqlx::query_as(
        r#"
        SELECT s.id AS sample_id, st.name AS sample_type,
               t.id AS test_id, tt.name AS test_type,
               p.id AS pipeline_id, pt.name AS pipeline_type, ps.name AS pipeline_status,
               a.id AS analysis_id, at.name AS analysis_type
        FROM samples s
        LEFT JOIN sample_types st ON st.id = s.sample_type_id
        LEFT JOIN tests t ON t.sample_id = s.id
        LEFT JOIN test_types tt ON tt.id = t.test_type_id
        LEFT JOIN pipelines p ON p.test_id = t.id
        LEFT JOIN pipeline_types pt ON pt.id = p.type_id
        LEFT JOIN statuses ps ON ps.id = p.status_id
        LEFT JOIN analyses a ON a.pipeline_id = p.id
        LEFT JOIN analysis_types at ON at.id = a.type_id
        WHERE s.individual_id = ?
        ORDER BY s.id, t.id, p.id, a.id
        "#,
    )
    .bind(individual_id)
    .fetch_all(pool)
    .await?)
}

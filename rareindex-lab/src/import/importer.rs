//! Dependency-ordered TSV importer
//!
//! For each model with a `<ModelName>.tsv` file, in topological order:
//! map headers onto columns, resolve foreign keys by id or natural key,
//! insert rows, then back-fill self references (pedigree parents) once every
//! row of the file exists. Bad rows are skipped; an insert failure rolls the
//! whole file back and the run moves on.
//!
//! `follow_up_notes` and `general_notes` cells on families and individuals
//! become one [`Note`](rareindex_common::models::Note) on the created row.

use super::graph::DependencyGraph;
use super::tsv::{convert_cell, read_tsv, Cell, SqlValue, TsvTable};
use super::ImportError;
use crate::db::notes;
use crate::db::users::ensure_fallback_user;
use rareindex_common::db::{model_registry, ColumnDefinition, ModelApp, ModelRegistry, TableSchema, AUDIT_USER_FIELDS};
use rareindex_common::models::{normalize_chromosome, NoteTarget};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Model forced to the front of the import order
const ROOT_MODEL: &str = "Family";

/// Columns collected into a note when the model has no such column
const NOTE_HEADERS: &[&str] = &["follow_up_notes", "general_notes"];

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub directory: PathBuf,
    /// Restrict the run to one application group
    pub app: Option<ModelApp>,
    /// Username for audit fields; first superuser when absent
    pub user: Option<String>,
}

impl ImportOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            app: None,
            user: None,
        }
    }
}

/// Outcome of one `<ModelName>.tsv`
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileSummary {
    pub model: String,
    pub created: usize,
    pub skipped: usize,
    pub deferred_resolved: usize,
    pub deferred_unresolved: usize,
    pub notes: usize,
    pub rolled_back: bool,
    pub error: Option<String>,
}

impl FileSummary {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub files: Vec<FileSummary>,
}

impl ImportSummary {
    pub fn file(&self, model: &str) -> Option<&FileSummary> {
        self.files.iter().find(|f| f.model == model)
    }

    pub fn total_created(&self) -> usize {
        self.files.iter().map(|f| f.created).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.files.iter().map(|f| f.skipped).sum()
    }

    pub fn rolled_back_files(&self) -> usize {
        self.files.iter().filter(|f| f.rolled_back).count()
    }
}

/// Self reference left for the second pass
#[derive(Debug)]
struct DeferredLink {
    row_id: i64,
    column: String,
    raw: String,
}

enum RowOutcome {
    Ready {
        values: Vec<(String, SqlValue)>,
        deferred: Vec<(String, String)>,
    },
    Skip(String),
}

pub struct Importer {
    pool: SqlitePool,
    registry: ModelRegistry,
}

impl Importer {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            registry: model_registry(),
        }
    }

    /// Import every model file present in `options.directory`
    pub async fn run(&self, options: &ImportOptions) -> Result<ImportSummary, ImportError> {
        if !options.directory.is_dir() {
            return Err(ImportError::DirectoryNotFound(options.directory.clone()));
        }

        let user = ensure_fallback_user(&self.pool, options.user.as_deref()).await?;
        info!(user = %user.username, directory = %options.directory.display(), "Starting import");

        let order = DependencyGraph::from_registry(&self.registry).import_order(ROOT_MODEL)?;
        debug!(?order, "Import order");

        let mut summary = ImportSummary::default();
        for model in order {
            let Some(schema) = self.registry.get(model) else {
                return Err(ImportError::UnknownModel(model.to_string()));
            };
            if options.app.is_some_and(|app| app != schema.app) {
                continue;
            }

            let path = options.directory.join(format!("{}.tsv", model));
            if !path.is_file() {
                debug!(model, "No file, skipping");
                continue;
            }

            let file_summary = match read_tsv(&path) {
                Ok(table) => self.import_file(schema, &table, user.id).await,
                Err(e) => {
                    error!(model, error = %e, "Could not read import file");
                    FileSummary {
                        error: Some(e.to_string()),
                        ..FileSummary::new(model)
                    }
                }
            };

            info!(
                model,
                created = file_summary.created,
                skipped = file_summary.skipped,
                deferred_resolved = file_summary.deferred_resolved,
                deferred_unresolved = file_summary.deferred_unresolved,
                rolled_back = file_summary.rolled_back,
                "Import file finished"
            );
            summary.files.push(file_summary);
        }

        Ok(summary)
    }

    async fn import_file(&self, schema: &TableSchema, table: &TsvTable, user_id: i64) -> FileSummary {
        let mut summary = FileSummary::new(schema.model);
        let mapping = map_headers(schema, &table.headers);

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                summary.error = Some(e.to_string());
                return summary;
            }
        };

        let result = self.import_rows(&mut *tx, schema, table, &mapping, user_id, &mut summary).await;
        let result = match result {
            Ok(()) => tx.commit().await.map_err(ImportError::from),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(model = schema.model, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        };

        if let Err(e) = result {
            error!(model = schema.model, error = %e, "Import failed, file rolled back");
            summary.rolled_back = true;
            summary.created = 0;
            summary.deferred_resolved = 0;
            summary.notes = 0;
            summary.error = Some(e.to_string());
        }
        summary
    }

    async fn import_rows(
        &self,
        conn: &mut SqliteConnection,
        schema: &TableSchema,
        table: &TsvTable,
        mapping: &[Option<&ColumnDefinition>],
        user_id: i64,
        summary: &mut FileSummary,
    ) -> Result<(), ImportError> {
        let mut pending: Vec<DeferredLink> = Vec::new();
        let note_target = NoteTarget::parse(schema.table);
        let note_columns: Vec<usize> = match note_target {
            Some(_) => table
                .headers
                .iter()
                .enumerate()
                .filter(|(_, header)| is_note_header(schema, header))
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        };

        for (index, row) in table.rows.iter().enumerate() {
            // Header is line 1
            let line = index + 2;
            match self.prepare_row(&mut *conn, schema, mapping, row, user_id).await? {
                RowOutcome::Skip(reason) => {
                    warn!(model = schema.model, line, %reason, "Skipping row");
                    summary.skipped += 1;
                }
                RowOutcome::Ready { values, deferred } => {
                    let row_id = insert_row(&mut *conn, schema, &values).await?;
                    summary.created += 1;
                    if let (Some(target), Some(content)) = (note_target, note_text(row, &note_columns)) {
                        notes::create_note(&mut *conn, target, row_id, &content, Some(user_id)).await?;
                        summary.notes += 1;
                    }
                    pending.extend(deferred.into_iter().map(|(column, raw)| DeferredLink { row_id, column, raw }));
                }
            }
        }

        for link in pending {
            match resolve_reference(&mut *conn, schema, &link.raw).await? {
                Some(target_id) => {
                    let sql = format!(
                        "UPDATE {} SET \"{}\" = ? WHERE \"{}\" = ?",
                        schema.table,
                        link.column,
                        schema.primary_key()
                    );
                    sqlx::query(&sql).bind(target_id).bind(link.row_id).execute(&mut *conn).await?;
                    summary.deferred_resolved += 1;
                }
                None => {
                    warn!(
                        model = schema.model,
                        row_id = link.row_id,
                        column = %link.column,
                        value = %link.raw,
                        "Unresolved self reference left empty"
                    );
                    summary.deferred_unresolved += 1;
                }
            }
        }

        Ok(())
    }

    async fn prepare_row(
        &self,
        conn: &mut SqliteConnection,
        schema: &TableSchema,
        mapping: &[Option<&ColumnDefinition>],
        row: &[String],
        user_id: i64,
    ) -> Result<RowOutcome, ImportError> {
        let mut values: Vec<(String, SqlValue)> = Vec::new();
        let mut deferred: Vec<(String, String)> = Vec::new();

        for (column, raw) in mapping.iter().zip(row) {
            let Some(column) = column else { continue };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            if let Some(fk) = &column.references {
                if fk.model == schema.model {
                    match resolve_reference(&mut *conn, schema, raw).await? {
                        Some(id) => values.push((column.name.clone(), SqlValue::Integer(id))),
                        None => deferred.push((column.name.clone(), raw.to_string())),
                    }
                    continue;
                }

                let target = self
                    .registry
                    .get(fk.model)
                    .ok_or_else(|| ImportError::UnknownModel(fk.model.to_string()))?;
                match resolve_reference(&mut *conn, target, raw).await? {
                    Some(id) => values.push((column.name.clone(), SqlValue::Integer(id))),
                    None => {
                        return Ok(RowOutcome::Skip(format!(
                            "{}: no {} matches '{}'",
                            column.name, fk.model, raw
                        )))
                    }
                }
                continue;
            }

            match convert_cell(column, raw) {
                Cell::Value(value) => match self.normalize(schema, &column.name, value) {
                    Ok(value) => values.push((column.name.clone(), value)),
                    Err(reason) => return Ok(RowOutcome::Skip(reason)),
                },
                Cell::Absent => {}
                Cell::Dropped(reason) => warn!(model = schema.model, %reason, "Dropping field"),
                Cell::Invalid(reason) => return Ok(RowOutcome::Skip(reason)),
            }
        }

        for field in AUDIT_USER_FIELDS {
            if schema.get_column(field).is_some() && !values.iter().any(|(name, _)| name == *field) {
                values.push((field.to_string(), SqlValue::Integer(user_id)));
            }
        }

        let provided: HashSet<&str> = values.iter().map(|(name, _)| name.as_str()).collect();
        for column in &schema.columns {
            let generated = column.primary_key && column.references.is_none();
            if column.not_null && column.default_value.is_none() && !generated && !provided.contains(column.name.as_str()) {
                return Ok(RowOutcome::Skip(format!("missing required column {}", column.name)));
            }
        }

        Ok(RowOutcome::Ready { values, deferred })
    }

    /// Model-specific value rules: `chr` prefixes, note targets as table names
    fn normalize(&self, schema: &TableSchema, column: &str, value: SqlValue) -> Result<SqlValue, String> {
        match (schema.model, column, value) {
            ("Variant", "chromosome", SqlValue::Text(chrom)) => Ok(SqlValue::Text(normalize_chromosome(&chrom))),
            ("Note", "content_type", SqlValue::Text(raw)) => NoteTarget::parse(&raw)
                .or_else(|| self.registry.table_of(raw.trim()).and_then(NoteTarget::parse))
                .map(|target| SqlValue::Text(target.as_str().to_string()))
                .ok_or_else(|| format!("content_type: notes cannot attach to '{}'", raw)),
            (_, _, value) => Ok(value),
        }
    }
}

fn is_note_header(schema: &TableSchema, header: &str) -> bool {
    NOTE_HEADERS.contains(&header) && schema.get_column(header).is_none() && NoteTarget::parse(schema.table).is_some()
}

/// Non-empty note cells of a row, joined by a blank line
fn note_text(row: &[String], columns: &[usize]) -> Option<String> {
    let parts: Vec<&str> = columns
        .iter()
        .filter_map(|&i| row.get(i))
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Map each header to a column: exact name first, then `<header>_id` for FK columns
fn map_headers<'a>(schema: &'a TableSchema, headers: &[String]) -> Vec<Option<&'a ColumnDefinition>> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .map(|header| {
            let column = schema.get_column(header).or_else(|| {
                schema
                    .get_column(&format!("{}_id", header))
                    .filter(|c| c.references.is_some())
            });
            match column {
                Some(c) if seen.insert(c.name.as_str()) => Some(c),
                Some(c) => {
                    warn!(model = schema.model, header = %header, column = %c.name, "Duplicate column ignored");
                    None
                }
                None if is_note_header(schema, header) => None,
                None => {
                    warn!(model = schema.model, header = %header, "Unknown column ignored");
                    None
                }
            }
        })
        .collect()
}

/// Find a row of `target` by id, then by each natural-key field in order
async fn resolve_reference(
    conn: &mut SqliteConnection,
    target: &TableSchema,
    raw: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let pk = target.primary_key();

    if let Ok(id) = raw.parse::<i64>() {
        let sql = format!("SELECT \"{pk}\" FROM {} WHERE \"{pk}\" = ?", target.table);
        if let Some(found) = sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        {
            return Ok(Some(found));
        }
    }

    for field in &target.lookup_fields {
        let sql = format!(
            "SELECT \"{pk}\" FROM {} WHERE \"{}\" = ? ORDER BY \"{pk}\" LIMIT 1",
            target.table, field
        );
        if let Some(found) = sqlx::query_scalar::<_, i64>(&sql)
            .bind(raw)
            .fetch_optional(&mut *conn)
            .await?
        {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

async fn insert_row(
    conn: &mut SqliteConnection,
    schema: &TableSchema,
    values: &[(String, SqlValue)],
) -> Result<i64, sqlx::Error> {
    let pk = schema.primary_key();
    let sql = if values.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING \"{}\"", schema.table, pk)
    } else {
        let columns: Vec<String> = values.iter().map(|(name, _)| format!("\"{}\"", name)).collect();
        let placeholders = vec!["?"; values.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING \"{}\"",
            schema.table,
            columns.join(", "),
            placeholders,
            pk
        )
    };

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for (_, value) in values {
        query = match value {
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query.fetch_one(&mut *conn).await
}

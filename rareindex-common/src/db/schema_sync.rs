//! Declarative schema definitions and automatic schema synchronization
//!
//! Every model is described once by a [`TableSchema`]. The same definition
//! drives three things:
//! 1. **CREATE TABLE IF NOT EXISTS** for fresh databases
//! 2. **Auto-sync** of columns added after a database was first created
//! 3. **Import metadata**: foreign keys (`references`) and natural-key
//!    lookup fields used by the dependency-ordered TSV importer
//!
//! # Usage
//!
//! ```rust,ignore
//! let families = TableSchema::new("Family", "families", ModelApp::Lab)
//!     .column(ColumnDefinition::id())
//!     .column(ColumnDefinition::new("family_id", "TEXT").not_null().unique())
//!     .column(ColumnDefinition::new("created_by", "INTEGER").references("User"))
//!     .lookup(&["family_id"]);
//!
//! SchemaSync::sync_table(&pool, &families).await?;
//! ```

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// Action taken on rows referencing a deleted parent row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    NoAction,
    Cascade,
    SetNull,
}

impl OnDelete {
    fn as_sql(&self) -> Option<&'static str> {
        match self {
            OnDelete::NoAction => None,
            OnDelete::Cascade => Some("ON DELETE CASCADE"),
            OnDelete::SetNull => Some("ON DELETE SET NULL"),
        }
    }
}

/// Foreign key target, by model name
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub model: &'static str,
    pub on_delete: OnDelete,
}

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (TEXT, INTEGER, REAL, BOOLEAN, DATE, TIMESTAMP, JSON)
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// DEFAULT value (raw SQL)
    pub default_value: Option<String>,
    /// Model this column points at
    pub references: Option<ForeignKey>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
            references: None,
        }
    }

    /// `id INTEGER PRIMARY KEY`
    pub fn id() -> Self {
        Self::new("id", "INTEGER").primary_key()
    }

    /// `created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP`
    pub fn created_at() -> Self {
        Self::new("created_at", "TIMESTAMP")
            .not_null()
            .default("CURRENT_TIMESTAMP")
    }

    /// `updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP`
    pub fn updated_at() -> Self {
        Self::new("updated_at", "TIMESTAMP")
            .not_null()
            .default("CURRENT_TIMESTAMP")
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark column as UNIQUE
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Foreign key to another model's primary key
    pub fn references(mut self, model: &'static str) -> Self {
        self.references = Some(ForeignKey {
            model,
            on_delete: OnDelete::NoAction,
        });
        self
    }

    pub fn on_delete_cascade(mut self) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_delete = OnDelete::Cascade;
        }
        self
    }

    pub fn on_delete_set_null(mut self) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_delete = OnDelete::SetNull;
        }
        self
    }

    /// Column DDL fragment, with the FK target already resolved to a table
    fn ddl(&self, fk_table: Option<&str>) -> String {
        let mut sql = format!("\"{}\" {}", self.name, self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let (Some(fk), Some(table)) = (&self.references, fk_table) {
            sql.push_str(&format!(" REFERENCES {}(id)", table));
            if let Some(action) = fk.on_delete.as_sql() {
                sql.push(' ');
                sql.push_str(action);
            }
        }
        sql
    }
}

/// Application group a model belongs to (importer `--app` filter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelApp {
    /// Accounts, groups, audit history
    Core,
    /// Families, individuals, samples, tests, pipelines, analyses, reports
    Lab,
    /// Variants, classifications, annotations, genes
    Variant,
}

impl ModelApp {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "core" | "auth" => Some(ModelApp::Core),
            "lab" => Some(ModelApp::Lab),
            "variant" => Some(ModelApp::Variant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelApp::Core => "core",
            ModelApp::Lab => "lab",
            ModelApp::Variant => "variant",
        }
    }
}

/// Expected schema for one model's table
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Model name (`Family`, `Individual`, ...), also the import file stem
    pub model: &'static str,
    /// Table name in database
    pub table: &'static str,
    pub app: ModelApp,
    /// Column definitions (order matters for new table creation)
    pub columns: Vec<ColumnDefinition>,
    /// Natural-key fields tried, in order, when resolving a reference by text
    pub lookup_fields: Vec<&'static str>,
    /// Table-level constraints, e.g. `UNIQUE(variant_id, source, source_version)`
    pub constraints: Vec<String>,
    /// Columns that get a plain index
    pub indexes: Vec<&'static str>,
}

impl TableSchema {
    pub fn new(model: &'static str, table: &'static str, app: ModelApp) -> Self {
        Self {
            model,
            table,
            app,
            columns: Vec::new(),
            lookup_fields: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn lookup(mut self, fields: &[&'static str]) -> Self {
        self.lookup_fields.extend_from_slice(fields);
        self
    }

    pub fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn index(mut self, column: &'static str) -> Self {
        self.indexes.push(column);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Name of the primary key column (`id` unless the table is keyed by a parent)
    pub fn primary_key(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .unwrap_or("id")
    }

    /// Foreign key columns, in declaration order
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&ColumnDefinition, &ForeignKey)> {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_ref().map(|fk| (c, fk)))
    }

    /// Build the CREATE TABLE statement; `table_of` maps a model name to its table
    pub fn create_table_sql<F>(&self, table_of: F) -> String
    where
        F: Fn(&str) -> Option<&'static str>,
    {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let fk_table = c.references.as_ref().and_then(|fk| table_of(fk.model));
                c.ddl(fk_table)
            })
            .collect();
        parts.extend(self.constraints.iter().cloned());

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table,
            parts.join(",\n    ")
        )
    }

    /// CREATE INDEX statements for indexed columns
    pub fn create_index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|col| {
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}(\"{}\")",
                    self.table, col, self.table, col
                )
            })
            .collect()
    }
}

/// Actual column from database introspection (PRAGMA table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub pk: bool,
}

/// Schema drift detected between expected and actual schema
#[derive(Debug, Clone)]
pub enum SchemaDrift {
    /// Column missing from database
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type mismatch (requires a manual migration)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
}

/// Schema introspection via PRAGMA table_info
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read actual columns from a table, ordered by cid
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                default_value: row.get("dflt_value"),
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);
        Ok(columns)
    }

    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Schema comparison
pub struct SchemaDiff;

impl SchemaDiff {
    /// Compare expected columns against the database, returning fixable and unfixable drift
    pub fn compare(table_name: &str, expected: &[ColumnDefinition], actual: &[ActualColumn]) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            match actual.iter().find(|c| c.name == expected_col.name) {
                Some(actual_col) => {
                    if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                        drift.push(SchemaDrift::TypeMismatch {
                            table: table_name.to_string(),
                            column: expected_col.name.clone(),
                            expected: expected_col.sql_type.clone(),
                            actual: actual_col.type_name.clone(),
                        });
                    }
                }
                None => drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.clone(),
                }),
            }
        }

        drift
    }

    /// SQLite type affinity check
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        let integer = |t: &str| t.contains("INT") || t == "BOOLEAN";
        let text = |t: &str| {
            t.contains("TEXT") || t.contains("CHAR") || t == "DATE" || t == "TIMESTAMP" || t == "JSON"
        };
        let real = |t: &str| t.contains("REAL") || t.contains("FLOAT") || t.contains("DOUBLE");

        (integer(&exp) && integer(&act)) || (text(&exp) && text(&act)) || (real(&exp) && real(&act))
    }
}

/// Schema synchronization: add columns missing from existing tables
pub struct SchemaSync;

impl SchemaSync {
    /// Detect drift for one table and add missing columns
    ///
    /// Type changes are only reported; they need a versioned migration.
    pub async fn sync_table(pool: &SqlitePool, schema: &TableSchema) -> Result<()> {
        if !SchemaIntrospector::table_exists(pool, schema.table).await? {
            warn!(
                "Table '{}' does not exist - should be created before schema sync",
                schema.table
            );
            return Ok(());
        }

        let actual = SchemaIntrospector::introspect_table(pool, schema.table).await?;
        let drift = SchemaDiff::compare(schema.table, &schema.columns, &actual);

        if drift.is_empty() {
            debug!("Schema up to date for '{}'", schema.table);
            return Ok(());
        }

        for change in drift {
            match change {
                SchemaDrift::MissingColumn { table, column } => {
                    Self::add_column(pool, &table, &column).await?;
                }
                SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                    warn!(
                        "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                        table, column, expected, actual
                    );
                }
            }
        }

        Ok(())
    }

    /// ALTER TABLE ADD COLUMN, dropping constraints SQLite cannot add in place
    async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN \"{}\" {}",
            table, column.name, column.sql_type
        );

        if column.primary_key || column.unique {
            warn!(
                "Cannot add PRIMARY KEY/UNIQUE column {}.{} via ALTER TABLE; adding it unconstrained",
                table, column.name
            );
        }

        match (&column.default_value, column.not_null) {
            (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
            (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
            (None, true) => warn!(
                "Cannot add NOT NULL column {}.{} without DEFAULT; adding it nullable",
                table, column.name
            ),
            (None, false) => {}
        }

        info!("Adding column: {}.{} ({})", table, column.name, column.sql_type);

        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                debug!("Column {}.{} already added concurrently", table, column.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widgets() -> TableSchema {
        TableSchema::new("Widget", "widgets", ModelApp::Lab)
            .column(ColumnDefinition::id())
            .column(ColumnDefinition::new("name", "TEXT").not_null().unique())
            .column(ColumnDefinition::new("status", "TEXT").default("'new'"))
            .column(
                ColumnDefinition::new("parent_id", "INTEGER")
                    .references("Widget")
                    .on_delete_set_null(),
            )
            .lookup(&["name"])
            .index("status")
    }

    #[test]
    fn create_sql_resolves_foreign_keys() {
        let sql = widgets().create_table_sql(|model| (model == "Widget").then_some("widgets"));
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS widgets"));
        assert!(sql.contains("\"name\" TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("\"status\" TEXT DEFAULT 'new'"));
        assert!(sql.contains("\"parent_id\" INTEGER REFERENCES widgets(id) ON DELETE SET NULL"));
    }

    #[test]
    fn primary_key_defaults_to_id() {
        assert_eq!(widgets().primary_key(), "id");

        let keyed = TableSchema::new("Child", "children", ModelApp::Lab)
            .column(ColumnDefinition::new("widget_id", "INTEGER").primary_key().references("Widget"));
        assert_eq!(keyed.primary_key(), "widget_id");
    }

    #[test]
    fn detects_missing_column() {
        let actual = vec![ActualColumn {
            cid: 0,
            name: "id".to_string(),
            type_name: "INTEGER".to_string(),
            not_null: false,
            default_value: None,
            pk: true,
        }];

        let drift = SchemaDiff::compare("widgets", &widgets().columns, &actual);
        let missing: Vec<_> = drift
            .iter()
            .filter_map(|d| match d {
                SchemaDrift::MissingColumn { column, .. } => Some(column.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, vec!["name", "status", "parent_id"]);
    }

    #[test]
    fn date_and_text_are_compatible() {
        assert!(SchemaDiff::types_compatible("DATE", "TEXT"));
        assert!(SchemaDiff::types_compatible("BOOLEAN", "INTEGER"));
        assert!(!SchemaDiff::types_compatible("INTEGER", "TEXT"));
    }

    #[tokio::test]
    async fn sync_adds_missing_column() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        SchemaSync::sync_table(&pool, &widgets()).await.unwrap();

        let columns = SchemaIntrospector::introspect_table(&pool, "widgets").await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "status", "parent_id"]);
    }
}

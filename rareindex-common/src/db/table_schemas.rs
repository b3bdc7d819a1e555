//! Model registry
//!
//! Single source of truth for every table: column layout, foreign keys,
//! natural-key lookup fields and application group. Table creation, schema
//! sync and the TSV importer all read from [`model_registry`].

use crate::db::schema_sync::{ColumnDefinition as Col, ModelApp, SchemaSync, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Ordered collection of model schemas, addressable by model name
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    schemas: Vec<TableSchema>,
}

impl ModelRegistry {
    pub fn new(schemas: Vec<TableSchema>) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &[TableSchema] {
        &self.schemas
    }

    pub fn get(&self, model: &str) -> Option<&TableSchema> {
        self.schemas.iter().find(|s| s.model == model)
    }

    /// Table name for a model
    pub fn table_of(&self, model: &str) -> Option<&'static str> {
        self.get(model).map(|s| s.table)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.iter().map(|s| s.model)
    }

    /// Create all tables and indexes (idempotent), then sync added columns
    pub async fn create_all(&self, pool: &SqlitePool) -> Result<()> {
        for schema in &self.schemas {
            let sql = schema.create_table_sql(|model| self.table_of(model));
            sqlx::query(&sql).execute(pool).await?;
            for index_sql in schema.create_index_sql() {
                sqlx::query(&index_sql).execute(pool).await?;
            }
        }

        for schema in &self.schemas {
            SchemaSync::sync_table(pool, schema).await?;
        }

        info!("Schema ready: {} tables", self.schemas.len());
        Ok(())
    }
}

/// Fields written by the importer from the fallback user when absent
pub const AUDIT_USER_FIELDS: &[&str] = &["created_by", "performed_by", "isolation_by"];

fn created_by() -> Col {
    Col::new("created_by", "INTEGER").references("User").on_delete_set_null()
}

fn status() -> Col {
    Col::new("status_id", "INTEGER").references("Status").on_delete_set_null()
}

fn performed_by() -> Col {
    Col::new("performed_by", "INTEGER").references("User").on_delete_set_null()
}

/// Name/description lookup table (institutions, sample types, ...)
fn named_lookup(model: &'static str, table: &'static str) -> TableSchema {
    TableSchema::new(model, table, ModelApp::Lab)
        .column(Col::id())
        .column(Col::new("name", "TEXT").not_null().unique())
        .column(Col::new("description", "TEXT"))
        .column(created_by())
        .column(Col::created_at())
        .lookup(&["name"])
}

/// Many-to-many link table with its own id
fn link_table(
    model: &'static str,
    table: &'static str,
    app: ModelApp,
    left: (&'static str, &'static str),
    right: (&'static str, &'static str),
) -> TableSchema {
    TableSchema::new(model, table, app)
        .column(Col::id())
        .column(Col::new(left.0, "INTEGER").not_null().references(left.1).on_delete_cascade())
        .column(Col::new(right.0, "INTEGER").not_null().references(right.1).on_delete_cascade())
        .constraint(format!("UNIQUE({}, {})", left.0, right.0))
}

/// All RareIndex models
pub fn model_registry() -> ModelRegistry {
    ModelRegistry::new(vec![
        // --- Accounts ---
        TableSchema::new("User", "users", ModelApp::Core)
            .column(Col::id())
            .column(Col::new("username", "TEXT").not_null().unique())
            .column(Col::new("email", "TEXT"))
            .column(Col::new("first_name", "TEXT"))
            .column(Col::new("last_name", "TEXT"))
            .column(Col::new("is_superuser", "BOOLEAN").not_null().default("0"))
            .column(Col::new("is_staff", "BOOLEAN").not_null().default("0"))
            .column(Col::new("is_active", "BOOLEAN").not_null().default("1"))
            .column(Col::new("password_hash", "TEXT"))
            .column(Col::new("password_salt", "TEXT"))
            .column(Col::new("date_joined", "TIMESTAMP").not_null().default("CURRENT_TIMESTAMP"))
            .lookup(&["username", "email"]),
        TableSchema::new("Group", "groups", ModelApp::Core)
            .column(Col::id())
            .column(Col::new("name", "TEXT").not_null().unique())
            .lookup(&["name"]),
        link_table("UserGroup", "user_groups", ModelApp::Core, ("user_id", "User"), ("group_id", "Group")),
        // --- Lookups ---
        TableSchema::new("Status", "statuses", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("name", "TEXT").not_null())
            .column(Col::new("description", "TEXT"))
            .column(Col::new("color", "TEXT").not_null().default("'gray'"))
            .column(Col::new("content_type", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .constraint("UNIQUE(name, content_type)")
            .lookup(&["name"]),
        named_lookup("Institution", "institutions")
            .column(Col::new("city", "TEXT"))
            .column(Col::new("contact", "TEXT")),
        named_lookup("IdentifierType", "identifier_types"),
        named_lookup("SampleType", "sample_types"),
        named_lookup("TestType", "test_types"),
        named_lookup("AnalysisType", "analysis_types"),
        TableSchema::new("PipelineType", "pipeline_types", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("name", "TEXT").not_null())
            .column(Col::new("version", "TEXT"))
            .column(Col::new("description", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .constraint("UNIQUE(name, version)")
            .lookup(&["name"]),
        TableSchema::new("HpoTerm", "hpo_terms", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("term_id", "TEXT").not_null().unique())
            .column(Col::new("label", "TEXT"))
            .lookup(&["term_id", "label"]),
        // --- Lab hierarchy ---
        TableSchema::new("Family", "families", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("family_id", "TEXT").not_null().unique())
            .column(Col::new("description", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .column(Col::updated_at())
            .lookup(&["family_id"]),
        TableSchema::new("Individual", "individuals", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("family_id", "INTEGER").not_null().references("Family").on_delete_cascade())
            .column(Col::new("lab_id", "TEXT").unique())
            .column(Col::new("full_name", "TEXT").not_null())
            .column(Col::new("tc_identity", "TEXT"))
            .column(Col::new("birth_date", "DATE"))
            .column(Col::new("sex", "TEXT").not_null().default("'unknown'"))
            .column(Col::new("is_index", "BOOLEAN").not_null().default("0"))
            .column(Col::new("is_affected", "BOOLEAN").not_null().default("0"))
            .column(Col::new("is_alive", "BOOLEAN").not_null().default("1"))
            .column(Col::new("icd11_code", "TEXT"))
            .column(Col::new("diagnosis", "TEXT"))
            .column(Col::new("diagnosis_date", "DATE"))
            .column(Col::new("council_date", "DATE"))
            .column(status())
            .column(Col::new("institution_id", "INTEGER").references("Institution").on_delete_set_null())
            .column(Col::new("mother_id", "INTEGER").references("Individual").on_delete_set_null())
            .column(Col::new("father_id", "INTEGER").references("Individual").on_delete_set_null())
            .column(created_by())
            .column(Col::created_at())
            .column(Col::updated_at())
            .lookup(&["lab_id", "full_name"])
            .index("family_id"),
        link_table(
            "IndividualHpoTerm",
            "individual_hpo_terms",
            ModelApp::Lab,
            ("individual_id", "Individual"),
            ("hpo_term_id", "HpoTerm"),
        ),
        TableSchema::new("CrossIdentifier", "cross_identifiers", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("individual_id", "INTEGER").not_null().references("Individual").on_delete_cascade())
            .column(Col::new("id_type_id", "INTEGER").not_null().references("IdentifierType"))
            .column(Col::new("id_value", "TEXT").not_null())
            .column(Col::new("link", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .constraint("UNIQUE(individual_id, id_type_id, id_value)")
            .lookup(&["id_value"]),
        TableSchema::new("Sample", "samples", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("individual_id", "INTEGER").not_null().references("Individual").on_delete_cascade())
            .column(Col::new("sample_type_id", "INTEGER").references("SampleType").on_delete_set_null())
            .column(status())
            .column(Col::new("receipt_date", "DATE"))
            .column(Col::new("processing_date", "DATE"))
            .column(Col::new("isolation_by", "INTEGER").references("User").on_delete_set_null())
            .column(Col::new("sample_measurements", "TEXT"))
            .column(Col::new("notes", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .index("individual_id"),
        TableSchema::new("Test", "tests", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("sample_id", "INTEGER").not_null().references("Sample").on_delete_cascade())
            .column(Col::new("test_type_id", "INTEGER").references("TestType").on_delete_set_null())
            .column(status())
            .column(Col::new("performed_date", "DATE"))
            .column(performed_by())
            .column(Col::new("service_send_date", "DATE"))
            .column(Col::new("data_receipt_date", "DATE"))
            .column(Col::new("council_date", "DATE"))
            .column(Col::new("notes", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .index("sample_id"),
        TableSchema::new("Pipeline", "pipelines", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("test_id", "INTEGER").not_null().references("Test").on_delete_cascade())
            .column(Col::new("type_id", "INTEGER").not_null().references("PipelineType"))
            .column(status())
            .column(Col::new("performed_date", "DATE"))
            .column(performed_by())
            .column(Col::new("notes", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .index("test_id"),
        TableSchema::new("Analysis", "analyses", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("pipeline_id", "INTEGER").not_null().references("Pipeline").on_delete_cascade())
            .column(Col::new("type_id", "INTEGER").references("AnalysisType").on_delete_set_null())
            .column(status())
            .column(Col::new("performed_date", "DATE"))
            .column(performed_by())
            .column(Col::new("notes", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .index("pipeline_id"),
        // --- Variants ---
        TableSchema::new("Gene", "genes", ModelApp::Variant)
            .column(Col::id())
            .column(Col::new("hgnc_id", "TEXT").not_null().unique())
            .column(Col::new("symbol", "TEXT").not_null())
            .column(Col::new("name", "TEXT"))
            .column(Col::new("alias_symbol", "TEXT"))
            .column(Col::new("alias_name", "TEXT"))
            .column(Col::new("prev_symbol", "TEXT"))
            .column(Col::new("prev_name", "TEXT"))
            .column(Col::new("ensembl_gene_id", "TEXT"))
            .column(Col::new("entrez_id", "TEXT"))
            .column(Col::new("omim_id", "TEXT"))
            .column(Col::new("location", "TEXT"))
            .column(Col::new("locus_type", "TEXT"))
            .column(Col::new("locus_group", "TEXT"))
            .column(Col::new("gene_family", "TEXT"))
            .column(Col::new("uniprot_ids", "TEXT"))
            .column(Col::new("pubmed_id", "TEXT"))
            .column(Col::new("refseq_accession", "TEXT"))
            .column(Col::created_at())
            .column(Col::updated_at())
            .lookup(&["hgnc_id", "symbol"])
            .index("symbol"),
        TableSchema::new("Variant", "variants", ModelApp::Variant)
            .column(Col::id())
            .column(Col::new("individual_id", "INTEGER").not_null().references("Individual").on_delete_cascade())
            .column(Col::new("pipeline_id", "INTEGER").references("Pipeline").on_delete_set_null())
            .column(Col::new("analysis_id", "INTEGER").references("Analysis").on_delete_set_null())
            .column(status())
            .column(Col::new("assembly_version", "TEXT").not_null().default("'hg38'"))
            .column(Col::new("chromosome", "TEXT").not_null())
            .column(Col::new("start", "INTEGER").not_null())
            .column(Col::new("end", "INTEGER").not_null())
            .column(Col::new("zygosity", "TEXT").not_null().default("'unknown'"))
            .column(Col::new("notes", "TEXT"))
            .column(created_by())
            .column(Col::created_at())
            .column(Col::updated_at())
            .index("analysis_id")
            .index("individual_id"),
        TableSchema::new("SNV", "snvs", ModelApp::Variant)
            .column(Col::new("variant_id", "INTEGER").primary_key().references("Variant").on_delete_cascade())
            .column(Col::new("reference", "TEXT").not_null())
            .column(Col::new("alternate", "TEXT").not_null()),
        TableSchema::new("CNV", "cnvs", ModelApp::Variant)
            .column(Col::new("variant_id", "INTEGER").primary_key().references("Variant").on_delete_cascade())
            .column(Col::new("cnv_type", "TEXT").not_null())
            .column(Col::new("copy_number", "INTEGER")),
        TableSchema::new("SV", "svs", ModelApp::Variant)
            .column(Col::new("variant_id", "INTEGER").primary_key().references("Variant").on_delete_cascade())
            .column(Col::new("sv_type", "TEXT").not_null())
            .column(Col::new("breakpoints", "JSON")),
        TableSchema::new("Repeat", "repeats", ModelApp::Variant)
            .column(Col::new("variant_id", "INTEGER").primary_key().references("Variant").on_delete_cascade())
            .column(Col::new("repeat_unit", "TEXT").not_null())
            .column(Col::new("repeat_count", "INTEGER").not_null()),
        TableSchema::new("Classification", "classifications", ModelApp::Variant)
            .column(Col::id())
            .column(Col::new("variant_id", "INTEGER").not_null().references("Variant").on_delete_cascade())
            .column(Col::new("user_id", "INTEGER").references("User").on_delete_set_null())
            .column(Col::new("classification", "TEXT").not_null())
            .column(Col::new("inheritance", "TEXT").not_null().default("'unknown'"))
            .column(Col::new("notes", "TEXT"))
            .column(status())
            .column(Col::created_at())
            .column(Col::updated_at())
            .index("variant_id"),
        TableSchema::new("Annotation", "annotations", ModelApp::Variant)
            .column(Col::id())
            .column(Col::new("variant_id", "INTEGER").not_null().references("Variant").on_delete_cascade())
            .column(Col::new("source", "TEXT").not_null())
            .column(Col::new("source_version", "TEXT").not_null())
            .column(Col::new("data", "JSON").not_null())
            .column(Col::created_at())
            .constraint("UNIQUE(variant_id, source, source_version)"),
        link_table("VariantGene", "variant_genes", ModelApp::Variant, ("variant_id", "Variant"), ("gene_id", "Gene")),
        // --- Documents ---
        TableSchema::new("AnalysisReport", "analysis_reports", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("pipeline_id", "INTEGER").not_null().references("Pipeline").on_delete_cascade())
            .column(Col::new("analysis_id", "INTEGER").references("Analysis").on_delete_set_null())
            .column(Col::new("description", "TEXT"))
            .column(Col::new("report_date", "DATE"))
            .column(Col::new("file_path", "TEXT"))
            .column(Col::new("preview_path", "TEXT"))
            .column(created_by())
            .column(Col::created_at()),
        link_table(
            "AnalysisReportVariant",
            "analysis_report_variants",
            ModelApp::Lab,
            ("report_id", "AnalysisReport"),
            ("variant_id", "Variant"),
        ),
        TableSchema::new("AnalysisRequestForm", "analysis_request_forms", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("individual_id", "INTEGER").not_null().references("Individual").on_delete_cascade())
            .column(Col::new("description", "TEXT"))
            .column(Col::new("file_path", "TEXT"))
            .column(Col::new("preview_path", "TEXT"))
            .column(created_by())
            .column(Col::created_at()),
        // --- Notes ---
        TableSchema::new("Note", "notes", ModelApp::Lab)
            .column(Col::id())
            .column(Col::new("content", "TEXT").not_null())
            .column(Col::new("content_type", "TEXT").not_null())
            .column(Col::new("object_id", "INTEGER").not_null())
            .column(created_by())
            .column(Col::created_at())
            .column(Col::updated_at())
            .index("object_id"),
        // --- Audit ---
        TableSchema::new("History", "history", ModelApp::Core)
            .column(Col::id())
            .column(Col::new("table_name", "TEXT").not_null())
            .column(Col::new("object_id", "INTEGER").not_null())
            .column(Col::new("action", "TEXT").not_null())
            .column(Col::new("changed_by", "INTEGER").references("User").on_delete_set_null())
            .column(Col::new("changed_at", "TIMESTAMP").not_null().default("CURRENT_TIMESTAMP"))
            .column(Col::new("snapshot", "JSON"))
            .index("object_id"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_reference_points_at_a_registered_model() {
        let registry = model_registry();
        for schema in registry.schemas() {
            for (column, fk) in schema.foreign_keys() {
                assert!(
                    registry.get(fk.model).is_some(),
                    "{}.{} references unknown model {}",
                    schema.model,
                    column.name,
                    fk.model
                );
            }
        }
    }

    #[test]
    fn lookup_fields_are_columns() {
        let registry = model_registry();
        for schema in registry.schemas() {
            for field in &schema.lookup_fields {
                assert!(schema.get_column(field).is_some(), "{}.{}", schema.model, field);
            }
        }
    }

    #[test]
    fn subtype_tables_are_keyed_by_variant() {
        let registry = model_registry();
        for model in ["SNV", "CNV", "SV", "Repeat"] {
            assert_eq!(registry.get(model).map(|s| s.primary_key()), Some("variant_id"));
        }
    }
}

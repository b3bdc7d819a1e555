//! Bulk TSV import
//!
//! A directory holds one `<ModelName>.tsv` per model. Files are imported in
//! foreign-key dependency order, each in its own transaction.

pub mod graph;
pub mod importer;
pub mod tsv;

pub use graph::DependencyGraph;
pub use importer::{FileSummary, ImportOptions, ImportSummary, Importer};

use std::path::PathBuf;
use thiserror::Error;

/// Import failures that abort the run (row and file errors are summarized instead)
#[derive(Debug, Error)]
pub enum ImportError {
    /// The model graph contains a cycle through this model
    #[error("Circular dependency detected involving model {0}")]
    CircularDependency(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Import directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Unknown app '{0}' (expected core, lab or variant)")]
    UnknownApp(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV error: {0}")]
    Tsv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

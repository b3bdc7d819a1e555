//! HGNC gene catalog import
//!
//! Reads the HGNC complete-set TSV from a URL or a local file and upserts
//! every non-withdrawn entry by `hgnc_id` inside one transaction.

use crate::db::genes;
use rareindex_common::models::Gene;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const WITHDRAWN: &str = "Entry Withdrawn";
const PROGRESS_EVERY: usize = 1000;

#[derive(Debug, Error)]
pub enum GeneImportError {
    #[error("Provide either a URL or a file")]
    NoSource,

    #[error("Download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed TSV: {0}")]
    Tsv(#[from] csv::Error),

    #[error("Required column missing: {0}")]
    MissingColumn(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<sqlx::Error> for GeneImportError {
    fn from(e: sqlx::Error) -> Self {
        GeneImportError::Database(e.into())
    }
}

/// Where the HGNC file comes from
#[derive(Debug, Clone)]
pub enum GeneSource {
    Url(String),
    File(PathBuf),
}

impl GeneSource {
    /// Exactly one of the two CLI options; the URL wins when both are given
    pub fn from_options(url: Option<String>, file: Option<PathBuf>) -> Result<Self, GeneImportError> {
        match (url, file) {
            (Some(url), _) => Ok(GeneSource::Url(url)),
            (None, Some(file)) => Ok(GeneSource::File(file)),
            (None, None) => Err(GeneImportError::NoSource),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GeneImportSummary {
    pub created: usize,
    pub updated: usize,
    pub withdrawn: usize,
}

async fn fetch(source: &GeneSource) -> Result<String, GeneImportError> {
    match source {
        GeneSource::Url(url) => {
            info!(url = %url, "Downloading HGNC gene set");
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()?;
            let body = client.get(url).send().await?.error_for_status()?.text().await?;
            Ok(body)
        }
        GeneSource::File(path) => {
            info!(path = %path.display(), "Reading HGNC gene set");
            Ok(tokio::fs::read_to_string(path).await?)
        }
    }
}

/// Parse HGNC TSV text into genes plus the number of withdrawn entries skipped
pub fn parse_hgnc(content: &str) -> Result<(Vec<Gene>, usize), GeneImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(content.as_bytes());

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect();
    for required in ["hgnc_id", "symbol"] {
        if !columns.contains_key(required) {
            return Err(GeneImportError::MissingColumn(required));
        }
    }

    let mut genes_out = Vec::new();
    let mut withdrawn = 0;
    for record in reader.records() {
        let record = record?;
        let field = |name: &str| -> Option<String> {
            columns
                .get(name)
                .and_then(|&i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if field("status").as_deref() == Some(WITHDRAWN) {
            withdrawn += 1;
            continue;
        }
        let (Some(hgnc_id), Some(symbol)) = (field("hgnc_id"), field("symbol")) else {
            warn!(line = ?record.position().map(|p| p.line()), "HGNC row without id or symbol, skipping");
            continue;
        };

        genes_out.push(Gene {
            hgnc_id,
            symbol,
            name: field("name"),
            alias_symbol: field("alias_symbol"),
            alias_name: field("alias_name"),
            prev_symbol: field("prev_symbol"),
            prev_name: field("prev_name"),
            ensembl_gene_id: field("ensembl_gene_id"),
            entrez_id: field("entrez_id"),
            omim_id: field("omim_id"),
            location: field("location"),
            locus_type: field("locus_type"),
            locus_group: field("locus_group"),
            gene_family: field("gene_group").or_else(|| field("gene_family")),
            uniprot_ids: field("uniprot_ids"),
            pubmed_id: field("pubmed_id"),
            refseq_accession: field("refseq_accession"),
            ..Gene::default()
        });
    }
    Ok((genes_out, withdrawn))
}

/// Download or read the gene set and upsert it
pub async fn import_genes(pool: &SqlitePool, source: &GeneSource) -> Result<GeneImportSummary, GeneImportError> {
    let content = fetch(source).await?;
    let (parsed, withdrawn) = parse_hgnc(&content)?;

    let mut summary = GeneImportSummary {
        withdrawn,
        ..GeneImportSummary::default()
    };
    let mut tx = pool.begin().await?;
    for (n, gene) in parsed.iter().enumerate() {
        if genes::upsert_gene(&mut *tx, gene).await? {
            summary.created += 1;
        } else {
            summary.updated += 1;
        }
        if (n + 1) % PROGRESS_EVERY == 0 {
            info!(processed = n + 1, "Importing genes");
        }
    }
    tx.commit().await?;

    info!(
        created = summary.created,
        updated = summary.updated,
        withdrawn = summary.withdrawn,
        "Gene import finished"
    );
    Ok(summary)
}

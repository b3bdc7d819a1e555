//! Variant annotation and gene linking
//!
//! Each provider payload is stored as an `annotations` row keyed by
//! (variant, source, fetch date). Gene symbols are then read back out of all
//! stored payloads and matched against the HGNC gene catalog.

pub mod providers;
pub mod queue;

pub use providers::{GeneBeClient, MyVariantClient, VepClient};
pub use queue::AnnotationQueue;

use crate::db::{curation, genes, variants};
use async_trait::async_trait;
use rareindex_common::models::Variant;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Variant not found: {0}")]
    VariantNotFound(i64),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A source of variant annotation payloads
#[async_trait]
pub trait AnnotationProvider: Send + Sync {
    /// Value stored in `annotations.source`
    fn source(&self) -> &'static str;

    /// Fetch the payload for `variant`; `Ok(None)` when the provider does not
    /// cover this variant type
    async fn fetch(&self, variant: &Variant) -> Result<Option<Value>, AnnotationError>;
}

/// What one annotation pass produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationOutcome {
    /// Sources whose payload was stored
    pub stored: Vec<String>,
    /// Sources that failed (logged, not retried)
    pub failed: Vec<String>,
    pub genes_linked: usize,
}

/// Gene symbols mentioned in one stored payload
pub fn gene_symbols(source: &str, data: &Value) -> BTreeSet<String> {
    let mut symbols = BTreeSet::new();
    let mut push = |value: Option<&Value>| {
        if let Some(symbol) = value.and_then(Value::as_str).filter(|s| !s.is_empty()) {
            symbols.insert(symbol.to_string());
        }
    };

    match source {
        "vep" => {
            for item in data.as_array().into_iter().flatten() {
                let transcripts = item.get("transcript_consequences").and_then(Value::as_array);
                for transcript in transcripts.into_iter().flatten() {
                    push(transcript.get("gene_symbol"));
                }
            }
        }
        "myvariant" => match data.pointer("/clinvar/gene") {
            Some(Value::Array(entries)) => entries.iter().for_each(|g| push(g.get("symbol"))),
            Some(gene) => push(gene.get("symbol")),
            None => {}
        },
        "genebe" => {
            let entries = data.get("variants").and_then(Value::as_array);
            for entry in entries.into_iter().flatten() {
                push(entry.get("gene_symbol"));
            }
        }
        _ => {}
    }

    symbols
}

/// Fetches, stores and links annotations for stored variants
pub struct AnnotationService {
    pool: SqlitePool,
    providers: Vec<Arc<dyn AnnotationProvider>>,
}

impl AnnotationService {
    pub fn new(pool: SqlitePool, providers: Vec<Arc<dyn AnnotationProvider>>) -> Self {
        Self { pool, providers }
    }

    pub fn provider_sources(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.source()).collect()
    }

    /// Query every provider, store what came back, then relink genes
    ///
    /// Provider failures are logged and count as "no annotation"; only a
    /// missing variant or a storage failure is an error.
    pub async fn annotate(&self, variant_id: i64) -> Result<AnnotationOutcome, AnnotationError> {
        let variant = variants::load_variant(&self.pool, variant_id)
            .await?
            .ok_or(AnnotationError::VariantNotFound(variant_id))?;

        let mut outcome = AnnotationOutcome::default();
        let source_version = chrono::Utc::now().format("%Y-%m-%d").to_string();

        for provider in &self.providers {
            let source = provider.source();
            match provider.fetch(&variant).await {
                Ok(Some(data)) => {
                    curation::save_annotation(&self.pool, variant_id, source, &source_version, &data).await?;
                    debug!(variant_id, source, "Annotation stored");
                    outcome.stored.push(source.to_string());
                }
                Ok(None) => debug!(variant_id, source, "Provider does not cover this variant"),
                Err(e) => {
                    warn!(variant_id, source, error = %e, "Annotation fetch failed");
                    outcome.failed.push(source.to_string());
                }
            }
        }

        outcome.genes_linked = self.link_genes(variant_id).await?;
        Ok(outcome)
    }

    /// Attach catalog genes named in the variant's stored annotations
    ///
    /// Symbols with no catalog entry are ignored. Returns the number of
    /// distinct genes matched.
    pub async fn link_genes(&self, variant_id: i64) -> Result<usize, AnnotationError> {
        let mut symbols = BTreeSet::new();
        for annotation in curation::annotations_for(&self.pool, variant_id).await? {
            symbols.extend(gene_symbols(&annotation.source, &annotation.data.0));
        }

        let mut linked = 0;
        for symbol in &symbols {
            match genes::find_gene_by_symbol(&self.pool, symbol).await? {
                Some(gene) => {
                    genes::link_gene(&self.pool, variant_id, gene.id).await?;
                    linked += 1;
                }
                None => debug!(variant_id, %symbol, "Symbol not in gene catalog"),
            }
        }

        if linked > 0 {
            info!(variant_id, genes = linked, ?symbols, "Linked genes");
        }
        Ok(linked)
    }

    /// Re-run gene linking for every stored variant
    pub async fn link_all(&self) -> Result<usize, AnnotationError> {
        let ids = variants::all_variant_ids(&self.pool).await?;
        let total = ids.len();
        info!("Linking genes for {} variant(s)", total);

        for (i, variant_id) in ids.into_iter().enumerate() {
            self.link_genes(variant_id).await?;
            if (i + 1) % 100 == 0 {
                info!("Processed {}/{}", i + 1, total);
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vep_symbols_from_transcripts() {
        let data = json!([
            {"transcript_consequences": [{"gene_symbol": "BRCA1"}, {"gene_symbol": "NBR2"}, {"gene_id": "x"}]},
            {"most_severe_consequence": "intergenic_variant"}
        ]);
        let symbols: Vec<String> = gene_symbols("vep", &data).into_iter().collect();
        assert_eq!(symbols, vec!["BRCA1", "NBR2"]);
    }

    #[test]
    fn myvariant_symbol_object_or_list() {
        let single = json!({"clinvar": {"gene": {"symbol": "CFTR", "id": 1080}}});
        assert!(gene_symbols("myvariant", &single).contains("CFTR"));

        let many = json!({"clinvar": {"gene": [{"symbol": "A"}, {"symbol": "B"}]}});
        assert_eq!(gene_symbols("myvariant", &many).len(), 2);

        assert!(gene_symbols("myvariant", &json!({"cadd": {}})).is_empty());
    }

    #[test]
    fn genebe_and_unknown_sources() {
        let data = json!({"variants": [{"gene_symbol": "SCN1A"}]});
        assert!(gene_symbols("genebe", &data).contains("SCN1A"));
        assert!(gene_symbols("other", &data).is_empty());
    }
}

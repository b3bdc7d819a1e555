//! Annotation service and queue tests with in-process providers

mod helpers;

use async_trait::async_trait;
use helpers::{seed_chain, seed_snv, test_pool};
use rareindex_common::models::{Gene, Variant};
use rareindex_lab::db::{curation, genes};
use rareindex_lab::services::annotation::{AnnotationError, AnnotationProvider, AnnotationService};
use rareindex_lab::services::AnnotationQueue;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Returns a fixed payload for every variant
struct CannedProvider {
    source: &'static str,
    payload: Value,
}

#[async_trait]
impl AnnotationProvider for CannedProvider {
    fn source(&self) -> &'static str {
        self.source
    }

    async fn fetch(&self, _variant: &Variant) -> Result<Option<Value>, AnnotationError> {
        Ok(Some(self.payload.clone()))
    }
}

fn canned(source: &'static str, payload: Value) -> Arc<dyn AnnotationProvider> {
    Arc::new(CannedProvider { source, payload })
}

struct FailingProvider;

#[async_trait]
impl AnnotationProvider for FailingProvider {
    fn source(&self) -> &'static str {
        "genebe"
    }

    async fn fetch(&self, _variant: &Variant) -> Result<Option<Value>, AnnotationError> {
        Err(AnnotationError::Api(503, "Service Unavailable".to_string()))
    }
}

/// Covers nothing
struct SilentProvider;

#[async_trait]
impl AnnotationProvider for SilentProvider {
    fn source(&self) -> &'static str {
        "myvariant"
    }

    async fn fetch(&self, _variant: &Variant) -> Result<Option<Value>, AnnotationError> {
        Ok(None)
    }
}

fn vep_payload() -> Value {
    json!([{
        "input": "17 43045712 43045712 G/A 1",
        "most_severe_consequence": "stop_gained",
        "transcript_consequences": [
            {"gene_symbol": "BRCA1", "consequence_terms": ["stop_gained"]},
            {"gene_symbol": "NBR2", "consequence_terms": ["upstream_gene_variant"]}
        ]
    }])
}

async fn seed_gene(pool: &SqlitePool, hgnc_id: &str, symbol: &str) {
    let mut conn = pool.acquire().await.unwrap();
    genes::upsert_gene(
        &mut conn,
        &Gene {
            hgnc_id: hgnc_id.to_string(),
            symbol: symbol.to_string(),
            ..Gene::default()
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_annotate_stores_payloads_and_links_catalog_genes() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_ANN").await;
    let variant_id = seed_snv(&pool, &chain, "17", 43_045_712, "G", "A").await;
    seed_gene(&pool, "HGNC:1100", "BRCA1").await;

    let providers: Vec<Arc<dyn AnnotationProvider>> = vec![
        canned("vep", vep_payload()),
        Arc::new(SilentProvider) as Arc<dyn AnnotationProvider>,
        Arc::new(FailingProvider) as Arc<dyn AnnotationProvider>,
    ];
    let service = AnnotationService::new(pool.clone(), providers);

    let outcome = service.annotate(variant_id).await.unwrap();
    assert_eq!(outcome.stored, vec!["vep".to_string()]);
    assert_eq!(outcome.failed, vec!["genebe".to_string()]);
    // NBR2 is not in the catalog
    assert_eq!(outcome.genes_linked, 1);

    let annotations = curation::annotations_for(&pool, variant_id).await.unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].source, "vep");
    assert_eq!(annotations[0].source_version.len(), "2024-01-01".len());

    let linked = genes::genes_for_variant(&pool, variant_id).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].symbol, "BRCA1");
}

#[tokio::test]
async fn test_reannotation_same_day_replaces_payload() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_ANN2").await;
    let variant_id = seed_snv(&pool, &chain, "7", 117_559_590, "G", "T").await;

    let first = AnnotationService::new(
        pool.clone(),
        vec![canned("myvariant", json!({"clinvar": {"gene": {"symbol": "CFTR"}}}))],
    );
    first.annotate(variant_id).await.unwrap();

    let second = AnnotationService::new(
        pool.clone(),
        vec![canned("myvariant", json!({"clinvar": {"gene": [{"symbol": "CFTR"}, {"symbol": "CTTNBP2"}]}}))],
    );
    second.annotate(variant_id).await.unwrap();

    let annotations = curation::annotations_for(&pool, variant_id).await.unwrap();
    assert_eq!(annotations.len(), 1);
    assert!(annotations[0].data.0["clinvar"]["gene"].is_array());
}

#[tokio::test]
async fn test_missing_variant_is_an_error() {
    let pool = test_pool().await;
    let service = AnnotationService::new(pool, Vec::new());
    let result = service.annotate(404).await;
    assert!(matches!(result, Err(AnnotationError::VariantNotFound(404))));
}

#[tokio::test]
async fn test_link_all_after_catalog_import() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_ANN3").await;
    let variant_id = seed_snv(&pool, &chain, "17", 43_045_712, "G", "A").await;

    // Annotation arrives before the gene catalog
    let service = AnnotationService::new(
        pool.clone(),
        vec![canned("vep", vep_payload())],
    );
    assert_eq!(service.annotate(variant_id).await.unwrap().genes_linked, 0);

    seed_gene(&pool, "HGNC:1100", "BRCA1").await;
    seed_gene(&pool, "HGNC:20691", "NBR2").await;
    let relinker = AnnotationService::new(pool.clone(), Vec::new());
    assert_eq!(relinker.link_all().await.unwrap(), 1);
    assert_eq!(genes::genes_for_variant(&pool, variant_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_queue_worker_drains_before_exit() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_QUEUE").await;
    let first = seed_snv(&pool, &chain, "1", 100, "A", "C").await;
    let second = seed_snv(&pool, &chain, "1", 200, "T", "G").await;

    let service = Arc::new(AnnotationService::new(
        pool.clone(),
        vec![canned("vep", vep_payload())],
    ));
    let (queue, worker) = AnnotationQueue::start(service, 8);
    assert!(queue.enqueue(first));
    assert!(queue.enqueue(second));
    drop(queue);
    worker.await.unwrap();

    assert_eq!(curation::annotations_for(&pool, first).await.unwrap().len(), 1);
    assert_eq!(curation::annotations_for(&pool, second).await.unwrap().len(), 1);
}

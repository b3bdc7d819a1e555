//! Shared fixtures for rareindex-lab integration tests
#![allow(dead_code)]

use rareindex_common::db::initialize_schema;
use rareindex_common::models::{NewVariant, VariantDetail, VariantLocus, Zygosity};
use rareindex_lab::db::families::create_family;
use rareindex_lab::db::hierarchy::{self, StepFields};
use rareindex_lab::db::individuals::{create_individual, NewIndividual};
use rareindex_lab::db::lookups::{self, NamedTable};
use rareindex_lab::db::users::ensure_fallback_user;
use rareindex_lab::db::variants::insert_variant;
use rareindex_lab::services::preview::{DocumentConverter, PreviewError, PreviewService};
use rareindex_lab::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory database with the full schema
///
/// One connection that never expires: every new in-memory connection would
/// be a separate, empty database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    initialize_schema(&pool).await.expect("schema");
    pool
}

/// Converter that returns canned HTML and counts its calls
#[derive(Default)]
pub struct FakeConverter {
    pub calls: AtomicUsize,
}

impl FakeConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentConverter for FakeConverter {
    fn to_html(&self, _source: &Path) -> Result<String, PreviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("<h1>Clinical report</h1><p>Heterozygous pathogenic variant in <b>BRCA1</b>.</p>\
            <ul><li>ACMG: PVS1</li><li>ACMG: PM2</li></ul>"
            .to_string())
    }
}

/// Ids of a one-individual family with a full sample -> analysis chain
#[derive(Debug, Clone, Copy)]
pub struct Chain {
    pub user_id: i64,
    pub family_id: i64,
    pub individual_id: i64,
    pub sample_id: i64,
    pub test_id: i64,
    pub pipeline_id: i64,
    pub analysis_id: i64,
}

pub async fn seed_chain(pool: &SqlitePool, family_code: &str) -> Chain {
    let user = ensure_fallback_user(pool, None).await.unwrap();
    let user_id = Some(user.id);
    let mut conn = pool.acquire().await.unwrap();

    let family_id = create_family(&mut conn, family_code, None, user_id).await.unwrap();
    let individual_id = create_individual(
        &mut conn,
        &NewIndividual {
            family_id,
            lab_id: Some(format!("{}.1", family_code)),
            full_name: format!("Proband {}", family_code),
            is_index: true,
            created_by: user_id,
            ..NewIndividual::default()
        },
    )
    .await
    .unwrap();

    let steps = StepFields {
        user_id,
        created_by: user_id,
        ..StepFields::default()
    };
    let sample_id = hierarchy::create_sample(&mut conn, individual_id, steps).await.unwrap();
    let test_id = hierarchy::create_test(&mut conn, sample_id, steps).await.unwrap();
    let pipeline_type = lookups::get_or_create_pipeline_type(&mut conn, "rarepipe", Some("1.0"), user_id)
        .await
        .unwrap();
    let pipeline_id = hierarchy::create_pipeline(&mut conn, test_id, pipeline_type, steps).await.unwrap();
    let initial = lookups::get_or_create_named(&mut conn, NamedTable::AnalysisType, "Initial", user_id)
        .await
        .unwrap();
    let analysis_id = hierarchy::create_analysis(
        &mut conn,
        pipeline_id,
        StepFields {
            type_id: Some(initial),
            ..steps
        },
    )
    .await
    .unwrap();

    Chain {
        user_id: user.id,
        family_id,
        individual_id,
        sample_id,
        test_id,
        pipeline_id,
        analysis_id,
    }
}

/// SNV on the chain's analysis
pub async fn seed_snv(pool: &SqlitePool, chain: &Chain, chromosome: &str, pos: i64, reference: &str, alternate: &str) -> i64 {
    let mut conn = pool.acquire().await.unwrap();
    insert_variant(
        &mut conn,
        &NewVariant {
            individual_id: chain.individual_id,
            pipeline_id: Some(chain.pipeline_id),
            analysis_id: Some(chain.analysis_id),
            status_id: None,
            locus: VariantLocus::new(chromosome, pos, pos).with_zygosity(Zygosity::Het),
            notes: None,
            created_by: Some(chain.user_id),
            detail: VariantDetail::Snv {
                reference: reference.to_string(),
                alternate: alternate.to_string(),
            },
        },
    )
    .await
    .unwrap()
}

/// App state over `pool` with a fake converter and no annotation queue
pub fn test_state(pool: SqlitePool, media_dir: &Path, default_user_id: i64) -> (AppState, Arc<FakeConverter>) {
    let converter = Arc::new(FakeConverter::default());
    let previews = Arc::new(PreviewService::new(pool.clone(), media_dir.to_path_buf(), converter.clone()));
    let state = AppState::new(pool, previews, default_user_id);
    (state, converter)
}

//! Management service tests: generator, trio, genes, accounts, diagnostics

mod helpers;

use helpers::{seed_chain, test_pool};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rareindex_common::models::{AcmgClassification, Inheritance, NoteTarget};
use rareindex_common::password::verify_password;
use rareindex_lab::db::families::find_family_by_code;
use rareindex_lab::db::hierarchy::{self, StepFields};
use rareindex_lab::db::individuals::{self, find_by_lab_id};
use rareindex_lab::db::users::{find_user_by_username, group_names_for_user};
use rareindex_lab::db::{curation, genes, lookups, notes, variants};
use rareindex_lab::services::accounts::{self, GROUPS};
use rareindex_lab::services::diagnostics::diagnostic_yield;
use rareindex_lab::services::genes::{import_genes, GeneSource};
use rareindex_lab::services::sample_data::{generate_sample_data, SampleDataOptions};
use rareindex_lab::services::trio::{create_trio_example, TRIO_FAMILY_ID};
use std::fs;

async fn count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_generator_builds_full_trees() {
    let pool = test_pool().await;
    let options = SampleDataOptions {
        families: 2,
        samples_per_individual: 1,
        tests_per_sample: 2,
        pipelines_per_test: 1,
        analyses_per_pipeline: 1,
        variants_per_analysis: 2,
        created_by: None,
    };
    let mut rng = StdRng::seed_from_u64(7);

    let summary = generate_sample_data(&pool, &options, &mut rng).await.unwrap();

    // First family has two probands, the second one
    assert_eq!(summary.families, 2);
    assert_eq!(summary.individuals, 7);
    assert_eq!(summary.samples, 7);
    assert_eq!(summary.tests, 14);
    assert_eq!(summary.pipelines, 14);
    assert_eq!(summary.analyses, 14);
    assert_eq!(summary.variants, 28);
    assert_eq!(variants::count_variants(&pool).await.unwrap(), 28);
    assert_eq!(count(&pool, "cross_identifiers").await, 14);

    let proband = find_by_lab_id(&pool, "RB_2025_01.1.2").await.unwrap().unwrap();
    let mother = find_by_lab_id(&pool, "RB_2025_01.2").await.unwrap().unwrap();
    assert_eq!(proband.mother_id, Some(mother.id));
    assert!(proband.is_index && proband.is_affected);
    assert!(find_by_lab_id(&pool, "RB_2025_02.1").await.unwrap().is_some());

    let terms = individuals::hpo_terms_for(&pool, proband.id).await.unwrap();
    assert!((5..=20).contains(&terms.len()));
    let ids = individuals::cross_identifiers_for(&pool, proband.id).await.unwrap();
    assert!(ids.iter().any(|i| i.id_value == "RD3.F01.1.2"));
}

#[tokio::test]
async fn test_generator_skips_existing_families() {
    let pool = test_pool().await;
    let options = SampleDataOptions {
        families: 1,
        samples_per_individual: 1,
        tests_per_sample: 1,
        pipelines_per_test: 1,
        analyses_per_pipeline: 1,
        variants_per_analysis: 1,
        created_by: None,
    };
    let mut rng = StdRng::seed_from_u64(1);
    generate_sample_data(&pool, &options, &mut rng).await.unwrap();

    let again = SampleDataOptions { families: 2, ..options };
    let summary = generate_sample_data(&pool, &again, &mut rng).await.unwrap();
    assert_eq!(summary.families, 1);
    assert_eq!(summary.individuals, 3);
    assert_eq!(count(&pool, "families").await, 2);
}

#[tokio::test]
async fn test_trio_example_is_recreated() {
    let pool = test_pool().await;
    let chain = seed_chain(&pool, "FAM_OTHER").await;
    let media = tempfile::tempdir().unwrap();

    let first = create_trio_example(&pool, media.path(), chain.user_id).await.unwrap();
    assert!(!first.recreated);
    let report = media.path().join("reports/FAM_TRIO_EXAMPLE_001_proband_report.pdf");
    assert!(fs::read(&report).unwrap().starts_with(b"%PDF"));

    let variant = variants::load_variant(&pool, first.variant_id).await.unwrap().unwrap();
    assert_eq!(variant.chromosome, "chr1");
    assert_eq!(variant.alleles(), Some(("A", "G")));
    let classifications = curation::classifications_for(&pool, first.variant_id).await.unwrap();
    assert_eq!(classifications[0].classification, "pathogenic");
    assert_eq!(classifications[0].inheritance, "de_novo");

    let members = individuals::list_by_family(&pool, first.family_id).await.unwrap();
    assert_eq!(members.len(), 3);

    // Marks only the first copy; rowids may be reused by the recreated one
    sqlx::query("UPDATE families SET description = 'stale copy' WHERE id = ?")
        .bind(first.family_id)
        .execute(&pool)
        .await
        .unwrap();
    {
        let mut conn = pool.acquire().await.unwrap();
        curation::insert_classification(
            &mut conn,
            first.variant_id,
            Some(chain.user_id),
            AcmgClassification::Vus,
            Inheritance::Unknown,
            Some("superseded"),
        )
        .await
        .unwrap();
        notes::create_note(&mut *conn, NoteTarget::Individual, members[0].id, "stale note", None)
            .await
            .unwrap();
        notes::create_note(&mut *conn, NoteTarget::Family, first.family_id, "stale family note", None)
            .await
            .unwrap();
    }
    let individuals_before = count(&pool, "individuals").await;
    let variants_before = count(&pool, "variants").await;

    let second = create_trio_example(&pool, media.path(), chain.user_id).await.unwrap();
    assert!(second.recreated);
    assert_eq!(count(&pool, "families").await, 2);
    assert_eq!(count(&pool, "individuals").await, individuals_before);
    assert_eq!(count(&pool, "variants").await, variants_before);
    assert_eq!(count(&pool, "classifications").await, 1);
    assert_eq!(count(&pool, "analysis_reports").await, 1);
    assert_eq!(count(&pool, "notes").await, 0);

    let trio = find_family_by_code(&pool, TRIO_FAMILY_ID).await.unwrap().unwrap();
    assert_eq!(trio.id, second.family_id);
    assert_ne!(trio.description.as_deref(), Some("stale copy"));
    let classifications = curation::classifications_for(&pool, second.variant_id).await.unwrap();
    assert_eq!(classifications.len(), 1);
    assert_eq!(classifications[0].classification, "pathogenic");
    // Unrelated data survives
    assert!(find_family_by_code(&pool, "FAM_OTHER").await.unwrap().is_some());
}

#[tokio::test]
async fn test_gene_import_from_file_upserts() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hgnc_complete_set.txt");
    fs::write(
        &path,
        "hgnc_id\tsymbol\tname\tstatus\tlocation\tgene_group\n\
         HGNC:1100\tBRCA1\tBRCA1 DNA repair associated\tApproved\t17q21.31\tRING finger proteins\n\
         HGNC:1101\tBRCA2\tBRCA2 DNA repair associated\tApproved\t13q13.1\t\n\
         HGNC:2\tA12M1\twithdrawn\tEntry Withdrawn\t\t\n",
    )
    .unwrap();
    let source = GeneSource::File(path.clone());

    let first = import_genes(&pool, &source).await.unwrap();
    assert_eq!((first.created, first.updated, first.withdrawn), (2, 0, 1));

    let second = import_genes(&pool, &source).await.unwrap();
    assert_eq!((second.created, second.updated), (0, 2));
    assert_eq!(genes::count_genes(&pool).await.unwrap(), 2);

    let brca1 = genes::find_gene_by_symbol(&pool, "BRCA1").await.unwrap().unwrap();
    assert_eq!(brca1.gene_family.as_deref(), Some("RING finger proteins"));
    assert_eq!(brca1.location.as_deref(), Some("17q21.31"));
}

#[tokio::test]
async fn test_missing_gene_file_is_an_error() {
    let pool = test_pool().await;
    let source = GeneSource::File("/nonexistent/hgnc.txt".into());
    assert!(import_genes(&pool, &source).await.is_err());
}

#[tokio::test]
async fn test_seed_accounts_are_idempotent() {
    let pool = test_pool().await;

    assert_eq!(accounts::create_groups(&pool).await.unwrap(), GROUPS.len());
    assert_eq!(accounts::create_groups(&pool).await.unwrap(), 0);

    let created = accounts::create_seed_users(&pool).await.unwrap();
    assert_eq!(created.len(), 5);
    assert!(accounts::create_seed_users(&pool).await.unwrap().is_empty());

    let pleb = find_user_by_username(&pool, "pleb").await.unwrap().unwrap();
    assert!(!pleb.is_superuser);
    let (hash, salt): (String, String) =
        sqlx::query_as("SELECT password_hash, password_salt FROM users WHERE id = ?")
            .bind(pleb.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(verify_password("pleb", &salt, &hash));
    assert_eq!(group_names_for_user(&pool, pleb.id).await.unwrap(), vec!["Pleb".to_string()]);

    let gennext = find_user_by_username(&pool, "gennext").await.unwrap().unwrap();
    assert!(gennext.is_superuser);
}

#[tokio::test]
async fn test_diagnostic_yield_by_pipeline_type() {
    let pool = test_pool().await;
    assert_eq!(diagnostic_yield(&pool, None).await.unwrap().yield_percentage, 0.0);

    let chain = seed_chain(&pool, "FAM_YIELD").await;
    {
        let mut conn = pool.acquire().await.unwrap();
        let plp = lookups::get_or_create_status(&mut conn, "Solved - P/LP", Some("Pipeline"), "green", None)
            .await
            .unwrap();
        let vus = lookups::get_or_create_status(&mut conn, "Solved - VUS", Some("Pipeline"), "yellow", None)
            .await
            .unwrap();
        let rarepipe = lookups::get_or_create_pipeline_type(&mut conn, "rarepipe", Some("1.0"), None)
            .await
            .unwrap();
        for status in [plp, vus] {
            hierarchy::create_pipeline(
                &mut conn,
                chain.test_id,
                rarepipe,
                StepFields { status_id: Some(status), ..StepFields::default() },
            )
            .await
            .unwrap();
        }
    }

    let all = diagnostic_yield(&pool, None).await.unwrap();
    assert_eq!((all.total, all.solved), (3, 2));
    assert_eq!(all.yield_percentage, 66.67);

    let none = diagnostic_yield(&pool, Some("sarek")).await.unwrap();
    assert_eq!((none.total, none.solved), (0, 0));
}

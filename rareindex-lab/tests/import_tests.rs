//! TSV import integration tests

mod helpers;

use helpers::test_pool;
use chrono::NaiveDate;
use rareindex_common::db::ModelApp;
use rareindex_common::models::NoteTarget;
use rareindex_lab::db::individuals::find_by_lab_id;
use rareindex_lab::db::notes::notes_for;
use rareindex_lab::db::users::ensure_fallback_user;
use rareindex_lab::import::{ImportError, ImportOptions, Importer};
use std::fs;
use std::path::Path;

fn write(dir: &Path, name: &str, lines: &[&str]) {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(dir.join(name), content).unwrap();
}

async fn count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_parents_listed_after_child_are_linked() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id\tdescription", "RB_2024_01\tConsanguineous trio"]);
    write(
        dir.path(),
        "Individual.tsv",
        &[
            "lab_id\tfull_name\tfamily\tsex\tis_index\tis_affected\tmother\tfather",
            "RB_2024_01.1\tAyse Demir\tRB_2024_01\tfemale\tyes\tyes\tRB_2024_01.2\tRB_2024_01.3",
            "RB_2024_01.2\tFatma Demir\tRB_2024_01\tfemale\tno\tno\t\t",
            "RB_2024_01.3\tMehmet Demir\tRB_2024_01\tmale\tno\tno\t\t",
        ],
    );

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();

    let family = summary.file("Family").unwrap();
    assert_eq!(family.created, 1);
    let individuals = summary.file("Individual").unwrap();
    assert_eq!(individuals.created, 3);
    assert_eq!(individuals.deferred_resolved, 2);
    assert_eq!(individuals.deferred_unresolved, 0);
    assert!(!individuals.rolled_back);

    let child = find_by_lab_id(&pool, "RB_2024_01.1").await.unwrap().unwrap();
    let mother = find_by_lab_id(&pool, "RB_2024_01.2").await.unwrap().unwrap();
    let father = find_by_lab_id(&pool, "RB_2024_01.3").await.unwrap().unwrap();
    assert_eq!(child.mother_id, Some(mother.id));
    assert_eq!(child.father_id, Some(father.id));
    assert!(child.is_index);
    assert_eq!(child.family_id, mother.family_id);
}

#[tokio::test]
async fn test_unresolved_self_reference_is_left_empty() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_02"]);
    write(
        dir.path(),
        "Individual.tsv",
        &["lab_id\tfull_name\tfamily\tmother", "RB_2024_02.1\tCan Yilmaz\tRB_2024_02\tRB_2024_02.9"],
    );

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();

    let individuals = summary.file("Individual").unwrap();
    assert_eq!(individuals.created, 1);
    assert_eq!(individuals.deferred_unresolved, 1);
    let child = find_by_lab_id(&pool, "RB_2024_02.1").await.unwrap().unwrap();
    assert_eq!(child.mother_id, None);
}

#[tokio::test]
async fn test_row_with_unknown_family_is_skipped() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_03"]);
    write(
        dir.path(),
        "Individual.tsv",
        &[
            "lab_id\tfull_name\tfamily",
            "RB_2024_03.1\tElif Kaya\tRB_2024_03",
            "RB_2099_99.1\tNobody\tRB_2099_99",
            "RB_2024_03.2\t\tRB_2024_03",
        ],
    );

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();

    let individuals = summary.file("Individual").unwrap();
    assert_eq!(individuals.created, 1);
    assert_eq!(individuals.skipped, 2);
    assert_eq!(count(&pool, "individuals").await, 1);
}

#[tokio::test]
async fn test_database_error_rolls_back_whole_file() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_04", "RB_2024_05", "RB_2024_04"]);

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();

    let family = summary.file("Family").unwrap();
    assert!(family.rolled_back);
    assert_eq!(family.created, 0);
    assert!(family.error.is_some());
    assert_eq!(summary.rolled_back_files(), 1);
    assert_eq!(count(&pool, "families").await, 0);
}

#[tokio::test]
async fn test_app_filter_limits_models() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_06"]);

    let options = ImportOptions {
        app: Some(ModelApp::Variant),
        ..ImportOptions::new(dir.path())
    };
    let summary = Importer::new(pool.clone()).run(&options).await.unwrap();

    assert!(summary.file("Family").is_none());
    assert_eq!(count(&pool, "families").await, 0);
}

#[tokio::test]
async fn test_missing_directory_and_unknown_user() {
    let pool = test_pool().await;
    let missing = Importer::new(pool.clone())
        .run(&ImportOptions::new("/nonexistent/rareindex/import"))
        .await;
    assert!(matches!(missing, Err(ImportError::DirectoryNotFound(_))));

    let dir = tempfile::tempdir().unwrap();
    let options = ImportOptions {
        user: Some("ghost".to_string()),
        ..ImportOptions::new(dir.path())
    };
    assert!(Importer::new(pool).run(&options).await.is_err());
}

#[tokio::test]
async fn test_audit_fields_default_to_fallback_user() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_10"]);
    write(
        dir.path(),
        "Individual.tsv",
        &["lab_id\tfull_name\tfamily", "RB_2024_10.1\tZeynep Arslan\tRB_2024_10"],
    );
    write(dir.path(), "Sample.tsv", &["individual\treceipt_date", "RB_2024_10.1\t02.05.2024"]);
    write(dir.path(), "Test.tsv", &["sample\tperformed_date", "1\t03/06/2024"]);

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();
    assert_eq!(summary.total_created(), 4);
    assert_eq!(summary.total_skipped(), 0);

    let admin = ensure_fallback_user(&pool, None).await.unwrap();
    let individual = find_by_lab_id(&pool, "RB_2024_10.1").await.unwrap().unwrap();
    assert_eq!(individual.created_by, Some(admin.id));

    let (isolation_by, created_by, receipt_date): (Option<i64>, Option<i64>, Option<String>) =
        sqlx::query_as("SELECT isolation_by, created_by, receipt_date FROM samples")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(isolation_by, Some(admin.id));
    assert_eq!(created_by, Some(admin.id));
    assert_eq!(receipt_date.as_deref(), Some("2024-05-02"));

    let (performed_by, performed_date): (Option<i64>, Option<String>) =
        sqlx::query_as("SELECT performed_by, performed_date FROM tests")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(performed_by, Some(admin.id));
    assert_eq!(performed_date.as_deref(), Some("2024-06-03"));
}

#[tokio::test]
async fn test_variant_chromosomes_are_prefixed() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_11"]);
    write(
        dir.path(),
        "Individual.tsv",
        &["lab_id\tfull_name\tfamily", "RB_2024_11.1\tEmre Ozturk\tRB_2024_11"],
    );
    write(
        dir.path(),
        "Variant.tsv",
        &[
            "individual\tchromosome\tstart\tend\tzygosity",
            "RB_2024_11.1\t7\t117559590\t117559590\thet",
            "RB_2024_11.1\tchrX\t31496081\t31496081\themi",
        ],
    );

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();
    assert_eq!(summary.file("Variant").unwrap().created, 2);

    let rows: Vec<(String, Option<i64>)> =
        sqlx::query_as("SELECT chromosome, created_by FROM variants ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    let admin = ensure_fallback_user(&pool, None).await.unwrap();
    assert_eq!(
        rows,
        vec![("chr7".to_string(), Some(admin.id)), ("chrX".to_string(), Some(admin.id))]
    );
}

#[tokio::test]
async fn test_unparseable_date_drops_only_that_field() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_12"]);
    write(
        dir.path(),
        "Individual.tsv",
        &[
            "lab_id\tfull_name\tfamily\tbirth_date\tdiagnosis_date\tdiagnosis",
            "RB_2024_12.1\tDeniz Sahin\tRB_2024_12\t14.02.2016\tlast spring\tDravet syndrome",
        ],
    );

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();
    let individuals = summary.file("Individual").unwrap();
    assert_eq!(individuals.created, 1);
    assert_eq!(individuals.skipped, 0);

    let individual = find_by_lab_id(&pool, "RB_2024_12.1").await.unwrap().unwrap();
    assert_eq!(individual.birth_date, NaiveDate::from_ymd_opt(2016, 2, 14));
    assert_eq!(individual.diagnosis_date, None);
    assert_eq!(individual.diagnosis.as_deref(), Some("Dravet syndrome"));
}

#[tokio::test]
async fn test_note_columns_become_one_individual_note() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_13"]);
    write(
        dir.path(),
        "Individual.tsv",
        &[
            "lab_id\tfull_name\tfamily\tfollow_up_notes\tgeneral_notes",
            "RB_2024_13.1\tSelin Koc\tRB_2024_13\tKontrol 6 ay sonra\tEEG normal",
            "RB_2024_13.2\tBurak Koc\tRB_2024_13\t\t",
        ],
    );

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();
    let individuals = summary.file("Individual").unwrap();
    assert_eq!(individuals.created, 2);
    assert_eq!(individuals.notes, 1);

    let admin = ensure_fallback_user(&pool, None).await.unwrap();
    let first = find_by_lab_id(&pool, "RB_2024_13.1").await.unwrap().unwrap();
    let notes = notes_for(&pool, NoteTarget::Individual, first.id).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "Kontrol 6 ay sonra\n\nEEG normal");
    assert_eq!(notes[0].created_by, Some(admin.id));

    let second = find_by_lab_id(&pool, "RB_2024_13.2").await.unwrap().unwrap();
    assert!(notes_for(&pool, NoteTarget::Individual, second.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_note_file_accepts_model_or_table_names() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Family.tsv", &["family_id", "RB_2024_14"]);
    write(
        dir.path(),
        "Individual.tsv",
        &["lab_id\tfull_name\tfamily", "RB_2024_14.1\tOmer Celik\tRB_2024_14"],
    );
    write(
        dir.path(),
        "Note.tsv",
        &[
            "content\tcontent_type\tobject_id",
            "Aile onami alindi\tIndividual\t1",
            "Segregasyon bekleniyor\tindividuals\t1",
            "Katalog notu\tGene\t1",
        ],
    );

    let summary = Importer::new(pool.clone())
        .run(&ImportOptions::new(dir.path()))
        .await
        .unwrap();
    let notes_file = summary.file("Note").unwrap();
    assert_eq!(notes_file.created, 2);
    assert_eq!(notes_file.skipped, 1);

    let individual = find_by_lab_id(&pool, "RB_2024_14.1").await.unwrap().unwrap();
    let notes = notes_for(&pool, NoteTarget::Individual, individual.id).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| n.content_type == "individuals"));
}

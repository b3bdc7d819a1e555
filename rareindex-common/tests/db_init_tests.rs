//! Database initialization against a real on-disk SQLite file

use rareindex_common::db::{init_database, model_registry, SchemaIntrospector};
use tempfile::TempDir;

#[tokio::test]
async fn creates_every_registry_table() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("rareindex.db")).await.unwrap();

    for schema in model_registry().schemas() {
        assert!(
            SchemaIntrospector::table_exists(&pool, schema.table).await.unwrap(),
            "missing table {}",
            schema.table
        );
    }
}

#[tokio::test]
async fn reopening_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("rareindex.db");

    let pool = init_database(&path).await.unwrap();
    sqlx::query("INSERT INTO families (family_id) VALUES ('RB_2025_01')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM families")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn foreign_keys_are_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("rareindex.db")).await.unwrap();

    let result = sqlx::query("INSERT INTO individuals (family_id, full_name) VALUES (999, 'Nobody')")
        .execute(&pool)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn annotation_triple_is_unique() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("rareindex.db")).await.unwrap();

    sqlx::query("INSERT INTO families (id, family_id) VALUES (1, 'F1')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO individuals (id, family_id, full_name) VALUES (1, 1, 'Proband')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        r#"INSERT INTO variants (id, individual_id, chromosome, start, "end") VALUES (1, 1, 'chr1', 10, 10)"#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let insert = r#"INSERT INTO annotations (variant_id, source, source_version, data) VALUES (1, 'vep', '2025-01-01', '{}')"#;
    sqlx::query(insert).execute(&pool).await.unwrap();
    assert!(sqlx::query(insert).execute(&pool).await.is_err());
}

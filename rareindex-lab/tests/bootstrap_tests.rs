//! Startup environment tests (root folder, media directory, database file)

use rareindex_common::config::{RareIndexConfig, ROOT_ENV_VAR};
use rareindex_lab::bootstrap::Environment;
use rareindex_lab::db::users::ensure_fallback_user;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_open_creates_layout_under_cli_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("lims");

    let env = Environment::open(RareIndexConfig::default(), Some(&root)).await.unwrap();

    assert_eq!(env.root_folder, root);
    assert_eq!(env.media_dir, root.join("media"));
    assert!(env.media_dir.is_dir());
    assert!(root.join("rareindex.db").is_file());

    // Schema is in place and the fallback account can be created
    let admin = ensure_fallback_user(&env.pool, None).await.unwrap();
    assert_eq!(admin.username, "admin");
    env.pool.close().await;
}

#[tokio::test]
#[serial]
async fn test_env_var_root_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(ROOT_ENV_VAR, dir.path());

    let env = Environment::open(RareIndexConfig::default(), None).await.unwrap();
    assert_eq!(env.root_folder, dir.path());
    let first = ensure_fallback_user(&env.pool, None).await.unwrap();
    env.pool.close().await;

    // Reopening keeps existing rows
    let env = Environment::open(RareIndexConfig::default(), None).await.unwrap();
    let again = ensure_fallback_user(&env.pool, None).await.unwrap();
    assert_eq!(first.id, again.id);
    env.pool.close().await;

    std::env::remove_var(ROOT_ENV_VAR);
}

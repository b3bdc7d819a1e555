//! Role groups and seed accounts

use crate::db::users::{self, NewUser};
use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Role groups, in creation order
pub const GROUPS: [&str; 7] = [
    "RareIndex Admin",
    "RareIndex User",
    "RareIndex User(Sensitive Data)",
    "RareIndex Lab",
    "Collaborator",
    "Pleb",
    "Gennext",
];

struct SeedAccount {
    username: &'static str,
    superuser: bool,
    group: &'static str,
}

const SEED_ACCOUNTS: [SeedAccount; 5] = [
    SeedAccount { username: "admin", superuser: true, group: "RareIndex Admin" },
    SeedAccount { username: "pleb", superuser: false, group: "Pleb" },
    SeedAccount { username: "staff", superuser: false, group: "RareIndex User" },
    SeedAccount { username: "gennext", superuser: true, group: "Gennext" },
    SeedAccount { username: "collaborator", superuser: false, group: "Collaborator" },
];

/// Create any missing role group; returns how many were created
pub async fn create_groups(pool: &SqlitePool) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut created = 0;
    for name in GROUPS {
        let (_, new) = users::ensure_group(&mut *tx, name).await?;
        if new {
            info!(group = name, "Created group");
            created += 1;
        }
    }
    tx.commit().await?;
    Ok(created)
}

/// Groups, then the seed accounts that do not exist yet
///
/// Each account's initial password is its username.
pub async fn create_seed_users(pool: &SqlitePool) -> Result<Vec<String>> {
    create_groups(pool).await?;

    let mut tx = pool.begin().await?;
    let mut created = Vec::new();
    for seed in &SEED_ACCOUNTS {
        if users::find_user_by_username(&mut *tx, seed.username).await?.is_some() {
            continue;
        }

        let user = NewUser {
            is_superuser: seed.superuser,
            is_staff: true,
            password: Some(seed.username.to_string()),
            ..NewUser::new(seed.username)
        };
        let user_id = users::create_user(&mut *tx, &user).await?;
        let (group_id, _) = users::ensure_group(&mut *tx, seed.group).await?;
        users::add_user_to_group(&mut *tx, user_id, group_id).await?;

        info!(username = seed.username, group = seed.group, "Created user");
        created.push(seed.username.to_string());
    }
    tx.commit().await?;
    Ok(created)
}

//! Accounts and groups

use anyhow::{anyhow, Result};
use rareindex_common::models::User;
use rareindex_common::password::{generate_salt, hash_password};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::info;

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, is_superuser, is_staff, is_active";

/// Account to be created
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: bool,
    pub is_staff: bool,
    /// Plain password, hashed with a fresh salt before storage
    pub password: Option<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }
}

pub async fn get_user<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn find_user_by_username<'e>(db: impl SqliteExecutor<'e>, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn first_superuser<'e>(db: impl SqliteExecutor<'e>) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE is_superuser = 1 ORDER BY id LIMIT 1",
        USER_COLUMNS
    ))
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn create_user(conn: &mut SqliteConnection, user: &NewUser) -> Result<i64> {
    let (hash, salt) = match &user.password {
        Some(password) => {
            let salt = generate_salt();
            (Some(hash_password(password, &salt)), Some(salt))
        }
        None => (None, None),
    };

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, email, first_name, last_name, is_superuser, is_staff,
                           password_hash, password_salt)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.is_superuser)
    .bind(user.is_staff)
    .bind(hash)
    .bind(salt)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Get or create a group by name
pub async fn ensure_group(conn: &mut SqliteConnection, name: &str) -> Result<(i64, bool)> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM groups WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok((id, false));
    }

    let id: i64 = sqlx::query_scalar("INSERT INTO groups (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok((id, true))
}

pub async fn add_user_to_group<'e>(db: impl SqliteExecutor<'e>, user_id: i64, group_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(group_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn group_names_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>> {
    let names = sqlx::query_scalar(
        r#"
        SELECT g.name FROM groups g
        JOIN user_groups ug ON ug.group_id = g.id
        WHERE ug.user_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(names)
}

/// Resolve the acting user for writes that carry no explicit user
///
/// With a username, that account must exist. Without one, the first
/// superuser is used, and an `admin` superuser is created if there is none.
pub async fn ensure_fallback_user(pool: &SqlitePool, username: Option<&str>) -> Result<User> {
    if let Some(name) = username {
        return find_user_by_username(pool, name)
            .await?
            .ok_or_else(|| anyhow!("User '{}' does not exist", name));
    }

    if let Some(user) = first_superuser(pool).await? {
        return Ok(user);
    }

    let mut conn = pool.acquire().await?;
    if let Some(existing) = find_user_by_username(&mut *conn, "admin").await? {
        return Ok(existing);
    }

    let mut admin = NewUser::new("admin");
    admin.is_superuser = true;
    admin.is_staff = true;
    let id = create_user(&mut conn, &admin).await?;
    info!(user_id = id, "Created fallback superuser 'admin'");

    get_user(&mut *conn, id)
        .await?
        .ok_or_else(|| anyhow!("admin user vanished after insert"))
}

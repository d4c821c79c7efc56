/// User accounts
///
/// Accounts are created, edited and deleted by administrators. Each account
/// carries exactly one [`Role`]; there is no role hierarchy.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('admin', 'user');
///
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username VARCHAR(50) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash TEXT NOT NULL,
///     role user_role NOT NULL DEFAULT 'user',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::models::user::{CreateUser, Role, User};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     username: "alice".to_string(),
///     email: "alice@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: Role::User,
/// }).await?;
///
/// // Login accepts either the username or the email address
/// assert!(User::find_by_login(&pool, "alice@example.com").await?.is_some());
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages users and tasks, sees everything
    Admin,

    /// Works on the tasks assigned to them
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    /// Login name, unique
    pub username: String,

    /// Notification address, unique, also accepted at login
    pub email: String,

    /// Argon2id PHC string, never sent to clients
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub role: Role,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Argon2id hash, not the plaintext password
    pub password_hash: String,
    pub role: Role,
}

/// Input for an administrator's edit of a user
///
/// Username, email and role are always written. The password hash is only
/// replaced when `password_hash` is set.
#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

impl User {
    /// Inserts a new user.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if the username or email is taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.role)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user whose username or email equals `identifier` exactly.
    pub async fn find_by_login(pool: &PgPool, identifier: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1 OR email = $1
            ORDER BY (username = $1) DESC
            LIMIT 1
            "#
        ))
        .bind(identifier)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Lists all users, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Applies an administrator's edit.
    ///
    /// Returns `None` if the user does not exist.
    pub async fn update(pool: &PgPool, id: i64, data: UpdateUser) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $2,
                email = $3,
                role = $4,
                password_hash = COALESCE($5, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.username)
        .bind(data.email)
        .bind(data.role)
        .bind(data.password_hash)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Deletes a user.
    ///
    /// Fails with a foreign key violation while any task or comment still
    /// references the user.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

//! SQLite-backed directory for development and tests
//!
//! Stands in for the LDAP server when none is reachable. Users are managed
//! with the `spool-user` tool.
//!
//! # Security
//! - Passwords hashed with Argon2
//! - Unknown users and wrong passwords are indistinguishable to callers
//!
//! # Usage
//! ```no_run
//! use spool_rs::security::{Directory, LocalDirectory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = LocalDirectory::new("sqlite://users.db").await?;
//! directory.add_user("alice", "password123").await?;
//!
//! assert!(directory.verify("alice", "password123").await?);
//! # Ok(())
//! # }
//! ```

use crate::error::{MailError, Result};
use crate::security::directory::Directory;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct LocalDirectory {
    db: SqlitePool,
}

impl LocalDirectory {
    /// Open (or create) the user database
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own empty database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS directory_users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_login TEXT
            )
            "#,
        )
        .execute(&db)
        .await?;

        Ok(Self { db })
    }

    /// Add a new user
    pub async fn add_user(&self, username: &str, password: &str) -> Result<()> {
        info!("Adding user: {}", username);

        let password_hash = Self::hash_password(password)?;

        sqlx::query(
            r#"
            INSERT INTO directory_users (username, password_hash, created_at)
            VALUES (?, ?, datetime('now'))
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Delete a user, returning whether it existed
    pub async fn delete_user(&self, username: &str) -> Result<bool> {
        info!("Deleting user: {}", username);

        let result = sqlx::query("DELETE FROM directory_users WHERE username = ?")
            .bind(username)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check if user exists
    pub async fn user_exists(&self, username: &str) -> Result<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM directory_users WHERE username = ?")
                .bind(username)
                .fetch_one(&self.db)
                .await?;

        Ok(count.0 > 0)
    }

    /// List all users as (username, created_at, last_login)
    pub async fn list_users(&self) -> Result<Vec<(String, String, Option<String>)>> {
        let users = sqlx::query_as::<_, (String, String, Option<String>)>(
            r#"
            SELECT username, created_at, last_login
            FROM directory_users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    /// Hash password with Argon2
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| MailError::Directory(format!("Failed to hash password: {}", e)))
    }
}

#[async_trait::async_trait]
impl Directory for LocalDirectory {
    async fn verify(&self, username: &str, password: &str) -> Result<bool> {
        debug!("Local directory lookup for {}", username);

        let row = sqlx::query_as::<_, (String,)>(
            "SELECT password_hash FROM directory_users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        let Some((stored_hash,)) = row else {
            warn!("Unknown user: {}", username);
            return Ok(false);
        };

        let parsed_hash =
            PasswordHash::new(&stored_hash).map_err(|_| MailError::AuthenticationFailed)?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            warn!("Invalid password for {}", username);
            return Ok(false);
        }

        sqlx::query("UPDATE directory_users SET last_login = datetime('now') WHERE username = ?")
            .bind(username)
            .execute(&self.db)
            .await?;

        Ok(true)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

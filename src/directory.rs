//! Read-only access to the subscriber directory
//!
//! The directory is a SQLite database owned by the chat bot. Its `users`
//! table has at least `user_id`, `email` and `notifications_enabled`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Opaque chat recipient identifier
pub type ChatId = String;

/// Source of notification recipients
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Every non-empty email address
    async fn email_recipients(&self) -> Result<Vec<String>, DirectoryError>;

    /// Every chat user with notifications enabled
    async fn chat_recipients(&self) -> Result<Vec<ChatId>, DirectoryError>;
}

/// Subscriber directory backed by SQLite
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    /// Open the database read-only. Connections are made on first use, so a
    /// missing file surfaces as a query error rather than a startup failure.
    pub fn open<P: AsRef<Path>>(path: P, timeout: Duration) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .acquire_timeout(timeout)
            .connect_lazy_with(options);

        Self { pool }
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberDirectory for SqliteDirectory {
    async fn email_recipients(&self) -> Result<Vec<String>, DirectoryError> {
        let emails = sqlx::query_scalar::<_, String>(
            "SELECT TRIM(email) FROM users WHERE email IS NOT NULL AND TRIM(email) != ''",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(emails)
    }

    async fn chat_recipients(&self) -> Result<Vec<ChatId>, DirectoryError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT CAST(user_id AS TEXT) FROM users \
             WHERE notifications_enabled = 1 AND user_id IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Subscriber query failed: {0}")]
    Query(#[from] sqlx::Error),
}

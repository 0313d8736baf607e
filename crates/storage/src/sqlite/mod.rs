use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{CardRepository, DeckRepository, Storage};

mod card_repo;
mod deck_repo;
mod mapping;
mod migrate;

pub use migrate::LATEST_SCHEMA_VERSION;

/// Pool tuning for [`SqliteRepository::connect_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Applied as `PRAGMA busy_timeout` on every connection.
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// True for `sqlite::memory:`, where every connection opens its own database.
fn is_private_memory(database_url: &str) -> bool {
    database_url == "sqlite::memory:" || database_url == "sqlite://:memory:"
}

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect with default [`PoolSettings`].
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or a
    /// connection PRAGMA fails.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, PoolSettings::default()).await
    }

    /// Connect to `SQLite`, switching file databases to WAL.
    ///
    /// A private in-memory URL is pinned to one connection so every query
    /// sees the same database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or a
    /// connection PRAGMA fails.
    pub async fn connect_with(
        database_url: &str,
        settings: PoolSettings,
    ) -> Result<Self, SqliteInitError> {
        let private_memory = is_private_memory(database_url);
        let max_connections = if private_memory {
            1
        } else {
            settings.max_connections.max(1)
        };
        let busy_ms = i64::try_from(settings.busy_timeout.as_millis()).unwrap_or(i64::MAX);

        let mut options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(settings.acquire_timeout);
        if private_memory {
            // Recycling the only connection would drop the database.
            options = options.idle_timeout(None).max_lifetime(None);
        }

        let pool = options
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if !private_memory {
                        sqlx::query("PRAGMA journal_mode = WAL;")
                            .execute(&mut *conn)
                            .await?;
                    }
                    sqlx::query(&format!("PRAGMA busy_timeout = {busy_ms};"))
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        tracing::debug!(database_url, max_connections, "sqlite pool ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to [`LATEST_SCHEMA_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    /// Highest applied schema version, 0 before the first migration.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the version table cannot be read.
    pub async fn schema_version(&self) -> Result<i64, SqliteInitError> {
        Ok(migrate::current_version(&self.pool).await?)
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`, migrated to the latest schema.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let decks: Arc<dyn DeckRepository> = Arc::new(repo.clone());
        let cards: Arc<dyn CardRepository> = Arc::new(repo);
        Ok(Self { decks, cards })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[test]
    fn only_unnamed_memory_urls_are_private() {
        assert!(is_private_memory("sqlite::memory:"));
        assert!(!is_private_memory("sqlite:file:shared?mode=memory&cache=shared"));
        assert!(!is_private_memory("sqlite:///tmp/decks.sqlite3"));
    }

    #[tokio::test]
    async fn private_memory_pool_keeps_one_database() {
        let repo = SqliteRepository::connect("sqlite::memory:").await.unwrap();
        assert_eq!(repo.schema_version().await.unwrap(), 0);
        repo.migrate().await.unwrap();
        assert_eq!(repo.schema_version().await.unwrap(), LATEST_SCHEMA_VERSION);
    }
}

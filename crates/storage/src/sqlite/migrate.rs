use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::SqliteInitError;

/// Schema version produced by [`run_migrations`].
pub const LATEST_SCHEMA_VERSION: i64 = 2;

pub async fn current_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let has_table: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
    )
    .fetch_optional(pool)
    .await?;
    if has_table.is_none() {
        return Ok(0);
    }
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

async fn mark_applied(tx: &mut Transaction<'_, Sqlite>, version: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Applies every pending schema version in order, each in its own transaction.
///
/// Version 1 is the base deck/card layout. Version 2 adds pass timing to
/// decks and per-card scheduling fields; existing rows get zeroed timing and
/// cards become due on their creation day.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
        ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS decks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    card_count INTEGER NOT NULL DEFAULT 0 CHECK (card_count >= 0),
                    review_count INTEGER NOT NULL DEFAULT 0 CHECK (review_count >= 0),
                    last_review_date TEXT,
                    next_review_date TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // No foreign key: deleting a deck cascades through the service layer.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS cards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    deck_id INTEGER NOT NULL,
                    front TEXT NOT NULL,
                    back TEXT NOT NULL,
                    total_answer_count INTEGER NOT NULL DEFAULT 0 CHECK (total_answer_count >= 0),
                    correct_count INTEGER NOT NULL DEFAULT 0 CHECK (correct_count >= 0),
                    correct_answer_ratio INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_decks_name ON decks(name);")
            .execute(&mut *tx)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck_id, id);")
            .execute(&mut *tx)
            .await?;

        mark_applied(&mut tx, 1).await?;
        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;

        for statement in [
            "ALTER TABLE decks ADD COLUMN max_time_ms INTEGER NOT NULL DEFAULT 0;",
            "ALTER TABLE decks ADD COLUMN current_time_ms INTEGER NOT NULL DEFAULT 0;",
            "ALTER TABLE cards ADD COLUMN interval_index INTEGER NOT NULL DEFAULT 0;",
            "ALTER TABLE cards ADD COLUMN next_review_date TEXT;",
            "ALTER TABLE cards ADD COLUMN last_reviewed TEXT;",
            "UPDATE cards SET next_review_date = date(created_at) WHERE next_review_date IS NULL;",
        ] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        mark_applied(&mut tx, 2).await?;
        tx.commit().await?;
        tracing::info!(version = 2, "applied schema migration");
    }

    Ok(())
}

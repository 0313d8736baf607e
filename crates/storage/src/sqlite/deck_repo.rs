use spaced_core::model::{Deck, DeckId};

use super::SqliteRepository;
use super::mapping::{db_err, deck_id_from_i64, deck_id_to_i64, map_deck_row, u64_to_i64};
use crate::repository::{DeckRepository, NewDeckRecord, StorageError};

const DECK_COLUMNS: &str = "id, name, card_count, review_count, last_review_date, \
     next_review_date, created_at, updated_at, max_time_ms, current_time_ms";

#[async_trait::async_trait]
impl DeckRepository for SqliteRepository {
    async fn insert_new_deck(&self, deck: NewDeckRecord) -> Result<DeckId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO decks (name, next_review_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ",
        )
        .bind(deck.name.trim())
        .bind(deck.next_review_date)
        .bind(deck.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        deck_id_from_i64(res.last_insert_rowid())
    }

    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO decks (
                id, name, card_count, review_count, last_review_date, next_review_date,
                created_at, updated_at, max_time_ms, current_time_ms
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                card_count = excluded.card_count,
                review_count = excluded.review_count,
                last_review_date = excluded.last_review_date,
                next_review_date = excluded.next_review_date,
                updated_at = excluded.updated_at,
                max_time_ms = excluded.max_time_ms,
                current_time_ms = excluded.current_time_ms
            ",
        )
        .bind(deck_id_to_i64(deck.id())?)
        .bind(deck.name())
        .bind(i64::from(deck.card_count()))
        .bind(i64::from(deck.review_count()))
        .bind(deck.last_review_date())
        .bind(deck.next_review_date())
        .bind(deck.created_at())
        .bind(deck.updated_at())
        .bind(u64_to_i64("max_time_ms", deck.max_time_ms())?)
        .bind(u64_to_i64("current_time_ms", deck.current_time_ms())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError> {
        let sql = format!("SELECT {DECK_COLUMNS} FROM decks WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(deck_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_deck_row).transpose()
    }

    async fn list_decks(&self) -> Result<Vec<Deck>, StorageError> {
        let sql = format!("SELECT {DECK_COLUMNS} FROM decks ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(map_deck_row).collect()
    }

    async fn delete_deck(&self, id: DeckId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM decks WHERE id = ?1")
            .bind(deck_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(res.rows_affected() > 0)
    }
}

use spaced_core::model::{Card, CardId, DeckId};

use super::SqliteRepository;
use super::mapping::{card_id_from_i64, card_id_to_i64, db_err, deck_id_to_i64, map_card_row};
use crate::repository::{CardRepository, NewCardRecord, StorageError};

const CARD_COLUMNS: &str = "id, deck_id, front, back, total_answer_count, correct_count, \
     interval_index, next_review_date, last_reviewed, created_at";

#[async_trait::async_trait]
impl CardRepository for SqliteRepository {
    async fn insert_new_card(&self, card: NewCardRecord) -> Result<CardId, StorageError> {
        let card = card.card;
        let res = sqlx::query(
            r"
            INSERT INTO cards (deck_id, front, back, next_review_date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(deck_id_to_i64(card.deck_id)?)
        .bind(card.front)
        .bind(card.back)
        .bind(card.next_review_date)
        .bind(card.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        card_id_from_i64(res.last_insert_rowid())
    }

    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO cards (
                id, deck_id, front, back, total_answer_count, correct_count,
                correct_answer_ratio, interval_index, next_review_date, last_reviewed, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                front = excluded.front,
                back = excluded.back,
                total_answer_count = excluded.total_answer_count,
                correct_count = excluded.correct_count,
                correct_answer_ratio = excluded.correct_answer_ratio,
                interval_index = excluded.interval_index,
                next_review_date = excluded.next_review_date,
                last_reviewed = excluded.last_reviewed
            ",
        )
        .bind(card_id_to_i64(card.id())?)
        .bind(deck_id_to_i64(card.deck_id())?)
        .bind(card.front())
        .bind(card.back())
        .bind(i64::from(card.total_answer_count()))
        .bind(i64::from(card.correct_count()))
        .bind(i64::from(card.correct_answer_ratio()))
        .bind(i64::from(card.interval_index()))
        .bind(card.next_review_date())
        .bind(card.last_reviewed())
        .bind(card.created_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_card(&self, id: CardId) -> Result<Option<Card>, StorageError> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(card_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_card_row).transpose()
    }

    async fn cards_for_deck(&self, deck_id: DeckId) -> Result<Vec<Card>, StorageError> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE deck_id = ?1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(deck_id_to_i64(deck_id)?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(map_card_row).collect()
    }

    async fn count_cards(&self, deck_id: DeckId) -> Result<u32, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE deck_id = ?1")
            .bind(deck_id_to_i64(deck_id)?)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        u32::try_from(count)
            .map_err(|_| StorageError::Serialization(format!("invalid card count: {count}")))
    }

    async fn delete_card(&self, id: CardId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM cards WHERE id = ?1")
            .bind(card_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(res.rows_affected() > 0)
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use spaced_core::model::{Card, CardId, Deck, DeckId};
use spaced_core::time::local_date;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map driver errors, surfacing unique violations as conflicts.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::Conflict(db.message().to_owned()),
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn deck_id_to_i64(id: DeckId) -> Result<i64, StorageError> {
    u64_to_i64("deck_id", id.value())
}

pub(crate) fn card_id_to_i64(id: CardId) -> Result<i64, StorageError> {
    u64_to_i64("card_id", id.value())
}

pub(crate) fn deck_id_from_i64(v: i64) -> Result<DeckId, StorageError> {
    Ok(DeckId::new(i64_to_u64("deck_id", v)?))
}

pub(crate) fn card_id_from_i64(v: i64) -> Result<CardId, StorageError> {
    Ok(CardId::new(i64_to_u64("card_id", v)?))
}

pub(crate) fn map_deck_row(row: &SqliteRow) -> Result<Deck, StorageError> {
    Deck::from_persisted(
        deck_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        i64_to_u32("card_count", row.try_get("card_count").map_err(ser)?)?,
        i64_to_u32("review_count", row.try_get("review_count").map_err(ser)?)?,
        row.try_get::<Option<NaiveDate>, _>("last_review_date")
            .map_err(ser)?,
        row.try_get::<NaiveDate, _>("next_review_date").map_err(ser)?,
        row.try_get::<DateTime<Utc>, _>("created_at").map_err(ser)?,
        row.try_get::<DateTime<Utc>, _>("updated_at").map_err(ser)?,
        i64_to_u64("max_time_ms", row.try_get("max_time_ms").map_err(ser)?)?,
        i64_to_u64("current_time_ms", row.try_get("current_time_ms").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_card_row(row: &SqliteRow) -> Result<Card, StorageError> {
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
    // Rows written before per-card scheduling have no date; they are due from creation.
    let next_review_date = row
        .try_get::<Option<NaiveDate>, _>("next_review_date")
        .map_err(ser)?
        .unwrap_or_else(|| local_date(created_at));

    Card::from_persisted(
        card_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        deck_id_from_i64(row.try_get::<i64, _>("deck_id").map_err(ser)?)?,
        row.try_get::<String, _>("front").map_err(ser)?,
        row.try_get::<String, _>("back").map_err(ser)?,
        i64_to_u32(
            "total_answer_count",
            row.try_get("total_answer_count").map_err(ser)?,
        )?,
        i64_to_u32("correct_count", row.try_get("correct_count").map_err(ser)?)?,
        i64_to_u32("interval_index", row.try_get("interval_index").map_err(ser)?)?,
        next_review_date,
        row.try_get::<Option<NaiveDate>, _>("last_reviewed")
            .map_err(ser)?,
        created_at,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ids_are_rejected() {
        assert!(matches!(
            deck_id_from_i64(-1),
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(card_id_from_i64(7).unwrap(), CardId::new(7));
    }

    #[test]
    fn oversized_ids_do_not_fit_sqlite_integers() {
        assert!(deck_id_to_i64(DeckId::new(u64::MAX)).is_err());
        assert_eq!(deck_id_to_i64(DeckId::new(3)).unwrap(), 3);
    }
}

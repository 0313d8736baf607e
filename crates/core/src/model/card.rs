use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::model::ids::{CardId, DeckId};
use crate::model::Outcome;
use crate::scheduler::Scheduler;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardError {
    #[error("card front cannot be empty")]
    BlankFront,

    #[error("card back cannot be empty")]
    BlankBack,

    #[error("invalid persisted card state: {0}")]
    InvalidPersistedState(String),
}

//
// ─── CARD TYPES ────────────────────────────────────────────────────────────────
//

/// Unsaved card input. Ids are assigned by the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDraft {
    pub deck_id: DeckId,
    pub front: String,
    pub back: String,
}

impl CardDraft {
    #[must_use]
    pub fn new(deck_id: DeckId, front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            deck_id,
            front: front.into(),
            back: back.into(),
        }
    }

    /// Trim both faces and reject blanks.
    ///
    /// # Errors
    ///
    /// Returns `CardError::BlankFront` / `CardError::BlankBack`.
    pub fn validate(self, now: DateTime<Utc>, today: NaiveDate) -> Result<ValidatedCard, CardError> {
        let front = self.front.trim();
        if front.is_empty() {
            return Err(CardError::BlankFront);
        }
        let back = self.back.trim();
        if back.is_empty() {
            return Err(CardError::BlankBack);
        }
        Ok(ValidatedCard {
            deck_id: self.deck_id,
            front: front.to_owned(),
            back: back.to_owned(),
            created_at: now,
            next_review_date: today,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCard {
    pub deck_id: DeckId,
    pub front: String,
    pub back: String,
    pub created_at: DateTime<Utc>,
    pub next_review_date: NaiveDate,
}

impl ValidatedCard {
    #[must_use]
    pub fn assign_id(self, id: CardId) -> Card {
        Card {
            id,
            deck_id: self.deck_id,
            front: self.front,
            back: self.back,
            total_answer_count: 0,
            correct_count: 0,
            interval_index: 0,
            next_review_date: self.next_review_date,
            last_reviewed: None,
            created_at: self.created_at,
        }
    }
}

/// A single front/back unit belonging to one deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    id: CardId,
    deck_id: DeckId,
    front: String,
    back: String,
    total_answer_count: u32,
    correct_count: u32,
    interval_index: u32,
    next_review_date: NaiveDate,
    last_reviewed: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl Card {
    /// Rehydrate a card from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `CardError::InvalidPersistedState` if the counters are inconsistent
    /// or a face is blank.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: CardId,
        deck_id: DeckId,
        front: String,
        back: String,
        total_answer_count: u32,
        correct_count: u32,
        interval_index: u32,
        next_review_date: NaiveDate,
        last_reviewed: Option<NaiveDate>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CardError> {
        if correct_count > total_answer_count {
            return Err(CardError::InvalidPersistedState(format!(
                "correct_count {correct_count} exceeds total_answer_count {total_answer_count}"
            )));
        }
        if front.trim().is_empty() || back.trim().is_empty() {
            return Err(CardError::InvalidPersistedState("blank face".into()));
        }
        Ok(Self {
            id,
            deck_id,
            front,
            back,
            total_answer_count,
            correct_count,
            interval_index,
            next_review_date,
            last_reviewed,
            created_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> CardId {
        self.id
    }

    #[must_use]
    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    #[must_use]
    pub fn front(&self) -> &str {
        &self.front
    }

    #[must_use]
    pub fn back(&self) -> &str {
        &self.back
    }

    #[must_use]
    pub fn total_answer_count(&self) -> u32 {
        self.total_answer_count
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    /// Missed answers. Derived from the two stored counters.
    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.total_answer_count.saturating_sub(self.correct_count)
    }

    /// Percentage of correct answers, rounded; 0 for an unanswered card.
    #[must_use]
    pub fn correct_answer_ratio(&self) -> u32 {
        correct_ratio(self.correct_count, self.total_answer_count)
    }

    #[must_use]
    pub fn interval_index(&self) -> u32 {
        self.interval_index
    }

    #[must_use]
    pub fn next_review_date(&self) -> NaiveDate {
        self.next_review_date
    }

    #[must_use]
    pub fn last_reviewed(&self) -> Option<NaiveDate> {
        self.last_reviewed
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.next_review_date <= as_of
    }

    /// Record one answer: bump counters and advance the card's own schedule.
    pub fn record_answer(&mut self, outcome: Outcome, scheduler: &Scheduler, today: NaiveDate) {
        self.total_answer_count = self.total_answer_count.saturating_add(1);
        if outcome.is_correct() {
            self.correct_count = self.correct_count.saturating_add(1);
        }
        let schedule = scheduler.schedule_card(self.interval_index, outcome, today);
        self.interval_index = schedule.interval_index;
        self.next_review_date = schedule.next_review_date;
        self.last_reviewed = Some(today);
    }
}

/// `round(100 * correct / max(total, 1))`.
#[must_use]
pub fn correct_ratio(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    // Integer round-half-up.
    u32::try_from((200 * correct + total) / (2 * total)).unwrap_or(100)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

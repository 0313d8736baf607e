use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::model::ids::DeckId;
use crate::scheduler::{PassSchedule, Scheduler};
use crate::time::days_between;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck name cannot be empty")]
    EmptyName,

    #[error("invalid persisted deck state: {0}")]
    InvalidPersistedState(String),
}

//
// ─── DUE STATUS ────────────────────────────────────────────────────────────────
//

/// Day-granularity classification of a deck against "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    Overdue,
    DueToday,
    Upcoming,
}

impl DueStatus {
    #[must_use]
    pub fn is_due(self) -> bool {
        !matches!(self, DueStatus::Upcoming)
    }
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// A named collection of cards reviewed together as one scheduling unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    id: DeckId,
    name: String,
    card_count: u32,
    review_count: u32,
    last_review_date: Option<NaiveDate>,
    next_review_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    max_time_ms: u64,
    current_time_ms: u64,
}

impl Deck {
    /// Creates a fresh deck, due on the day it is created.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if name is empty or whitespace-only.
    pub fn new(
        id: DeckId,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Self, DeckError> {
        let name = normalize_name(name.into())?;
        Ok(Self {
            id,
            name,
            card_count: 0,
            review_count: 0,
            last_review_date: None,
            next_review_date: today,
            created_at,
            updated_at: created_at,
            max_time_ms: 0,
            current_time_ms: 0,
        })
    }

    /// Rehydrate a deck from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` for a blank stored name and
    /// `DeckError::InvalidPersistedState` if `updated_at` precedes `created_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: DeckId,
        name: String,
        card_count: u32,
        review_count: u32,
        last_review_date: Option<NaiveDate>,
        next_review_date: NaiveDate,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        max_time_ms: u64,
        current_time_ms: u64,
    ) -> Result<Self, DeckError> {
        let name = normalize_name(name)?;
        if updated_at < created_at {
            return Err(DeckError::InvalidPersistedState(
                "updated_at is before created_at".into(),
            ));
        }
        Ok(Self {
            id,
            name,
            card_count,
            review_count,
            last_review_date,
            next_review_date,
            created_at,
            updated_at,
            max_time_ms,
            current_time_ms,
        })
    }

    /// Same deck under a store-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: DeckId) -> Self {
        self.id = id;
        self
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> DeckId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn card_count(&self) -> u32 {
        self.card_count
    }

    #[must_use]
    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    #[must_use]
    pub fn last_review_date(&self) -> Option<NaiveDate> {
        self.last_review_date
    }

    #[must_use]
    pub fn next_review_date(&self) -> NaiveDate {
        self.next_review_date
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn max_time_ms(&self) -> u64 {
        self.max_time_ms
    }

    #[must_use]
    pub fn current_time_ms(&self) -> u64 {
        self.current_time_ms
    }

    #[must_use]
    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.next_review_date <= as_of
    }

    /// Days until the next review; negative when overdue.
    #[must_use]
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        days_between(today, self.next_review_date)
    }

    #[must_use]
    pub fn due_status(&self, today: NaiveDate) -> DueStatus {
        match self.days_until_due(today) {
            d if d < 0 => DueStatus::Overdue,
            0 => DueStatus::DueToday,
            _ => DueStatus::Upcoming,
        }
    }

    /// True when a full pass was already completed on `today`.
    #[must_use]
    pub fn reviewed_on(&self, today: NaiveDate) -> bool {
        self.last_review_date == Some(today)
    }

    /// Efficiency of the latest pass relative to the slowest one, in percent
    /// with one decimal. Zero until a slowest pass is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn time_saved_percent(&self) -> f64 {
        if self.max_time_ms == 0 {
            return 0.0;
        }
        let raw = 1.0 - self.current_time_ms as f64 / self.max_time_ms as f64;
        (raw * 1000.0).round() / 10.0
    }

    /// Record the elapsed time of a finished pass. A new slowest pass only
    /// raises the maximum; any other pass becomes the current time.
    pub fn record_elapsed(&mut self, elapsed_ms: u64) {
        if elapsed_ms > self.max_time_ms {
            self.max_time_ms = elapsed_ms;
        } else {
            self.current_time_ms = elapsed_ms;
        }
    }

    /// Advance the schedule after a completed pass.
    pub fn apply_pass(
        &mut self,
        scheduler: &Scheduler,
        lapse_count: u32,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> PassSchedule {
        let schedule = scheduler.schedule_pass(self.review_count, lapse_count, today);
        self.review_count = schedule.review_count;
        self.next_review_date = schedule.next_review_date;
        self.last_review_date = Some(today);
        self.touch(now);
        schedule
    }

    pub fn set_card_count(&mut self, card_count: u32, now: DateTime<Utc>) {
        self.card_count = card_count;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

fn normalize_name(name: String) -> Result<String, DeckError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DeckError::EmptyName);
    }
    Ok(trimmed.to_owned())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Outcome;
use crate::time::add_days;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("interval table must not be empty")]
    EmptyIntervalTable,
    #[error("interval table must be strictly increasing (violated at index {index})")]
    NonIncreasingIntervals { index: usize },
    #[error("max review count must be > 0")]
    InvalidMaxReviewCount,
    #[error("unknown lapse policy: {0}")]
    UnknownLapsePolicy(String),
}

//
// ─── LAPSE POLICY ──────────────────────────────────────────────────────────────
//

/// How a completed pass with at least one lapse affects the deck's review count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapsePolicy {
    /// Hold the count, except that a deck which never completed a pass
    /// (count 0) still advances once.
    #[default]
    AdvanceFromZero,
    /// Hold the count on any lapse.
    Hold,
}

impl LapsePolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LapsePolicy::AdvanceFromZero => "advance_from_zero",
            LapsePolicy::Hold => "hold",
        }
    }
}

impl fmt::Display for LapsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LapsePolicy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "advance_from_zero" | "a" => Ok(Self::AdvanceFromZero),
            "hold" | "b" => Ok(Self::Hold),
            other => Err(SchedulerError::UnknownLapsePolicy(other.to_owned())),
        }
    }
}

//
// ─── INTERVAL TABLE ────────────────────────────────────────────────────────────
//

/// Default day offsets, indexed by review count.
pub const DEFAULT_INTERVALS: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Fixed, strictly increasing sequence of day offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTable(Vec<u32>);

impl IntervalTable {
    /// # Errors
    ///
    /// Returns `EmptyIntervalTable` or `NonIncreasingIntervals` for malformed tables.
    pub fn new(days: Vec<u32>) -> Result<Self, SchedulerError> {
        if days.is_empty() {
            return Err(SchedulerError::EmptyIntervalTable);
        }
        if let Some(index) = days.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SchedulerError::NonIncreasingIntervals { index: index + 1 });
        }
        Ok(Self(days))
    }

    /// Same table with a leading 0-day entry. Every later step shifts one
    /// review count to the right.
    #[must_use]
    pub fn with_same_day_start(&self) -> Self {
        if self.0.first() == Some(&0) {
            return self.clone();
        }
        let mut days = Vec::with_capacity(self.0.len() + 1);
        days.push(0);
        days.extend_from_slice(&self.0);
        Self(days)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Day offset at `index`, clamped to the last entry.
    #[must_use]
    pub fn days_at(&self, index: usize) -> u32 {
        self.0[index.min(self.last_index())]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl Default for IntervalTable {
    fn default() -> Self {
        Self(DEFAULT_INTERVALS.to_vec())
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Unvalidated scheduling parameters, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub intervals: Vec<u32>,
    pub max_review_count: u32,
    #[serde(default)]
    pub lapse_policy: LapsePolicy,
    /// Prepend a 0-day entry to `intervals`.
    #[serde(default)]
    pub same_day_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            intervals: DEFAULT_INTERVALS.to_vec(),
            max_review_count: 5,
            lapse_policy: LapsePolicy::default(),
            same_day_start: false,
        }
    }
}

impl SchedulerConfig {
    /// Validate into a usable scheduler.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError` if the table is malformed or the cap is zero.
    pub fn validate(self) -> Result<Scheduler, SchedulerError> {
        let mut table = IntervalTable::new(self.intervals)?;
        if self.same_day_start {
            table = table.with_same_day_start();
        }
        if self.max_review_count == 0 {
            return Err(SchedulerError::InvalidMaxReviewCount);
        }
        Ok(Scheduler {
            table,
            max_review_count: self.max_review_count,
            lapse_policy: self.lapse_policy,
        })
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Result of scheduling a completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSchedule {
    pub review_count: u32,
    pub next_review_date: NaiveDate,
}

/// Result of scheduling a single card answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardSchedule {
    pub interval_index: u32,
    pub next_review_date: NaiveDate,
}

/// Expanding-interval scheduler.
///
/// Pure: every operation takes "today" explicitly and performs no I/O.
///
/// # Examples
///
/// ```
/// # use spaced_core::scheduler::Scheduler;
/// # use chrono::NaiveDate;
/// let scheduler = Scheduler::new();
/// let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
/// let pass = scheduler.schedule_pass(0, 0, today);
/// assert_eq!(pass.review_count, 1);
/// assert_eq!(pass.next_review_date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduler {
    table: IntervalTable,
    max_review_count: u32,
    lapse_policy: LapsePolicy,
}

impl Scheduler {
    /// Default table `[1, 2, 4, 8, 16, 32]`, cap 5, advance-from-zero lapses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: IntervalTable::default(),
            max_review_count: 5,
            lapse_policy: LapsePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_lapse_policy(mut self, lapse_policy: LapsePolicy) -> Self {
        self.lapse_policy = lapse_policy;
        self
    }

    #[must_use]
    pub fn table(&self) -> &IntervalTable {
        &self.table
    }

    #[must_use]
    pub fn max_review_count(&self) -> u32 {
        self.max_review_count
    }

    #[must_use]
    pub fn lapse_policy(&self) -> LapsePolicy {
        self.lapse_policy
    }

    /// Day offset for the next review given the (already updated) review count.
    #[must_use]
    pub fn interval_days(&self, review_count: u32, had_lapse: bool) -> u32 {
        let count = usize::try_from(review_count).unwrap_or(usize::MAX);
        let index = if had_lapse {
            // Lapsed passes index directly; `days_at` guards the upper bound.
            count
        } else {
            count.min(self.table.last_index())
        };
        self.table.days_at(index)
    }

    /// Next review date: `today + table[index]`.
    #[must_use]
    pub fn compute_next_review_date(
        &self,
        review_count: u32,
        had_lapse: bool,
        today: NaiveDate,
    ) -> NaiveDate {
        add_days(today, self.interval_days(review_count, had_lapse))
    }

    /// Review count after a completed pass with `lapse_count` misses.
    #[must_use]
    pub fn update_review_count(&self, review_count: u32, lapse_count: u32) -> u32 {
        if lapse_count == 0 {
            return review_count.saturating_add(1).min(self.max_review_count);
        }
        match self.lapse_policy {
            LapsePolicy::AdvanceFromZero if review_count == 0 => 1.min(self.max_review_count),
            LapsePolicy::AdvanceFromZero | LapsePolicy::Hold => review_count,
        }
    }

    /// Update the count, then derive the next date from the updated count.
    #[must_use]
    pub fn schedule_pass(&self, review_count: u32, lapse_count: u32, today: NaiveDate) -> PassSchedule {
        let review_count = self.update_review_count(review_count, lapse_count);
        PassSchedule {
            review_count,
            next_review_date: self.compute_next_review_date(review_count, lapse_count > 0, today),
        }
    }

    /// Per-card progression: a correct answer advances one step, a miss
    /// resets to the start and makes the card due today.
    #[must_use]
    pub fn schedule_card(&self, interval_index: u32, outcome: Outcome, today: NaiveDate) -> CardSchedule {
        match outcome {
            Outcome::Correct => {
                let interval_index = interval_index.saturating_add(1).min(self.max_review_count);
                CardSchedule {
                    interval_index,
                    next_review_date: self.compute_next_review_date(interval_index, false, today),
                }
            }
            Outcome::Incorrect => CardSchedule {
                interval_index: 0,
                next_review_date: today,
            },
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

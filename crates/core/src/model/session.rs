use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{DeckId, Outcome, SessionId};
use crate::time::elapsed_ms;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStatsError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("correct ({correct}) + incorrect ({incorrect}) does not match answers ({answers})")]
    CountMismatch {
        answers: u32,
        correct: u32,
        incorrect: u32,
    },
}

/// Lifecycle of a review session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InProgress,
    Completed,
}

/// Running tally of answers within one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerTally {
    pub answers: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub rounds: u32,
}

impl AnswerTally {
    pub fn record(&mut self, outcome: Outcome) {
        self.answers = self.answers.saturating_add(1);
        match outcome {
            Outcome::Correct => self.correct = self.correct.saturating_add(1),
            Outcome::Incorrect => self.incorrect = self.incorrect.saturating_add(1),
        }
    }
}

/// Aggregate statistics for a completed review pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    session_id: SessionId,
    deck_id: DeckId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    card_count: u32,
    tally: AnswerTally,
}

impl SessionStats {
    /// # Errors
    ///
    /// Returns `SessionStatsError::InvalidTimeRange` if `completed_at` precedes
    /// `started_at`, or `CountMismatch` if the tally is inconsistent.
    pub fn new(
        session_id: SessionId,
        deck_id: DeckId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        card_count: u32,
        tally: AnswerTally,
    ) -> Result<Self, SessionStatsError> {
        if completed_at < started_at {
            return Err(SessionStatsError::InvalidTimeRange);
        }
        if tally.correct.saturating_add(tally.incorrect) != tally.answers {
            return Err(SessionStatsError::CountMismatch {
                answers: tally.answers,
                correct: tally.correct,
                incorrect: tally.incorrect,
            });
        }
        Ok(Self {
            session_id,
            deck_id,
            started_at,
            completed_at,
            card_count,
            tally,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        elapsed_ms(self.started_at, self.completed_at)
    }

    #[must_use]
    pub fn card_count(&self) -> u32 {
        self.card_count
    }

    #[must_use]
    pub fn answers(&self) -> u32 {
        self.tally.answers
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.tally.correct
    }

    /// Number of lapses (incorrect answers) across all rounds.
    #[must_use]
    pub fn lapses(&self) -> u32 {
        self.tally.incorrect
    }

    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.tally.rounds
    }
}

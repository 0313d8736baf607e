use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use spaced_core::model::{
    AnswerTally, Card, CardId, Deck, Outcome, ReviewOptions, SessionId, SessionState, SessionStats,
};
use spaced_core::scheduler::{PassSchedule, Scheduler};
use spaced_core::time::{elapsed_ms, local_date};

use super::plan::{self, CardQueue};
use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── ANSWER EFFECT ─────────────────────────────────────────────────────────────
//

/// What a single answer changed. The caller persists `card` and, on
/// completion, the session's deck.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerEffect {
    pub card_id: CardId,
    pub outcome: Outcome,
    /// Updated card; `None` in learning mode, where nothing is recorded.
    pub card: Option<Card>,
    pub requeued: bool,
    pub new_round: bool,
    /// Set on the answer that finished the pass.
    pub completed: Option<PassCompletion>,
}

/// Scheduling and statistics of a finished pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassCompletion {
    pub schedule: PassSchedule,
    pub stats: SessionStats,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory review pass over one deck.
///
/// Owns a fixed card list and a queue of indices into it. Answers mutate the
/// card copies held here; persistence is left to `SessionLoopService`.
pub struct ReviewSession {
    id: SessionId,
    deck: Deck,
    cards: Vec<Card>,
    options: ReviewOptions,
    state: SessionState,
    queue: CardQueue,
    /// Missed and not yet recovered this round, in first-miss order.
    wrong_set: Vec<usize>,
    showing_front: bool,
    tally: AnswerTally,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    completion: Option<PassCompletion>,
    unsaved_cards: BTreeSet<usize>,
    deck_saved: bool,
    rng: StdRng,
}

impl ReviewSession {
    /// Create an idle session over `cards` (stored order).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no cards are provided.
    pub fn new(deck: Deck, cards: Vec<Card>, options: ReviewOptions) -> Result<Self, SessionError> {
        if cards.is_empty() {
            return Err(SessionError::Empty);
        }
        Ok(Self {
            id: SessionId::new_random(),
            deck,
            cards,
            options,
            state: SessionState::Idle,
            queue: CardQueue::new(),
            wrong_set: Vec::new(),
            showing_front: true,
            tally: AnswerTally::default(),
            started_at: None,
            completed_at: None,
            completion: None,
            unsaved_cards: BTreeSet::new(),
            deck_saved: false,
            rng: StdRng::from_rng(&mut rand::rng()),
        })
    }

    /// Use a deterministic shuffle source.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Enter `InProgress` with the first round queued.
    ///
    /// A graded pass needs the deck to be due and not already reviewed today
    /// unless `force` is set. Learning mode may always start.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` unless idle, `NotDue` or
    /// `AlreadyReviewedToday` when the guard refuses.
    pub fn start(&mut self, now: DateTime<Utc>, force: bool) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        let today = local_date(now);
        if !self.options.learning && !force {
            if !self.deck.is_due(today) {
                return Err(SessionError::NotDue {
                    deck_id: self.deck.id(),
                    next_review_date: self.deck.next_review_date(),
                });
            }
            if self.deck.reviewed_on(today) {
                return Err(SessionError::AlreadyReviewedToday(self.deck.id()));
            }
        }

        self.queue = plan::first_round(self.cards.len(), self.options.order, &mut self.rng);
        self.wrong_set.clear();
        self.tally = AnswerTally {
            rounds: 1,
            ..AnswerTally::default()
        };
        self.showing_front = true;
        self.started_at = Some(now);
        self.completed_at = None;
        self.state = SessionState::InProgress;
        Ok(())
    }

    /// Answer the card at the head of the queue.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside `InProgress`, or
    /// `SessionError::Stats` if the tally no longer adds up.
    pub fn answer(
        &mut self,
        outcome: Outcome,
        now: DateTime<Utc>,
        scheduler: &Scheduler,
    ) -> Result<AnswerEffect, SessionError> {
        if self.state != SessionState::InProgress {
            return Err(SessionError::NotInProgress);
        }
        let index = self.queue.pop_front().ok_or(SessionError::NotInProgress)?;
        let card_id = self.cards[index].id();
        self.showing_front = true;

        if self.options.learning {
            self.queue.push_back(index);
            return Ok(AnswerEffect {
                card_id,
                outcome,
                card: None,
                requeued: true,
                new_round: false,
                completed: None,
            });
        }

        let today = local_date(now);
        self.cards[index].record_answer(outcome, scheduler, today);
        self.unsaved_cards.insert(index);
        self.tally.record(outcome);

        let mut requeued = false;
        match outcome {
            Outcome::Incorrect => {
                if !self.wrong_set.contains(&index) {
                    self.wrong_set.push(index);
                }
                if self.options.requeue_missed {
                    plan::requeue_after_next(&mut self.queue, index);
                    requeued = true;
                }
            }
            Outcome::Correct => self.wrong_set.retain(|&i| i != index),
        }

        let mut new_round = false;
        let mut completed = None;
        if self.queue.is_empty() {
            if self.wrong_set.is_empty() {
                completed = Some(self.complete(now, today, scheduler)?);
            } else {
                self.queue = plan::next_round(
                    self.cards.len(),
                    &self.wrong_set,
                    self.options.repeat,
                    self.options.order,
                    &mut self.rng,
                );
                self.wrong_set.clear();
                self.tally.rounds = self.tally.rounds.saturating_add(1);
                new_round = true;
            }
        }

        Ok(AnswerEffect {
            card_id,
            outcome,
            card: Some(self.cards[index].clone()),
            requeued,
            new_round,
            completed,
        })
    }

    fn complete(
        &mut self,
        now: DateTime<Utc>,
        today: chrono::NaiveDate,
        scheduler: &Scheduler,
    ) -> Result<PassCompletion, SessionError> {
        let started_at = self.started_at.unwrap_or(now);
        // A wall clock stepped backwards mid-pass ends the pass at its start.
        let completed_at = now.max(started_at);
        let card_count = u32::try_from(self.cards.len()).unwrap_or(u32::MAX);
        let stats = SessionStats::new(
            self.id,
            self.deck.id(),
            started_at,
            completed_at,
            card_count,
            self.tally,
        )?;

        self.deck.record_elapsed(elapsed_ms(started_at, completed_at));
        let schedule = self.deck.apply_pass(scheduler, self.tally.incorrect, today, now);

        let completion = PassCompletion { schedule, stats };
        self.completion = Some(completion.clone());
        self.completed_at = Some(completed_at);
        self.state = SessionState::Completed;
        Ok(completion)
    }

    /// Toggle the visible face of the current card. Never advances the queue.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` outside `InProgress`.
    pub fn flip(&mut self) -> Result<bool, SessionError> {
        if self.state != SessionState::InProgress {
            return Err(SessionError::NotInProgress);
        }
        self.showing_front = !self.showing_front;
        Ok(self.showing_front)
    }

    /// Abandon the pass. Deck scheduling is left as it was; card answers
    /// already recorded stay recorded.
    pub fn cancel(&mut self) {
        self.queue.clear();
        self.wrong_set.clear();
        self.showing_front = true;
        self.state = SessionState::Idle;
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    #[must_use]
    pub fn options(&self) -> ReviewOptions {
        self.options
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Completed
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn completion(&self) -> Option<&PassCompletion> {
        self.completion.as_ref()
    }

    #[must_use]
    pub fn tally(&self) -> AnswerTally {
        self.tally
    }

    /// The fixed card set of this pass, with answers applied so far.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        if self.state != SessionState::InProgress {
            return None;
        }
        self.queue.front().map(|&i| &self.cards[i])
    }

    /// True while the prompt side is shown: the front in normal display,
    /// the back in reverse display.
    #[must_use]
    pub fn showing_front(&self) -> bool {
        self.showing_front
    }

    /// Text currently visible for the head card.
    #[must_use]
    pub fn visible_face(&self) -> Option<&str> {
        let card = self.current_card()?;
        let front_side = self.showing_front == self.options.shows_front_first();
        Some(if front_side { card.front() } else { card.back() })
    }

    /// Ids in the queue, head first.
    #[must_use]
    pub fn queued_ids(&self) -> Vec<CardId> {
        self.queue.iter().map(|&i| self.cards[i].id()).collect()
    }

    /// Ids missed and not yet recovered this round.
    #[must_use]
    pub fn wrong_ids(&self) -> Vec<CardId> {
        self.wrong_set.iter().map(|&i| self.cards[i].id()).collect()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.cards.len(),
            answered: self.tally.answers,
            remaining: self.queue.len(),
            missed_pending: self.wrong_set.len(),
            round: self.tally.rounds.max(1),
            is_complete: self.is_complete(),
        }
    }

    /// True while an answered card or a finished pass is not yet stored.
    #[must_use]
    pub fn has_pending_writes(&self) -> bool {
        !self.unsaved_cards.is_empty() || self.needs_deck_save()
    }

    pub(crate) fn unsaved_cards(&self) -> Vec<Card> {
        self.unsaved_cards
            .iter()
            .map(|&i| self.cards[i].clone())
            .collect()
    }

    pub(crate) fn mark_card_saved(&mut self, card_id: CardId) {
        let cards = &self.cards;
        self.unsaved_cards.retain(|&i| cards[i].id() != card_id);
    }

    pub(crate) fn needs_deck_save(&self) -> bool {
        self.is_complete() && !self.deck_saved
    }

    pub(crate) fn mark_deck_saved(&mut self) {
        self.deck_saved = true;
    }
}

impl fmt::Debug for ReviewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewSession")
            .field("id", &self.id)
            .field("deck_id", &self.deck.id())
            .field("cards_len", &self.cards.len())
            .field("state", &self.state)
            .field("queue_len", &self.queue.len())
            .field("wrong_len", &self.wrong_set.len())
            .field("tally", &self.tally)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use std::sync::Arc;

use spaced_core::model::{DeckId, Outcome, ReviewOptions};
use spaced_core::scheduler::Scheduler;
use storage::repository::{CardRepository, DeckRepository};
use tracing::{debug, info, warn};

use super::service::{AnswerEffect, ReviewSession};
use crate::Clock;
use crate::error::SessionError;

/// Result of answering a single card in a persisted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAnswerResult {
    pub effect: AnswerEffect,
    pub is_complete: bool,
}

/// Orchestrates session start and persisted answering.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    scheduler: Scheduler,
    decks: Arc<dyn DeckRepository>,
    cards: Arc<dyn CardRepository>,
    shuffle_seed: Option<u64>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        scheduler: Scheduler,
        decks: Arc<dyn DeckRepository>,
        cards: Arc<dyn CardRepository>,
    ) -> Self {
        Self {
            clock,
            scheduler,
            decks,
            cards,
            shuffle_seed: None,
        }
    }

    /// Fix the shuffle seed of every session started from here.
    #[must_use]
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Load a deck with its cards and start a pass over them.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DeckNotFound`, `SessionError::Empty`, the start
    /// guard errors, or `SessionError::Storage`.
    pub async fn start_session(
        &self,
        deck_id: DeckId,
        options: ReviewOptions,
        force: bool,
    ) -> Result<ReviewSession, SessionError> {
        let deck = self
            .decks
            .get_deck(deck_id)
            .await?
            .ok_or(SessionError::DeckNotFound(deck_id))?;
        let cards = self.cards.cards_for_deck(deck_id).await?;

        let mut session = ReviewSession::new(deck, cards, options)?;
        if let Some(seed) = self.shuffle_seed {
            session = session.with_seed(seed);
        }
        session.start(self.clock.now(), force)?;
        info!(
            deck_id = %deck_id,
            session_id = %session.id(),
            cards = session.cards().len(),
            learning = options.learning,
            "session started"
        );
        Ok(session)
    }

    /// Answer the current card, then write the card and, when the pass
    /// finished, the deck.
    ///
    /// Writes left over from an earlier failed answer are flushed before the
    /// new answer is applied. If that flush fails the answer is refused and
    /// the session is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for state or persistence failures. After a
    /// storage failure on this answer's own writes the answer stays applied
    /// in memory, and the writes stay pending until the next answer or
    /// `finalize_pass`.
    pub async fn answer_current(
        &self,
        session: &mut ReviewSession,
        outcome: Outcome,
    ) -> Result<SessionAnswerResult, SessionError> {
        if session.has_pending_writes() {
            debug!(session_id = %session.id(), "flushing writes from a previous answer");
            self.finalize_pass(session).await?;
        }

        let effect = session.answer(outcome, self.clock.now(), &self.scheduler)?;
        debug!(card_id = %effect.card_id, ?outcome, requeued = effect.requeued, "answer recorded");
        if effect.new_round {
            debug!(round = session.tally().rounds, "new round queued");
        }

        self.finalize_pass(session).await?;

        Ok(SessionAnswerResult {
            effect,
            is_complete: session.is_complete(),
        })
    }

    /// Flush writes still pending on `session`. A no-op when everything is
    /// already stored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if a write fails; remaining writes stay pending.
    pub async fn finalize_pass(&self, session: &mut ReviewSession) -> Result<(), SessionError> {
        for card in session.unsaved_cards() {
            // Read-then-put so a card deleted mid-session is not resurrected.
            if self.cards.get_card(card.id()).await?.is_some() {
                self.cards.upsert_card(&card).await?;
            } else {
                warn!(card_id = %card.id(), "card deleted during session; answer not stored");
            }
            session.mark_card_saved(card.id());
        }

        if session.needs_deck_save() {
            let deck_id = session.deck().id();
            match self.decks.get_deck(deck_id).await? {
                Some(stored) => {
                    let mut deck = session.deck().clone();
                    deck.set_card_count(stored.card_count(), self.clock.now());
                    self.decks.upsert_deck(&deck).await?;
                    info!(
                        deck_id = %deck_id,
                        review_count = deck.review_count(),
                        next_review_date = %deck.next_review_date(),
                        "pass completed"
                    );
                }
                None => warn!(deck_id = %deck_id, "deck deleted during session; schedule not stored"),
            }
            session.mark_deck_saved();
        }
        Ok(())
    }
}

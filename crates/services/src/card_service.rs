use std::sync::Arc;

use spaced_core::model::{Card, CardDraft, CardId, DeckId};
use storage::repository::{CardRepository, DeckRepository, NewCardRecord};
use tracing::{debug, info};

use crate::Clock;
use crate::error::CardServiceError;

/// Orchestrates card creation, deletion and the deck's denormalized card count.
#[derive(Clone)]
pub struct CardService {
    clock: Clock,
    decks: Arc<dyn DeckRepository>,
    cards: Arc<dyn CardRepository>,
}

impl CardService {
    #[must_use]
    pub fn new(clock: Clock, decks: Arc<dyn DeckRepository>, cards: Arc<dyn CardRepository>) -> Self {
        Self {
            clock,
            decks,
            cards,
        }
    }

    /// Add a card to the selected deck.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::NoDeckSelected` when `deck_id` is `None`,
    /// `CardServiceError::Card` for a blank face, and
    /// `CardServiceError::DeckNotFound` if the deck is gone.
    /// Returns `CardServiceError::Storage` if persistence fails.
    pub async fn add_card(
        &self,
        deck_id: Option<DeckId>,
        front: &str,
        back: &str,
    ) -> Result<Card, CardServiceError> {
        let deck_id = deck_id.ok_or(CardServiceError::NoDeckSelected)?;
        let validated = CardDraft::new(deck_id, front, back)
            .validate(self.clock.now(), self.clock.today())?;

        if self.decks.get_deck(deck_id).await?.is_none() {
            return Err(CardServiceError::DeckNotFound(deck_id));
        }

        let card_id = self
            .cards
            .insert_new_card(NewCardRecord::new(validated.clone()))
            .await?;
        self.refresh_card_count(deck_id).await?;
        info!(card_id = %card_id, deck_id = %deck_id, "card added");
        Ok(validated.assign_id(card_id))
    }

    /// Delete one card. Returns false when it was already gone, in which case
    /// the deck's card count is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if repository access fails.
    pub async fn delete_card(&self, card_id: CardId) -> Result<bool, CardServiceError> {
        let Some(card) = self.cards.get_card(card_id).await? else {
            debug!(card_id = %card_id, "card already deleted");
            return Ok(false);
        };

        let removed = self.cards.delete_card(card_id).await?;
        if removed {
            self.refresh_card_count(card.deck_id()).await?;
            info!(card_id = %card_id, deck_id = %card.deck_id(), "card deleted");
        }
        Ok(removed)
    }

    /// Fetch a card that must exist.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::CardNotFound` if it is missing.
    pub async fn require_card(&self, card_id: CardId) -> Result<Card, CardServiceError> {
        self.cards
            .get_card(card_id)
            .await?
            .ok_or(CardServiceError::CardNotFound(card_id))
    }

    /// Cards of a deck in stored order.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if repository access fails.
    pub async fn cards_for_deck(&self, deck_id: DeckId) -> Result<Vec<Card>, CardServiceError> {
        Ok(self.cards.cards_for_deck(deck_id).await?)
    }

    /// Recompute the deck's card count from the cards actually stored.
    ///
    /// A missing deck is skipped (its cards are orphans awaiting cascade).
    async fn refresh_card_count(&self, deck_id: DeckId) -> Result<(), CardServiceError> {
        let Some(mut deck) = self.decks.get_deck(deck_id).await? else {
            return Ok(());
        };
        let count = self.cards.count_cards(deck_id).await?;
        if count != deck.card_count() {
            deck.set_card_count(count, self.clock.now());
            self.decks.upsert_deck(&deck).await?;
        }
        Ok(())
    }
}

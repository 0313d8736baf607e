use std::sync::Arc;

use spaced_core::model::{CardId, Deck, DeckId};
use storage::repository::{CardRepository, DeckRepository, NewDeckRecord, StorageError};
use tracing::{info, warn};

use crate::Clock;
use crate::error::DeckServiceError;
use crate::listing::list_due;

/// Names of the decks created on first launch.
pub const SAMPLE_DECK_NAMES: [&str; 5] = ["Deck 1", "Deck 2", "Deck 3", "Deck 4", "Deck 5"];

/// Outcome of a deck delete and its card cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeReport {
    pub deck_id: DeckId,
    /// False when the deck record was already gone (retry of an earlier delete).
    pub deck_removed: bool,
    pub cards_removed: Vec<CardId>,
    pub cards_failed: Vec<CardId>,
    /// The card lookup itself failed, so no card deletes were attempted.
    pub cards_unlisted: bool,
}

impl CascadeReport {
    fn new(deck_id: DeckId, deck_removed: bool) -> Self {
        Self {
            deck_id,
            deck_removed,
            cards_removed: Vec::new(),
            cards_failed: Vec::new(),
            cards_unlisted: false,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cards_unlisted && self.cards_failed.is_empty()
    }
}

/// Orchestrates deck creation, deletion and due listing.
#[derive(Clone)]
pub struct DeckService {
    clock: Clock,
    decks: Arc<dyn DeckRepository>,
    cards: Arc<dyn CardRepository>,
}

impl DeckService {
    #[must_use]
    pub fn new(clock: Clock, decks: Arc<dyn DeckRepository>, cards: Arc<dyn CardRepository>) -> Self {
        Self {
            clock,
            decks,
            cards,
        }
    }

    /// Create a new deck, due today.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Deck` for a blank name and
    /// `DeckServiceError::DuplicateName` when the name is taken.
    /// Returns `DeckServiceError::Storage` if persistence fails.
    pub async fn create_deck(&self, name: &str) -> Result<DeckId, DeckServiceError> {
        let now = self.clock.now();
        let deck = Deck::new(DeckId::new(0), name, now, self.clock.today())?;

        let existing = self.decks.list_decks().await?;
        if existing.iter().any(|d| d.name() == deck.name()) {
            return Err(DeckServiceError::DuplicateName(deck.name().to_owned()));
        }

        let deck_id = self
            .decks
            .insert_new_deck(NewDeckRecord::from_deck(&deck))
            .await
            .map_err(|e| match e {
                StorageError::Conflict(_) => DeckServiceError::DuplicateName(deck.name().to_owned()),
                other => other.into(),
            })?;
        info!(deck_id = %deck_id, name = deck.name(), "deck created");
        Ok(deck_id)
    }

    /// Delete a deck, then every card that belongs to it.
    ///
    /// Safe to retry: an absent deck or card is not an error, so a second
    /// call finishes whatever the first one left behind.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if the deck delete itself fails
    /// (nothing was removed), or `DeckServiceError::PartialDelete` carrying the
    /// report when some card deletes failed.
    pub async fn delete_deck(&self, deck_id: DeckId) -> Result<CascadeReport, DeckServiceError> {
        let deck_removed = self.decks.delete_deck(deck_id).await?;
        let mut report = CascadeReport::new(deck_id, deck_removed);

        let cards = match self.cards.cards_for_deck(deck_id).await {
            Ok(cards) => cards,
            Err(err) => {
                warn!(deck_id = %deck_id, error = %err, "card lookup failed during deck delete");
                report.cards_unlisted = true;
                return Err(DeckServiceError::PartialDelete(report));
            }
        };

        for card in cards {
            match self.cards.delete_card(card.id()).await {
                Ok(_) => report.cards_removed.push(card.id()),
                Err(err) => {
                    warn!(card_id = %card.id(), error = %err, "card delete failed during cascade");
                    report.cards_failed.push(card.id());
                }
            }
        }

        if !report.is_complete() {
            return Err(DeckServiceError::PartialDelete(report));
        }
        info!(
            deck_id = %deck_id,
            deck_removed,
            cards = report.cards_removed.len(),
            "deck deleted"
        );
        Ok(report)
    }

    /// All decks in store order.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn list_decks(&self) -> Result<Vec<Deck>, DeckServiceError> {
        Ok(self.decks.list_decks().await?)
    }

    /// All decks ordered due-first as of the clock's today.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn list_due(&self) -> Result<Vec<Deck>, DeckServiceError> {
        let decks = self.decks.list_decks().await?;
        Ok(list_due(decks, self.clock.today()))
    }

    /// Fetch a deck by ID.
    ///
    /// Returns `Ok(None)` when the deck does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn get_deck(&self, deck_id: DeckId) -> Result<Option<Deck>, DeckServiceError> {
        Ok(self.decks.get_deck(deck_id).await?)
    }

    /// Fetch a deck that must exist.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::NotFound` if it is missing.
    pub async fn require_deck(&self, deck_id: DeckId) -> Result<Deck, DeckServiceError> {
        self.get_deck(deck_id)
            .await?
            .ok_or(DeckServiceError::NotFound(deck_id))
    }

    /// Insert the sample decks when the store has no decks at all.
    ///
    /// Returns the ids of the decks created (empty when decks already exist).
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError` if listing or inserting fails.
    pub async fn seed_samples_if_empty(&self) -> Result<Vec<DeckId>, DeckServiceError> {
        if !self.decks.list_decks().await?.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::with_capacity(SAMPLE_DECK_NAMES.len());
        for name in SAMPLE_DECK_NAMES {
            ids.push(self.create_deck(name).await?);
        }
        info!(count = ids.len(), "sample decks seeded");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use spaced_core::time::fixed_now;
    use storage::repository::Storage;

    fn service() -> DeckService {
        let storage = Storage::in_memory();
        DeckService::new(Clock::Fixed(fixed_now()), storage.decks, storage.cards)
    }

    #[tokio::test]
    async fn create_deck_defaults_and_rejects_duplicates() {
        let service = service();
        let id = service.create_deck(" Animals ").await.unwrap();

        let deck = service.require_deck(id).await.unwrap();
        assert_eq!(deck.name(), "Animals");
        assert_eq!(deck.review_count(), 0);
        assert_eq!(deck.last_review_date(), None);
        assert_eq!(deck.next_review_date(), Clock::Fixed(fixed_now()).today());

        let err = service.create_deck("Animals").await.unwrap_err();
        assert!(matches!(err, DeckServiceError::DuplicateName(ref n) if n == "Animals"));
        let err = service.create_deck("   ").await.unwrap_err();
        assert!(matches!(err, DeckServiceError::Deck(_)));
        assert_eq!(service.list_decks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn seed_only_runs_on_an_empty_store() {
        let service = service();
        let seeded = service.seed_samples_if_empty().await.unwrap();
        assert_eq!(seeded.len(), SAMPLE_DECK_NAMES.len());
        assert!(service.seed_samples_if_empty().await.unwrap().is_empty());
        assert_eq!(service.list_decks().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn deleting_a_missing_deck_is_a_clean_no_op() {
        let service = service();
        let report = service.delete_deck(DeckId::new(99)).await.unwrap();
        assert!(!report.deck_removed);
        assert!(report.cards_removed.is_empty());
        assert!(report.is_complete());
    }
}

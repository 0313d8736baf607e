use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use spaced_core::model::{Card, CardId, Deck, DeckId, ValidatedCard};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Insert shape for a deck; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewDeckRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub next_review_date: NaiveDate,
}

impl NewDeckRecord {
    #[must_use]
    pub fn from_deck(deck: &Deck) -> Self {
        Self {
            name: deck.name().to_owned(),
            created_at: deck.created_at(),
            next_review_date: deck.next_review_date(),
        }
    }
}

/// Insert shape for a card; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewCardRecord {
    pub card: ValidatedCard,
}

impl NewCardRecord {
    #[must_use]
    pub fn new(card: ValidatedCard) -> Self {
        Self { card }
    }
}

/// Record store contract for decks.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Insert a new deck and return its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the name is taken, or other storage errors.
    async fn insert_new_deck(&self, deck: NewDeckRecord) -> Result<DeckId, StorageError>;

    /// Persist or update a deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck cannot be stored.
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError>;

    /// Fetch a deck by ID. `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError>;

    /// All decks in id order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_decks(&self) -> Result<Vec<Deck>, StorageError>;

    /// Delete a deck. Returns whether a record was removed; deleting an
    /// absent deck is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn delete_deck(&self, id: DeckId) -> Result<bool, StorageError>;
}

/// Record store contract for cards, with a secondary lookup by deck.
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Insert a new card and return its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the card cannot be stored.
    async fn insert_new_card(&self, card: NewCardRecord) -> Result<CardId, StorageError>;

    /// Persist or update a card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the card cannot be stored.
    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError>;

    /// Fetch a card by ID. `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_card(&self, id: CardId) -> Result<Option<Card>, StorageError>;

    /// Cards of a deck in stored (id) order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn cards_for_deck(&self, deck_id: DeckId) -> Result<Vec<Card>, StorageError>;

    /// Number of cards currently stored for a deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn count_cards(&self, deck_id: DeckId) -> Result<u32, StorageError>;

    /// Delete a card. Returns whether a record was removed; deleting an
    /// absent card is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn delete_card(&self, id: CardId) -> Result<bool, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryTables {
    decks: BTreeMap<DeckId, Deck>,
    cards: BTreeMap<CardId, Card>,
    next_deck_id: u64,
    next_card_id: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<MemoryTables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryTables>, StorageError> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Connection("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl DeckRepository for InMemoryRepository {
    async fn insert_new_deck(&self, deck: NewDeckRecord) -> Result<DeckId, StorageError> {
        let mut tables = self.lock()?;
        if tables.decks.values().any(|d| d.name() == deck.name.trim()) {
            return Err(StorageError::Conflict(format!("deck name '{}'", deck.name)));
        }
        tables.next_deck_id += 1;
        let id = DeckId::new(tables.next_deck_id);
        let stored = Deck::new(id, deck.name, deck.created_at, deck.next_review_date)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tables.decks.insert(id, stored);
        Ok(id)
    }

    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.next_deck_id = tables.next_deck_id.max(deck.id().value());
        tables.decks.insert(deck.id(), deck.clone());
        Ok(())
    }

    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError> {
        Ok(self.lock()?.decks.get(&id).cloned())
    }

    async fn list_decks(&self) -> Result<Vec<Deck>, StorageError> {
        Ok(self.lock()?.decks.values().cloned().collect())
    }

    async fn delete_deck(&self, id: DeckId) -> Result<bool, StorageError> {
        Ok(self.lock()?.decks.remove(&id).is_some())
    }
}

#[async_trait]
impl CardRepository for InMemoryRepository {
    async fn insert_new_card(&self, card: NewCardRecord) -> Result<CardId, StorageError> {
        let mut tables = self.lock()?;
        tables.next_card_id += 1;
        let id = CardId::new(tables.next_card_id);
        tables.cards.insert(id, card.card.assign_id(id));
        Ok(id)
    }

    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.next_card_id = tables.next_card_id.max(card.id().value());
        tables.cards.insert(card.id(), card.clone());
        Ok(())
    }

    async fn get_card(&self, id: CardId) -> Result<Option<Card>, StorageError> {
        Ok(self.lock()?.cards.get(&id).cloned())
    }

    async fn cards_for_deck(&self, deck_id: DeckId) -> Result<Vec<Card>, StorageError> {
        Ok(self
            .lock()?
            .cards
            .values()
            .filter(|c| c.deck_id() == deck_id)
            .cloned()
            .collect())
    }

    async fn count_cards(&self, deck_id: DeckId) -> Result<u32, StorageError> {
        let count = self
            .lock()?
            .cards
            .values()
            .filter(|c| c.deck_id() == deck_id)
            .count();
        u32::try_from(count).map_err(|_| StorageError::Serialization("card count overflow".into()))
    }

    async fn delete_card(&self, id: CardId) -> Result<bool, StorageError> {
        Ok(self.lock()?.cards.remove(&id).is_some())
    }
}

/// Repositories bundled for service construction.
#[derive(Clone)]
pub struct Storage {
    pub decks: Arc<dyn DeckRepository>,
    pub cards: Arc<dyn CardRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let decks: Arc<dyn DeckRepository> = Arc::new(repo.clone());
        let cards: Arc<dyn CardRepository> = Arc::new(repo);
        Self { decks, cards }
    }
}

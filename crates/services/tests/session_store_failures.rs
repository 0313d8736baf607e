use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use services::{AppController, Clock, ErrorKind};
use spaced_core::model::{Card, CardId, Deck, DeckId, Outcome};
use spaced_core::scheduler::Scheduler;
use spaced_core::time::fixed_now;
use storage::repository::{
    CardRepository, DeckRepository, InMemoryRepository, NewCardRecord, NewDeckRecord, Storage,
    StorageError,
};

/// Store whose writes fail while it is marked down. Reads always work.
#[derive(Clone)]
struct OutageStore {
    inner: InMemoryRepository,
    down: Arc<AtomicBool>,
}

impl OutageStore {
    fn new() -> Self {
        Self {
            inner: InMemoryRepository::new(),
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("write refused".into()));
        }
        Ok(())
    }

    fn storage(&self) -> Storage {
        let decks: Arc<dyn DeckRepository> = Arc::new(self.clone());
        let cards: Arc<dyn CardRepository> = Arc::new(self.clone());
        Storage { decks, cards }
    }
}

#[async_trait]
impl DeckRepository for OutageStore {
    async fn insert_new_deck(&self, deck: NewDeckRecord) -> Result<DeckId, StorageError> {
        self.check()?;
        self.inner.insert_new_deck(deck).await
    }

    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        self.check()?;
        self.inner.upsert_deck(deck).await
    }

    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError> {
        self.inner.get_deck(id).await
    }

    async fn list_decks(&self) -> Result<Vec<Deck>, StorageError> {
        self.inner.list_decks().await
    }

    async fn delete_deck(&self, id: DeckId) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.delete_deck(id).await
    }
}

#[async_trait]
impl CardRepository for OutageStore {
    async fn insert_new_card(&self, card: NewCardRecord) -> Result<CardId, StorageError> {
        self.check()?;
        self.inner.insert_new_card(card).await
    }

    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError> {
        self.check()?;
        self.inner.upsert_card(card).await
    }

    async fn get_card(&self, id: CardId) -> Result<Option<Card>, StorageError> {
        self.inner.get_card(id).await
    }

    async fn cards_for_deck(&self, deck_id: DeckId) -> Result<Vec<Card>, StorageError> {
        self.inner.cards_for_deck(deck_id).await
    }

    async fn count_cards(&self, deck_id: DeckId) -> Result<u32, StorageError> {
        self.inner.count_cards(deck_id).await
    }

    async fn delete_card(&self, id: CardId) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.delete_card(id).await
    }
}

async fn animals(store: &OutageStore) -> (AppController, DeckId, Vec<CardId>) {
    let mut controller =
        AppController::new(store.storage(), Clock::fixed(fixed_now()), Scheduler::new());
    let deck_id = controller.create_deck("Animals").await.unwrap();
    controller.select_deck(deck_id).await.unwrap();
    let mut ids = Vec::new();
    for (front, back) in [("dog", "inu"), ("cat", "neko")] {
        ids.push(controller.add_card(front, back).await.unwrap().id());
    }
    (controller, deck_id, ids)
}

async fn stored_card(store: &OutageStore, id: CardId) -> Card {
    store.inner.get_card(id).await.unwrap().unwrap()
}

#[tokio::test]
async fn failed_write_blocks_the_next_answer_until_it_lands() {
    let store = OutageStore::new();
    let (mut controller, deck_id, ids) = animals(&store).await;
    controller.start_review(false).await.unwrap();

    store.set_down(true);
    let err = controller.submit_answer(Outcome::Correct).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert!(controller.has_pending_writes());
    assert_eq!(stored_card(&store, ids[0]).await.total_answer_count(), 0);

    // Still down: the pending write fails again and "cat" is not answered.
    let err = controller.submit_answer(Outcome::Correct).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    let view = controller.session_view().unwrap();
    assert_eq!(view.current_card.unwrap().front(), "cat");
    assert_eq!(controller.session().unwrap().tally().answers, 1);

    store.set_down(false);
    let result = controller.submit_answer(Outcome::Correct).await.unwrap();
    assert!(result.is_complete);
    assert_eq!(result.effect.completed.unwrap().stats.answers(), 2);
    assert!(!controller.has_pending_writes());

    for id in ids {
        let card = stored_card(&store, id).await;
        assert_eq!(card.total_answer_count(), 1);
        assert_eq!(card.correct_count(), 1);
    }
    let deck = store.inner.get_deck(deck_id).await.unwrap().unwrap();
    assert_eq!(deck.review_count(), 1);
    assert_eq!(deck.card_count(), 2);
}

#[tokio::test]
async fn cancel_and_restart_keep_unsaved_answers() {
    let store = OutageStore::new();
    let (mut controller, _deck_id, ids) = animals(&store).await;
    controller.start_review(false).await.unwrap();
    let session_id = controller.session().unwrap().id();

    store.set_down(true);
    controller.submit_answer(Outcome::Incorrect).await.unwrap_err();

    let err = controller.start_review(true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(controller.session().unwrap().id(), session_id);

    let err = controller.cancel_session().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert!(controller.session().is_some());

    store.set_down(false);
    controller.cancel_session().await.unwrap();
    assert!(controller.session().is_none());

    let dog = stored_card(&store, ids[0]).await;
    assert_eq!(dog.total_answer_count(), 1);
    assert_eq!(dog.correct_count(), 0);
    assert_eq!(stored_card(&store, ids[1]).await.total_answer_count(), 0);
}

#[tokio::test]
async fn retry_stores_a_pass_finished_during_an_outage() {
    let store = OutageStore::new();
    let (mut controller, deck_id, ids) = animals(&store).await;
    controller.start_review(false).await.unwrap();
    controller.submit_answer(Outcome::Correct).await.unwrap();

    store.set_down(true);
    controller.submit_answer(Outcome::Correct).await.unwrap_err();
    assert!(controller.session().unwrap().is_complete());
    assert!(controller.retry_pending_writes().await.is_err());
    assert_eq!(
        store.inner.get_deck(deck_id).await.unwrap().unwrap().review_count(),
        0
    );

    store.set_down(false);
    controller.retry_pending_writes().await.unwrap();
    assert!(!controller.has_pending_writes());
    assert_eq!(stored_card(&store, ids[1]).await.total_answer_count(), 1);
    let deck = store.inner.get_deck(deck_id).await.unwrap().unwrap();
    assert_eq!(deck.review_count(), 1);
}

use std::sync::Arc;

use spaced_core::model::{
    Card, CardId, DeckId, DisplayMode, OrderMode, Outcome, RepeatMode, ReviewOptions, SessionState,
    SessionStats,
};
use spaced_core::scheduler::Scheduler;
use storage::repository::Storage;
use tokio::sync::broadcast;
use tracing::debug;

use crate::Clock;
use crate::card_service::CardService;
use crate::deck_service::{CascadeReport, DeckService};
use crate::error::ControllerError;
use crate::listing::{DEFAULT_PAGE_SIZE, due_subset, page, page_count};
use crate::sessions::{DeckListItem, ReviewSession, SessionAnswerResult, SessionLoopService, SessionView};

const EVENT_CAPACITY: usize = 64;

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    DeckListChanged,
    SessionStateChanged {
        state: SessionState,
        current_card: Option<Card>,
        showing_front: bool,
    },
    SessionCompleted(SessionStats),
}

/// One page of the due-ordered deck list.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckPage {
    pub page_number: usize,
    pub page_count: usize,
    /// Due decks across all pages.
    pub due_count: usize,
    pub items: Vec<DeckListItem>,
}

/// Owns the services, the mode flags and at most one active session.
///
/// Commands take `&mut self` and await each store write before returning,
/// so writes for one entity never overlap.
pub struct AppController {
    clock: Clock,
    decks: DeckService,
    cards: CardService,
    sessions: SessionLoopService,
    options: ReviewOptions,
    selected_deck: Option<DeckId>,
    session: Option<ReviewSession>,
    page_size: usize,
    events: broadcast::Sender<AppEvent>,
}

impl AppController {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock, scheduler: Scheduler) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            clock,
            decks: DeckService::new(clock, Arc::clone(&storage.decks), Arc::clone(&storage.cards)),
            cards: CardService::new(clock, Arc::clone(&storage.decks), Arc::clone(&storage.cards)),
            sessions: SessionLoopService::new(clock, scheduler, storage.decks, storage.cards),
            options: ReviewOptions::default(),
            selected_deck: None,
            session: None,
            page_size: DEFAULT_PAGE_SIZE,
            events,
        }
    }

    /// Controller over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock, scheduler: Scheduler) -> Self {
        Self::new(Storage::in_memory(), clock, scheduler)
    }

    /// Controller backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Sqlite` if connecting or migrating fails.
    pub async fn sqlite(db_url: &str, clock: Clock, scheduler: Scheduler) -> Result<Self, ControllerError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(storage, clock, scheduler))
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.sessions = self.sessions.with_shuffle_seed(seed);
        self
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn deck_service(&self) -> &DeckService {
        &self.decks
    }

    #[must_use]
    pub fn card_service(&self) -> &CardService {
        &self.cards
    }

    #[must_use]
    pub fn options(&self) -> ReviewOptions {
        self.options
    }

    #[must_use]
    pub fn selected_deck(&self) -> Option<DeckId> {
        self.selected_deck
    }

    #[must_use]
    pub fn session(&self) -> Option<&ReviewSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn session_view(&self) -> Option<SessionView> {
        self.session.as_ref().map(SessionView::from_session)
    }

    fn emit(&self, event: AppEvent) {
        // Nobody listening is fine.
        if self.events.send(event).is_err() {
            debug!("no event subscribers");
        }
    }

    fn emit_session_state(&self) {
        let event = match &self.session {
            Some(session) => AppEvent::SessionStateChanged {
                state: session.state(),
                current_card: session.current_card().cloned(),
                showing_front: session.showing_front(),
            },
            None => AppEvent::SessionStateChanged {
                state: SessionState::Idle,
                current_card: None,
                showing_front: true,
            },
        };
        self.emit(event);
    }

    //
    // ─── DECKS & CARDS ─────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `ControllerError::Deck` for validation or storage failures.
    pub async fn create_deck(&mut self, name: &str) -> Result<DeckId, ControllerError> {
        let id = self.decks.create_deck(name).await?;
        self.emit(AppEvent::DeckListChanged);
        Ok(id)
    }

    /// Delete a deck and its cards. Ends any session or selection on it.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Deck`; a partial cascade still emits
    /// `DeckListChanged` since the deck itself is gone.
    pub async fn delete_deck(&mut self, deck_id: DeckId) -> Result<CascadeReport, ControllerError> {
        if self.session.as_ref().is_some_and(|s| s.deck().id() == deck_id) {
            self.session = None;
            self.emit_session_state();
        }
        if self.selected_deck == Some(deck_id) {
            self.selected_deck = None;
        }
        let result = self.decks.delete_deck(deck_id).await;
        self.emit(AppEvent::DeckListChanged);
        Ok(result?)
    }

    /// Add a card to the selected deck.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Card` when no deck is selected, a face is
    /// blank, or storage fails.
    pub async fn add_card(&mut self, front: &str, back: &str) -> Result<Card, ControllerError> {
        let card = self.cards.add_card(self.selected_deck, front, back).await?;
        self.emit(AppEvent::DeckListChanged);
        Ok(card)
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Card` if storage fails.
    pub async fn delete_card(&mut self, card_id: CardId) -> Result<bool, ControllerError> {
        let removed = self.cards.delete_card(card_id).await?;
        if removed {
            self.emit(AppEvent::DeckListChanged);
        }
        Ok(removed)
    }

    /// Page of the deck list, due decks first.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Deck` if storage fails.
    pub async fn deck_page(&self, page_number: usize) -> Result<DeckPage, ControllerError> {
        let today = self.clock.today();
        let decks = self.decks.list_due().await?;
        let items = page(&decks, page_number, self.page_size)
            .iter()
            .map(|deck| DeckListItem::from_deck(deck, today))
            .collect();
        Ok(DeckPage {
            page_number,
            page_count: page_count(decks.len(), self.page_size),
            due_count: due_subset(&decks, today).len(),
            items,
        })
    }

    /// Insert the sample decks on first launch.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Deck` if storage fails.
    pub async fn seed_samples(&mut self) -> Result<Vec<DeckId>, ControllerError> {
        let ids = self.decks.seed_samples_if_empty().await?;
        if !ids.is_empty() {
            self.emit(AppEvent::DeckListChanged);
        }
        Ok(ids)
    }

    //
    // ─── SESSION COMMANDS ──────────────────────────────────────────────────────
    //

    /// Select the deck that card commands and `start_review` act on.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Deck` if the deck does not exist.
    pub async fn select_deck(&mut self, deck_id: DeckId) -> Result<(), ControllerError> {
        self.decks.require_deck(deck_id).await?;
        self.selected_deck = Some(deck_id);
        Ok(())
    }

    /// Start a pass over the selected deck with the current mode flags,
    /// replacing any session in progress once its pending writes are stored.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Card` when no deck is selected, or
    /// `ControllerError::Session` when the deck cannot be reviewed now or the
    /// previous session's writes still fail. The previous session is kept in
    /// that case.
    pub async fn start_review(&mut self, force: bool) -> Result<SessionView, ControllerError> {
        let deck_id = self
            .selected_deck
            .ok_or(crate::error::CardServiceError::NoDeckSelected)?;
        self.flush_session().await?;
        let session = self.sessions.start_session(deck_id, self.options, force).await?;
        let view = SessionView::from_session(&session);
        self.session = Some(session);
        self.emit_session_state();
        Ok(view)
    }

    /// # Errors
    ///
    /// Returns `ControllerError::NoActiveSession`, or `ControllerError::Session`
    /// for state and storage failures.
    pub async fn submit_answer(&mut self, outcome: Outcome) -> Result<SessionAnswerResult, ControllerError> {
        let session = self.session.as_mut().ok_or(ControllerError::NoActiveSession)?;
        let result = self.sessions.answer_current(session, outcome).await;
        self.emit_session_state();
        let result = result?;

        if let Some(completion) = &result.effect.completed {
            self.emit(AppEvent::SessionCompleted(completion.stats.clone()));
            self.emit(AppEvent::DeckListChanged);
        }
        Ok(result)
    }

    /// Retry writes a failed answer left pending.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NoActiveSession` or the storage failure.
    pub async fn retry_pending_writes(&mut self) -> Result<(), ControllerError> {
        if self.session.is_none() {
            return Err(ControllerError::NoActiveSession);
        }
        self.flush_session().await
    }

    #[must_use]
    pub fn has_pending_writes(&self) -> bool {
        self.session.as_ref().is_some_and(ReviewSession::has_pending_writes)
    }

    async fn flush_session(&mut self) -> Result<(), ControllerError> {
        if let Some(session) = self.session.as_mut() {
            self.sessions.finalize_pass(session).await?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ControllerError::NoActiveSession` or a state error.
    pub fn flip_card(&mut self) -> Result<bool, ControllerError> {
        let session = self.session.as_mut().ok_or(ControllerError::NoActiveSession)?;
        let showing_front = session.flip()?;
        self.emit_session_state();
        Ok(showing_front)
    }

    /// Drop the active session without touching deck scheduling.
    ///
    /// Answers already given are stored first.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Session` if those writes fail. The session
    /// stays active so the caller can retry or cancel again.
    pub async fn cancel_session(&mut self) -> Result<(), ControllerError> {
        self.flush_session().await?;
        if let Some(mut session) = self.session.take() {
            session.cancel();
            self.emit_session_state();
        }
        Ok(())
    }

    //
    // ─── MODE FLAGS ────────────────────────────────────────────────────────────
    //
    // Flags apply from the next `start_review`.

    pub fn set_order_mode(&mut self, order: OrderMode) {
        self.options.order = order;
    }

    pub fn set_reverse_mode(&mut self, reverse: bool) {
        self.options.display = if reverse {
            DisplayMode::Reverse
        } else {
            DisplayMode::Normal
        };
    }

    pub fn set_repeat_mode(&mut self, repeat: RepeatMode) {
        self.options.repeat = repeat;
    }

    pub fn set_learning_mode(&mut self, learning: bool) {
        self.options.learning = learning;
    }

    pub fn set_requeue_missed(&mut self, requeue_missed: bool) {
        self.options.requeue_missed = requeue_missed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spaced_core::time::fixed_now;

    #[tokio::test]
    async fn commands_emit_events() {
        let mut controller = AppController::in_memory(Clock::Fixed(fixed_now()), Scheduler::new());
        let mut events = controller.subscribe();

        let deck_id = controller.create_deck("Animals").await.unwrap();
        assert_eq!(events.try_recv().unwrap(), AppEvent::DeckListChanged);

        controller.select_deck(deck_id).await.unwrap();
        controller.add_card("dog", "inu").await.unwrap();
        assert_eq!(events.try_recv().unwrap(), AppEvent::DeckListChanged);

        controller.start_review(false).await.unwrap();
        match events.try_recv().unwrap() {
            AppEvent::SessionStateChanged {
                state,
                current_card,
                showing_front,
            } => {
                assert_eq!(state, SessionState::InProgress);
                assert_eq!(current_card.unwrap().front(), "dog");
                assert!(showing_front);
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(!controller.flip_card().unwrap());
        assert!(matches!(
            events.try_recv().unwrap(),
            AppEvent::SessionStateChanged { showing_front: false, .. }
        ));

        controller.submit_answer(Outcome::Correct).await.unwrap();
        assert!(matches!(
            events.try_recv().unwrap(),
            AppEvent::SessionStateChanged { state: SessionState::Completed, .. }
        ));
        match events.try_recv().unwrap() {
            AppEvent::SessionCompleted(stats) => assert_eq!(stats.answers(), 1),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events.try_recv().unwrap(), AppEvent::DeckListChanged);
    }

    #[tokio::test]
    async fn commands_without_session_or_selection_fail_cleanly() {
        let mut controller = AppController::in_memory(Clock::Fixed(fixed_now()), Scheduler::new());
        assert!(matches!(
            controller.submit_answer(Outcome::Correct).await,
            Err(ControllerError::NoActiveSession)
        ));
        assert!(matches!(controller.flip_card(), Err(ControllerError::NoActiveSession)));
        let err = controller.add_card("q", "a").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        controller.cancel_session().await.unwrap();
        assert!(matches!(
            controller.retry_pending_writes().await,
            Err(ControllerError::NoActiveSession)
        ));
        assert!(!controller.has_pending_writes());
    }
}

use chrono::NaiveDate;

use spaced_core::model::{Card, Deck, DeckId, DueStatus, SessionState};

use super::progress::SessionProgress;
use super::service::ReviewSession;

/// Snapshot of a session for presentation.
///
/// Not a UI view-model: no pre-formatted strings, the caller decides how to
/// render faces, progress and state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub deck_id: DeckId,
    pub state: SessionState,
    pub current_card: Option<Card>,
    pub showing_front: bool,
    pub visible_face: Option<String>,
    pub progress: SessionProgress,
}

impl SessionView {
    #[must_use]
    pub fn from_session(session: &ReviewSession) -> Self {
        Self {
            deck_id: session.deck().id(),
            state: session.state(),
            current_card: session.current_card().cloned(),
            showing_front: session.showing_front(),
            visible_face: session.visible_face().map(str::to_owned),
            progress: session.progress(),
        }
    }
}

/// Deck row for list views, evaluated against a given day.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckListItem {
    pub deck_id: DeckId,
    pub name: String,
    pub card_count: u32,
    pub review_count: u32,
    pub next_review_date: NaiveDate,
    pub due_status: DueStatus,
    /// Negative when overdue.
    pub days_until_due: i64,
    pub time_saved_percent: f64,
}

impl DeckListItem {
    #[must_use]
    pub fn from_deck(deck: &Deck, today: NaiveDate) -> Self {
        Self {
            deck_id: deck.id(),
            name: deck.name().to_owned(),
            card_count: deck.card_count(),
            review_count: deck.review_count(),
            next_review_date: deck.next_review_date(),
            due_status: deck.due_status(today),
            days_until_due: deck.days_until_due(today),
            time_saved_percent: deck.time_saved_percent(),
        }
    }
}

//! Shared error types for the services crate.

use thiserror::Error;

use spaced_core::model::{CardError, CardId, DeckError, DeckId, SessionStatsError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::deck_service::CascadeReport;

/// Coarse classification shared by every service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; nothing was mutated.
    Validation,
    /// The deck or card is gone; the operation was aborted.
    NotFound,
    /// The record store failed; state is left resumable.
    Store,
    /// The command does not apply to the current session state.
    State,
}

fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Store,
    }
}

/// Errors emitted by `DeckService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeckServiceError {
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error("a deck named '{0}' already exists")]
    DuplicateName(String),
    #[error("deck {0} not found")]
    NotFound(DeckId),
    #[error(
        "deck {} delete incomplete: {} card(s) removed, {} failed",
        .0.deck_id,
        .0.cards_removed.len(),
        .0.cards_failed.len()
    )]
    PartialDelete(CascadeReport),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DeckServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Deck(_) | Self::DuplicateName(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PartialDelete(_) => ErrorKind::Store,
            Self::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by `CardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CardServiceError {
    #[error(transparent)]
    Card(#[from] CardError),
    #[error("no deck selected")]
    NoDeckSelected,
    #[error("deck {0} not found")]
    DeckNotFound(DeckId),
    #[error("card {0} not found")]
    CardNotFound(CardId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CardServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Card(_) | Self::NoDeckSelected => ErrorKind::Validation,
            Self::DeckNotFound(_) | Self::CardNotFound(_) => ErrorKind::NotFound,
            Self::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no cards available for session")]
    Empty,
    #[error("deck {deck_id} is not due until {next_review_date}")]
    NotDue {
        deck_id: DeckId,
        next_review_date: chrono::NaiveDate,
    },
    #[error("deck {0} was already reviewed today")]
    AlreadyReviewedToday(DeckId),
    #[error("deck {0} not found")]
    DeckNotFound(DeckId),
    #[error("session is not in progress")]
    NotInProgress,
    #[error("session was already started")]
    AlreadyStarted,
    #[error(transparent)]
    Stats(#[from] SessionStatsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty
            | Self::NotDue { .. }
            | Self::AlreadyReviewedToday(_)
            | Self::NotInProgress
            | Self::AlreadyStarted
            | Self::Stats(_) => ErrorKind::State,
            Self::DeckNotFound(_) => ErrorKind::NotFound,
            Self::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by the app controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error("no review session is active")]
    NoActiveSession,
    #[error(transparent)]
    Deck(#[from] DeckServiceError),
    #[error(transparent)]
    Card(#[from] CardServiceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

impl ControllerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoActiveSession => ErrorKind::State,
            Self::Deck(e) => e.kind(),
            Self::Card(e) => e.kind(),
            Self::Session(e) => e.kind(),
            Self::Sqlite(_) => ErrorKind::Store,
        }
    }
}

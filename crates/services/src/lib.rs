#![forbid(unsafe_code)]

pub mod card_service;
pub mod controller;
pub mod deck_service;
pub mod error;
pub mod listing;
pub mod sessions;

pub use spaced_core::Clock;

pub use card_service::CardService;
pub use controller::{AppController, AppEvent, DeckPage};
pub use deck_service::{CascadeReport, DeckService, SAMPLE_DECK_NAMES};
pub use error::{
    CardServiceError, ControllerError, DeckServiceError, ErrorKind, SessionError,
};
pub use sessions::{
    AnswerEffect, DeckListItem, PassCompletion, ReviewSession, SessionAnswerResult,
    SessionLoopService, SessionProgress, SessionView,
};

mod plan;
mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use service::{AnswerEffect, PassCompletion, ReviewSession};
pub use view::{DeckListItem, SessionView};
pub use workflow::{SessionAnswerResult, SessionLoopService};

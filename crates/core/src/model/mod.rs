mod card;
mod deck;
mod ids;
mod review;
mod session;

pub use ids::{CardId, DeckId, ParseIdError, SessionId};

pub use card::{correct_ratio, Card, CardDraft, CardError, ValidatedCard};
pub use deck::{Deck, DeckError, DueStatus};
pub use review::{DisplayMode, OrderMode, Outcome, RepeatMode, ReviewOptions};
pub use session::{AnswerTally, SessionState, SessionStats, SessionStatsError};

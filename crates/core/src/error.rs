use thiserror::Error;

use crate::model::{CardError, DeckError, SessionStatsError};
use crate::scheduler::SchedulerError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    SessionStats(#[from] SessionStatsError),
}

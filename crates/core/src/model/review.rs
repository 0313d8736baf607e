use serde::{Deserialize, Serialize};

/// Result of a single answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
}

impl Outcome {
    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Outcome::Correct)
    }
}

/// Order in which a deck's cards enter the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    /// Stored order.
    #[default]
    Sequential,
    /// Uniform shuffle at the start of every round.
    Random,
}

/// Which face is shown first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Normal,
    Reverse,
}

/// What a new round contains after a round ended with unrecovered misses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Every card of the original set again.
    #[default]
    AllRepeat,
    /// Only the cards missed in the previous round.
    StrictRepeat,
}

/// Mode flags for a review session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOptions {
    pub order: OrderMode,
    pub display: DisplayMode,
    pub repeat: RepeatMode,
    /// Drill without recording answers or touching the schedule.
    pub learning: bool,
    /// Reinsert a missed card after the next one instead of waiting for the
    /// end of the round.
    pub requeue_missed: bool,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            order: OrderMode::default(),
            display: DisplayMode::default(),
            repeat: RepeatMode::default(),
            learning: false,
            requeue_missed: true,
        }
    }
}

impl ReviewOptions {
    #[must_use]
    pub fn shows_front_first(&self) -> bool {
        matches!(self.display, DisplayMode::Normal)
    }
}

//! Match configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a match session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Round wins that end the game early.
    pub wins_required: u32,

    /// Hard cap on rounds played. The game ends after this round even
    /// if nobody reached `wins_required`.
    pub max_rounds: u32,

    /// Pause between a round's result and the next `round_start`.
    /// Zero sends the next round immediately.
    pub round_delay: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            wins_required: 2,
            max_rounds: 3,
            round_delay: Duration::ZERO,
        }
    }
}

//! Error types for the match layer.

use skirmish_protocol::{EndpointId, SessionId};

/// Errors that can occur while playing a match.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The endpoint is not one of the session's two players.
    #[error("endpoint {0} is not a player in {1}")]
    NotAPlayer(EndpointId, SessionId),

    /// The submitted value is not rock, paper, or scissors.
    #[error("invalid choice {0:?}: use rock, paper, or scissors")]
    InvalidChoice(String),

    /// The session has already ended; the request was ignored.
    #[error("{0} has already ended")]
    Ended(SessionId),
}

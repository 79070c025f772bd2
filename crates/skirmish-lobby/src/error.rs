//! Error types for the lobby layer.

use skirmish_match::MatchError;
use skirmish_protocol::{EndpointId, SessionId};

/// Errors that can occur during matchmaking.
///
/// Every variant except `NotFound` is also sent to the requester as an
/// `error` event carrying this Display text.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The endpoint is not registered.
    #[error("endpoint {0} not found")]
    NotFound(EndpointId),

    /// Joining needs a non-empty name.
    #[error("name cannot be empty")]
    InvalidName,

    /// Another waiting player already uses this name.
    #[error("name {0:?} is already taken")]
    NameTaken(String),

    /// The endpoint is already in the waiting pool.
    #[error("already waiting for an opponent")]
    AlreadyWaiting,

    /// The endpoint is playing in a live session.
    #[error("already playing in {0}")]
    AlreadyInMatch(SessionId),

    /// A choice arrived from an endpoint with no live session.
    #[error("not in a match")]
    NotInMatch,

    /// The session rejected the request.
    #[error(transparent)]
    Match(#[from] MatchError),
}

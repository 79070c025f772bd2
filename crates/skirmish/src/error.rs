//! Unified error type for Skirmish.

use skirmish_lobby::LobbyError;
use skirmish_match::MatchError;
use skirmish_protocol::ProtocolError;
use skirmish_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SkirmishError {
    /// A transport-level error (bind, routing, read, write).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown event).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A matchmaking rejection.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A match session rejection.
    #[error(transparent)]
    Match(#[from] MatchError),
}

#[cfg(test)]
mod tests {
    use skirmish_protocol::SessionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::TimedOut("read");
        let skirmish_err: SkirmishError = err.into();
        assert!(matches!(skirmish_err, SkirmishError::Transport(_)));
        assert_eq!(skirmish_err.to_string(), "read timed out");
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownType("teleport".into());
        let skirmish_err: SkirmishError = err.into();
        assert!(matches!(skirmish_err, SkirmishError::Protocol(_)));
        assert!(skirmish_err.to_string().contains("teleport"));
    }

    #[test]
    fn test_from_lobby_error_keeps_client_facing_text() {
        let skirmish_err: SkirmishError = LobbyError::InvalidName.into();
        assert!(matches!(skirmish_err, SkirmishError::Lobby(_)));
        assert_eq!(skirmish_err.to_string(), "name cannot be empty");
    }

    #[test]
    fn test_from_match_error() {
        let skirmish_err: SkirmishError = MatchError::Ended(SessionId(4)).into();
        assert!(matches!(skirmish_err, SkirmishError::Match(_)));
        assert!(skirmish_err.to_string().contains("match-4"));
    }
}

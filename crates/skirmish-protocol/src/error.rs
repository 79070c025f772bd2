//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// A `ProtocolError` on an inbound message is never fatal to the
/// connection: the supervisor logs it and drops the message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes are not a valid envelope, or the payload does not
    /// match the event type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope's `type` is not an event clients may send.
    #[error("unknown event type: {0:?}")]
    UnknownType(String),

    /// The value is not one of `rock`, `paper`, `scissors`.
    #[error("invalid choice {0:?}: use rock, paper, or scissors")]
    InvalidChoice(String),
}

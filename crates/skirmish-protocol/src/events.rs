//! Events exchanged between clients and the server.
//!
//! Inbound messages are decoded in two steps: first the generic
//! [`Envelope`], then the payload for the envelope's `type`. This keeps an
//! unknown `type` distinguishable from a known type with a bad payload,
//! and lets payload-less events carry `"data": {}`, `"data": null`, or no
//! `data` at all.
//!
//! Outbound messages are a single adjacently tagged enum, so
//! `ServerEvent::RoundStart { round_number: 2 }` encodes as
//! `{"type":"round_start","data":{"round_number":2}}`.

use serde::{Deserialize, Serialize};

use crate::{Choice, Outcome, ProtocolError};

/// The generic wire envelope: `{ "type": ..., "data": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The event name.
    #[serde(rename = "type")]
    pub kind: String,

    /// The event payload, opaque until `kind` is known.
    #[serde(default)]
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Enter matchmaking under a display name.
    Join { name: String },

    /// Submit a move for the current round.
    ///
    /// Kept as the raw string: an unknown value is a game-level rejection
    /// answered by the match session, not a protocol error.
    MakeChoice { choice: String },

    /// Go back into matchmaking after a game ended.
    PlayAgain,

    /// Close this connection.
    Disconnect,
}

#[derive(Deserialize)]
struct JoinData {
    name: String,
}

#[derive(Deserialize)]
struct MakeChoiceData {
    choice: String,
}

impl ClientEvent {
    pub const JOIN: &'static str = "join";
    pub const MAKE_CHOICE: &'static str = "make_choice";
    pub const PLAY_AGAIN: &'static str = "play_again";
    pub const DISCONNECT: &'static str = "disconnect";

    /// The wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => Self::JOIN,
            Self::MakeChoice { .. } => Self::MAKE_CHOICE,
            Self::PlayAgain => Self::PLAY_AGAIN,
            Self::Disconnect => Self::DISCONNECT,
        }
    }
}

impl TryFrom<Envelope> for ClientEvent {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        match envelope.kind.as_str() {
            Self::JOIN => {
                let data: JoinData =
                    serde_json::from_value(envelope.data).map_err(ProtocolError::Decode)?;
                Ok(Self::Join { name: data.name })
            }
            Self::MAKE_CHOICE => {
                let data: MakeChoiceData =
                    serde_json::from_value(envelope.data).map_err(ProtocolError::Decode)?;
                Ok(Self::MakeChoice {
                    choice: data.choice,
                })
            }
            Self::PLAY_AGAIN => Ok(Self::PlayAgain),
            Self::DISCONNECT => Ok(Self::Disconnect),
            _ => Err(ProtocolError::UnknownType(envelope.kind)),
        }
    }
}

impl From<&ClientEvent> for Envelope {
    fn from(event: &ClientEvent) -> Self {
        let data = match event {
            ClientEvent::Join { name } => serde_json::json!({ "name": name }),
            ClientEvent::MakeChoice { choice } => serde_json::json!({ "choice": choice }),
            ClientEvent::PlayAgain | ClientEvent::Disconnect => serde_json::json!({}),
        };
        Envelope {
            kind: event.kind().to_string(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// No opponent yet; the client is in the waiting pool.
    Waiting {},

    /// Paired with an opponent. Always precedes the first `round_start`.
    MatchFound { opponent_name: String },

    /// A new round is open for choices.
    RoundStart { round_number: u32 },

    /// Both choices are in; the round's result from the receiver's side.
    RoundResult {
        result: Outcome,
        your_choice: Choice,
        opponent_choice: Choice,
    },

    /// The game is over. `score` is `"<own wins>-<opponent wins>"`.
    GameEnded { result: Outcome, score: String },

    /// A request was rejected. The connection stays open.
    Error { message: String },
}

impl ServerEvent {
    /// Shorthand for an `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The wire name of this event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Waiting {} => "waiting",
            Self::MatchFound { .. } => "match_found",
            Self::RoundStart { .. } => "round_start",
            Self::RoundResult { .. } => "round_result",
            Self::GameEnded { .. } => "game_ended",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    //! The wire shapes below are what clients parse; a serde attribute
    //! change that breaks one of these breaks every client.

    use super::*;

    fn decode(json: &str) -> Result<ClientEvent, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(json).map_err(ProtocolError::Decode)?;
        ClientEvent::try_from(envelope)
    }

    // =====================================================================
    // Client events
    // =====================================================================

    #[test]
    fn test_client_event_join_decodes_name() {
        let event = decode(r#"{"type":"join","data":{"name":"Alice"}}"#).unwrap();
        assert_eq!(event, ClientEvent::Join { name: "Alice".into() });
    }

    #[test]
    fn test_client_event_make_choice_keeps_raw_value() {
        let event = decode(r#"{"type":"make_choice","data":{"choice":"lizard"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::MakeChoice {
                choice: "lizard".into()
            }
        );
    }

    #[test]
    fn test_client_event_payloadless_accepts_any_data_shape() {
        for json in [
            r#"{"type":"play_again"}"#,
            r#"{"type":"play_again","data":null}"#,
            r#"{"type":"play_again","data":{}}"#,
        ] {
            assert_eq!(decode(json).unwrap(), ClientEvent::PlayAgain, "{json}");
        }
        assert_eq!(
            decode(r#"{"type":"disconnect","data":{}}"#).unwrap(),
            ClientEvent::Disconnect
        );
    }

    #[test]
    fn test_client_event_join_missing_name_is_decode_error() {
        let result = decode(r#"{"type":"join","data":{}}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_client_event_unknown_type_is_rejected() {
        let result = decode(r#"{"type":"join_lobby","data":{"name":"x"}}"#);
        assert!(matches!(result, Err(ProtocolError::UnknownType(t)) if t == "join_lobby"));
    }

    #[test]
    fn test_envelope_missing_type_is_decode_error() {
        let result = decode(r#"{"data":{"name":"x"}}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_client_event_into_envelope_decodes_back() {
        let event = ClientEvent::MakeChoice {
            choice: "rock".into(),
        };
        let envelope = Envelope::from(&event);
        assert_eq!(envelope.kind, "make_choice");
        assert_eq!(envelope.data["choice"], "rock");
        assert_eq!(ClientEvent::try_from(envelope).unwrap(), event);
    }

    // =====================================================================
    // Server events
    // =====================================================================

    #[test]
    fn test_server_event_waiting_has_empty_data_object() {
        let json = serde_json::to_value(ServerEvent::Waiting {}).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "waiting", "data": {} }));
    }

    #[test]
    fn test_server_event_match_found_json_format() {
        let json = serde_json::to_value(ServerEvent::MatchFound {
            opponent_name: "Bob".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "match_found");
        assert_eq!(json["data"]["opponent_name"], "Bob");
    }

    #[test]
    fn test_server_event_round_result_json_format() {
        let json = serde_json::to_value(ServerEvent::RoundResult {
            result: Outcome::Win,
            your_choice: Choice::Rock,
            opponent_choice: Choice::Scissors,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "round_result",
                "data": {
                    "result": "win",
                    "your_choice": "rock",
                    "opponent_choice": "scissors"
                }
            })
        );
    }

    #[test]
    fn test_server_event_game_ended_json_format() {
        let json = serde_json::to_value(ServerEvent::GameEnded {
            result: Outcome::Draw,
            score: "1-1".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "game_ended");
        assert_eq!(json["data"]["result"], "draw");
        assert_eq!(json["data"]["score"], "1-1");
    }

    #[test]
    fn test_server_event_error_helper() {
        let event = ServerEvent::error("name already taken");
        assert_eq!(event.kind(), "error");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["message"], "name already taken");
    }
}

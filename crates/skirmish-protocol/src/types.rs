//! Identities and game values that appear in event payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of one connected party.
///
/// Minted by the supervisor when a connection is accepted. Other
/// components only compare and print it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one match session, allocated from the matchmaker's
/// monotonically increasing counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// One of the three moves a player can make in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    /// Every choice, in wire order.
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = ProtocolError;

    /// Exact, lowercase match only: `"Rock"` is rejected like any other
    /// unknown value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rock" => Ok(Self::Rock),
            "paper" => Ok(Self::Paper),
            "scissors" => Ok(Self::Scissors),
            other => Err(ProtocolError::InvalidChoice(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// The result of a round or a whole game, from one player's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    Draw,
}

impl Outcome {
    /// The same result seen from the opponent's side.
    pub fn flip(self) -> Self {
        match self {
            Self::Win => Self::Lose,
            Self::Lose => Self::Win,
            Self::Draw => Self::Draw,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Win => "win",
            Self::Lose => "lose",
            Self::Draw => "draw",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&EndpointId::new("20250101120000-abcdEFGH")).unwrap();
        assert_eq!(json, "\"20250101120000-abcdEFGH\"");
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId(3).to_string(), "match-3");
    }

    #[test]
    fn test_choice_from_str_accepts_lowercase_only() {
        assert_eq!("rock".parse::<Choice>().unwrap(), Choice::Rock);
        assert_eq!("paper".parse::<Choice>().unwrap(), Choice::Paper);
        assert_eq!("scissors".parse::<Choice>().unwrap(), Choice::Scissors);
        assert!(matches!(
            "Rock".parse::<Choice>(),
            Err(ProtocolError::InvalidChoice(s)) if s == "Rock"
        ));
        assert!("lizard".parse::<Choice>().is_err());
        assert!("".parse::<Choice>().is_err());
    }

    #[test]
    fn test_choice_serde_matches_display() {
        for choice in Choice::ALL {
            let json = serde_json::to_string(&choice).unwrap();
            assert_eq!(json, format!("\"{choice}\""));
        }
    }

    #[test]
    fn test_outcome_flip() {
        assert_eq!(Outcome::Win.flip(), Outcome::Lose);
        assert_eq!(Outcome::Lose.flip(), Outcome::Win);
        assert_eq!(Outcome::Draw.flip(), Outcome::Draw);
    }
}

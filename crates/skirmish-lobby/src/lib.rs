//! Matchmaking for Skirmish.
//!
//! The [`Matchmaker`] owns the registry of connected endpoints, the waiting
//! pool, and the table of live match sessions, all behind one lock. It
//! pairs players, starts sessions, routes in-game choices, and tears
//! sessions down when they report they have ended.
//!
//! # Lock order
//!
//! ```text
//! Matchmaker registry → MatchSession round state → Endpoint state
//! ```
//!
//! Nothing ever acquires these right to left. A session reports its end
//! through [`SessionObserver`](skirmish_match::SessionObserver) on a
//! detached task, so it never reaches back into the registry while
//! holding its own lock.

mod error;
mod matchmaker;

pub use error::LobbyError;
pub use matchmaker::{JoinOutcome, Matchmaker};

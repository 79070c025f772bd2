//! Match sessions for Skirmish.
//!
//! A [`MatchSession`] is one best-of-three game between exactly two
//! endpoints. It owns round progression, the score, and termination, and
//! talks to its players only through their non-blocking outbound queues.
//!
//! # Key types
//!
//! - [`MatchSession`]: the round state machine
//! - [`SessionObserver`]: told when a session ends
//! - [`MatchConfig`]: win target, round cap, inter-round delay
//! - [`rules`]: the outcome table

mod config;
mod error;
pub mod rules;
mod session;

pub use config::MatchConfig;
pub use error::MatchError;
pub use session::{MatchSession, Progress, SessionObserver};

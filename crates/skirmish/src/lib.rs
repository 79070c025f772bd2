//! # Skirmish
//!
//! Real-time two-player rock-paper-scissors over WebSockets.
//!
//! Clients connect, `join` under a display name, get paired with the next
//! stranger who does the same, and play best-of-three. After the game they
//! can `play_again` to go straight back into matchmaking.
//!
//! This crate is the connection supervisor that ties the layers together:
//! transport → protocol → session endpoint → lobby / match.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skirmish::prelude::*;
//!
//! # async fn run() -> Result<(), SkirmishError> {
//! let server = SkirmishServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::SkirmishError;
pub use server::{SkirmishServer, SkirmishServerBuilder};

pub mod prelude {
    pub use crate::{ServerConfig, SkirmishError, SkirmishServer, SkirmishServerBuilder};
    pub use skirmish_lobby::Matchmaker;
    pub use skirmish_match::MatchConfig;
    pub use skirmish_protocol::{Choice, ClientEvent, Envelope, Outcome, ServerEvent};
    pub use skirmish_session::EndpointConfig;
    pub use tokio_util::sync::CancellationToken;
}

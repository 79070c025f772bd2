//! Session endpoints for Skirmish.
//!
//! An [`Endpoint`] is the server-side representative of one connected
//! player. It is the unit of concurrency and cleanup:
//!
//! - a bounded outbound queue drained by the connection's writer task,
//! - a cancellation token that stops both of the connection's loops,
//! - the player's display name and lobby/match [`Membership`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby / Match (above)  ← enqueue events, flip membership
//!     ↕
//! Session Layer (this crate)  ← one Endpoint per connection
//!     ↕
//! Protocol Layer (below)  ← provides EndpointId, ServerEvent
//! ```

mod endpoint;
mod id;

pub use endpoint::{Delivery, Endpoint, EndpointConfig, Membership};
pub use id::mint_endpoint_id;

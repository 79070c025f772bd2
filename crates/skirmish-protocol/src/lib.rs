//! Wire protocol for Skirmish.
//!
//! Every message on the wire is a JSON envelope:
//!
//! ```text
//! { "type": "<event name>", "data": { ...payload... } }
//! ```
//!
//! - **Types** ([`EndpointId`], [`SessionId`], [`Choice`], [`Outcome`]):
//!   identities and game values that travel in payloads.
//! - **Events** ([`Envelope`], [`ClientEvent`], [`ServerEvent`]): what
//!   clients send and what the server sends back.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! The protocol layer knows nothing about connections, lobbies or
//! matches. It only knows the shape of the messages.

mod codec;
mod error;
mod events;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::{ClientEvent, Envelope, ServerEvent};
pub use types::{Choice, EndpointId, Outcome, SessionId};

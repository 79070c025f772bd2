//! The endpoint type: one connected player and everything needed to reach
//! and tear down their connection.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use skirmish_protocol::{EndpointId, ServerEvent, SessionId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// EndpointConfig
// ---------------------------------------------------------------------------

/// Configuration for endpoints.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Capacity of the per-endpoint outbound queue. Events offered while
    /// the queue is full are dropped.
    ///
    /// Default: 256.
    pub outbound_capacity: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Where an endpoint currently is in the matchmaking flow.
///
/// ```text
///   Idle ──(join, pool empty)──→ Waiting ──(opponent joins)──→ InMatch
///     │                                                          │
///     └───────────────(join, pool non-empty)─────────────────────┤
///     ↑                                                          │
///     └──────────────────────(game ended)────────────────────────┘
/// ```
///
/// [`Endpoint::in_lobby`] and [`Endpoint::in_match`] are derived from this,
/// so they are never both true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Membership {
    /// Connected, not waiting, not playing.
    #[default]
    Idle,
    /// In the waiting pool.
    Waiting,
    /// Playing in the given session.
    InMatch(SessionId),
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// What happened to an event offered to [`Endpoint::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Placed on the outbound queue.
    Queued,
    /// The queue was full; the event was dropped.
    Dropped,
    /// The endpoint is closed; the event was discarded.
    Closed,
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

struct EndpointState {
    name: String,
    membership: Membership,
    /// `None` once closed. Dropping the sender is what closes the queue.
    outbound: Option<mpsc::Sender<ServerEvent>>,
    closed: bool,
}

/// One connected party.
///
/// Shared as `Arc<Endpoint>` between the connection's two loops, the
/// matchmaker, and at most one match session. All state sits behind one
/// lock owned by this endpoint alone, and no method awaits or takes
/// another component's lock while holding it.
pub struct Endpoint {
    id: EndpointId,
    state: RwLock<EndpointState>,
    cancel: CancellationToken,
}

impl Endpoint {
    /// Creates an endpoint and the receiving half of its outbound queue.
    ///
    /// The endpoint's token is a child of `parent`, so cancelling the
    /// server's master token reaches every endpoint.
    pub fn new(
        id: EndpointId,
        config: &EndpointConfig,
        parent: &CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(config.outbound_capacity.max(1));
        let endpoint = Arc::new(Self {
            id,
            state: RwLock::new(EndpointState {
                name: String::new(),
                membership: Membership::Idle,
                outbound: Some(tx),
                closed: false,
            }),
            cancel: parent.child_token(),
        });
        (endpoint, rx)
    }

    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    /// The display name; empty until the first successful join.
    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.write().name = name.into();
    }

    pub fn membership(&self) -> Membership {
        self.read().membership
    }

    pub fn set_membership(&self, membership: Membership) {
        self.write().membership = membership;
    }

    /// Resets to [`Membership::Idle`] if, and only if, the endpoint is
    /// still in `session_id`. Returns whether it was reset.
    ///
    /// Lets a finished session release its players without clobbering an
    /// endpoint that has already moved on.
    pub fn leave_session(&self, session_id: SessionId) -> bool {
        let mut state = self.write();
        if state.membership == Membership::InMatch(session_id) {
            state.membership = Membership::Idle;
            true
        } else {
            false
        }
    }

    pub fn in_lobby(&self) -> bool {
        self.membership() == Membership::Waiting
    }

    pub fn in_match(&self) -> bool {
        matches!(self.membership(), Membership::InMatch(_))
    }

    /// The session this endpoint is playing in, if any.
    pub fn current_session(&self) -> Option<SessionId> {
        match self.membership() {
            Membership::InMatch(id) => Some(id),
            _ => None,
        }
    }

    /// Offers an event to the outbound queue without waiting.
    ///
    /// Delivery is best-effort: a full queue drops the event and logs it,
    /// so a slow reader can never stall the caller.
    pub fn enqueue(&self, event: ServerEvent) -> Delivery {
        let state = self.read();
        let Some(tx) = state.outbound.as_ref() else {
            tracing::debug!(
                endpoint_id = %self.id,
                event = event.kind(),
                "endpoint closed, discarding event"
            );
            return Delivery::Closed;
        };

        match tx.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    endpoint_id = %self.id,
                    event = event.kind(),
                    "outbound queue full, dropping event"
                );
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!(
                    endpoint_id = %self.id,
                    event = event.kind(),
                    "outbound queue receiver gone, discarding event"
                );
                Delivery::Closed
            }
        }
    }

    /// Tears the endpoint down: fires the cancellation token and closes
    /// the outbound queue. The connection's loops see either and drop
    /// their socket halves, which closes the socket.
    ///
    /// Idempotent. Returns `true` only for the call that did the teardown.
    pub fn close(&self) -> bool {
        let mut state = self.write();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.outbound = None;
        self.cancel.cancel();
        drop(state);

        tracing::debug!(endpoint_id = %self.id, "endpoint closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.read().closed
    }

    /// The endpoint's cancellation token. Cancelled by [`close`](Self::close)
    /// or by the parent token.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    // Every write leaves the state consistent, so a panic elsewhere while
    // holding the lock does not invalidate it.
    fn read(&self) -> RwLockReadGuard<'_, EndpointState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EndpointState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("name", &state.name)
            .field("membership", &state.membership)
            .field("closed", &state.closed)
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================

//! The matchmaker: registry, waiting pool, and session table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use skirmish_match::{MatchConfig, MatchSession, Progress, SessionObserver};
use skirmish_protocol::{EndpointId, ServerEvent, SessionId};
use skirmish_session::{Endpoint, Membership};
use tokio_util::sync::CancellationToken;

use crate::LobbyError;

/// Where a successful join left the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// No opponent yet; the endpoint is in the waiting pool.
    Waiting,
    /// Paired immediately; the session has started.
    Matched(SessionId),
}

#[derive(Default)]
struct Registry {
    /// Every connected endpoint.
    endpoints: HashMap<EndpointId, Arc<Endpoint>>,
    /// Endpoints waiting for an opponent. Holds at most one entry, since
    /// any join against a non-empty pool pairs immediately.
    waiting: HashMap<EndpointId, Arc<Endpoint>>,
    /// Live sessions.
    sessions: HashMap<SessionId, Arc<MatchSession>>,
    /// Last allocated session number.
    session_counter: u64,
    closed: bool,
}

/// Pairs waiting endpoints and owns the sessions it creates.
///
/// Always handled as `Arc<Matchmaker>`; sessions hold a weak reference
/// back to it for their end-of-game notification.
pub struct Matchmaker {
    this: Weak<Matchmaker>,
    registry: Mutex<Registry>,
    config: MatchConfig,
    shutdown: CancellationToken,
}

impl Matchmaker {
    /// Creates a matchmaker. Session tokens are children of a child of
    /// `parent`, so cancelling `parent` reaches every session.
    pub fn new(config: MatchConfig, parent: &CancellationToken) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registry: Mutex::new(Registry::default()),
            config,
            shutdown: parent.child_token(),
        })
    }

    /// Adds a freshly connected endpoint. After [`close`](Self::close)
    /// the endpoint is closed instead.
    pub fn register(&self, endpoint: Arc<Endpoint>) {
        let mut registry = self.lock();
        if registry.closed {
            drop(registry);
            tracing::debug!(endpoint_id = %endpoint.id(), "matchmaker closed, rejecting endpoint");
            endpoint.close();
            return;
        }
        registry
            .endpoints
            .insert(endpoint.id().clone(), endpoint);
    }

    /// Enters `endpoint_id` into matchmaking under `name`.
    ///
    /// Pairs it with a waiting endpoint if there is one: both receive
    /// `match_found`, then the session opens round one. Otherwise the
    /// endpoint waits and receives `waiting`.
    ///
    /// # Errors
    /// `NotFound`, `InvalidName`, `NameTaken`, `AlreadyWaiting`, or
    /// `AlreadyInMatch`. Each (except `NotFound`) is also sent to the
    /// requester as an `error` event; the connection stays open.
    pub fn join(&self, endpoint_id: &EndpointId, name: &str) -> Result<JoinOutcome, LobbyError> {
        let result = self.enter(endpoint_id, Some(name));
        if let Err(err) = &result {
            self.reject(endpoint_id, err);
        }
        result
    }

    /// Puts an endpoint whose game ended back into matchmaking under the
    /// name it joined with.
    ///
    /// # Errors
    /// As for [`join`](Self::join); `InvalidName` if it never joined.
    pub fn play_again(&self, endpoint_id: &EndpointId) -> Result<JoinOutcome, LobbyError> {
        let result = self.enter(endpoint_id, None);
        if let Err(err) = &result {
            self.reject(endpoint_id, err);
        }
        result
    }

    /// Routes a choice to the endpoint's live session.
    ///
    /// # Errors
    /// `NotFound`; `NotInMatch` (also sent as an `error` event) if the
    /// endpoint has no live session; otherwise whatever the session
    /// rejects with.
    pub fn submit_choice(
        &self,
        endpoint_id: &EndpointId,
        choice: &str,
    ) -> Result<Progress, LobbyError> {
        let (endpoint, session) = {
            let registry = self.lock();
            let endpoint = registry
                .endpoints
                .get(endpoint_id)
                .cloned()
                .ok_or_else(|| LobbyError::NotFound(endpoint_id.clone()))?;
            let session = endpoint
                .current_session()
                .and_then(|id| registry.sessions.get(&id).cloned());
            (endpoint, session)
        };

        let Some(session) = session else {
            let err = LobbyError::NotInMatch;
            endpoint.enqueue(ServerEvent::error(err.to_string()));
            return Err(err);
        };
        Ok(session.submit_choice(endpoint_id, choice)?)
    }

    /// Deregisters an endpoint, evicting it from the waiting pool and
    /// forfeiting any live session it is in. Returns the endpoint so the
    /// caller can close it; `None` if it was not registered.
    pub fn remove_endpoint(&self, endpoint_id: &EndpointId) -> Option<Arc<Endpoint>> {
        let (endpoint, session) = {
            let mut registry = self.lock();
            let endpoint = registry.endpoints.remove(endpoint_id)?;
            let was_waiting = registry.waiting.remove(endpoint_id).is_some();
            if was_waiting {
                endpoint.set_membership(Membership::Idle);
            }
            let session = endpoint
                .current_session()
                .and_then(|id| registry.sessions.get(&id).cloned());
            (endpoint, session)
        };

        if let Some(session) = session {
            if let Err(err) = session.forfeit(endpoint_id) {
                tracing::debug!(%endpoint_id, session_id = %session.id(), %err, "no forfeit");
            }
        }

        tracing::debug!(%endpoint_id, "endpoint deregistered");
        Some(endpoint)
    }

    /// Drops a finished session from the table and closes it.
    pub fn on_session_ended(&self, session_id: SessionId) {
        let session = self.lock().sessions.remove(&session_id);
        if let Some(session) = session {
            session.close();
            tracing::info!(%session_id, "session destroyed");
        }
    }

    /// Closes every session and every registered endpoint, and refuses
    /// further registrations.
    pub fn close(&self) {
        let (sessions, endpoints) = {
            let mut registry = self.lock();
            registry.closed = true;
            registry.waiting.clear();
            let sessions: Vec<_> = registry.sessions.drain().map(|(_, s)| s).collect();
            let endpoints: Vec<_> = registry.endpoints.drain().map(|(_, e)| e).collect();
            (sessions, endpoints)
        };
        self.shutdown.cancel();

        for session in &sessions {
            session.close();
        }
        for endpoint in &endpoints {
            endpoint.close();
        }
        tracing::info!(
            sessions = sessions.len(),
            endpoints = endpoints.len(),
            "matchmaker closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn endpoint(&self, endpoint_id: &EndpointId) -> Option<Arc<Endpoint>> {
        self.lock().endpoints.get(endpoint_id).cloned()
    }

    pub fn session(&self, session_id: SessionId) -> Option<Arc<MatchSession>> {
        self.lock().sessions.get(&session_id).cloned()
    }

    pub fn endpoint_count(&self) -> usize {
        self.lock().endpoints.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.lock().waiting.len()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    // -- internals --------------------------------------------------------

    /// Shared by `join` (explicit name) and `play_again` (stored name).
    fn enter(
        &self,
        endpoint_id: &EndpointId,
        name: Option<&str>,
    ) -> Result<JoinOutcome, LobbyError> {
        let mut registry = self.lock();
        let endpoint = registry
            .endpoints
            .get(endpoint_id)
            .cloned()
            .ok_or_else(|| LobbyError::NotFound(endpoint_id.clone()))?;

        let name = match name {
            Some(name) => name.to_string(),
            None => endpoint.name(),
        };
        if name.is_empty() {
            return Err(LobbyError::InvalidName);
        }

        match endpoint.membership() {
            Membership::Waiting => return Err(LobbyError::AlreadyWaiting),
            Membership::InMatch(session_id)
                if registry
                    .sessions
                    .get(&session_id)
                    .is_some_and(|s| !s.is_ended()) =>
            {
                return Err(LobbyError::AlreadyInMatch(session_id));
            }
            _ => {}
        }

        if registry.waiting.values().any(|w| w.name() == name) {
            return Err(LobbyError::NameTaken(name));
        }

        endpoint.set_name(name.as_str());
        endpoint.set_membership(Membership::Idle);

        let opponent_id = registry.waiting.keys().next().cloned();
        let Some(opponent) = opponent_id.and_then(|id| registry.waiting.remove(&id)) else {
            endpoint.set_membership(Membership::Waiting);
            registry
                .waiting
                .insert(endpoint_id.clone(), Arc::clone(&endpoint));
            drop(registry);

            endpoint.enqueue(ServerEvent::Waiting {});
            tracing::info!(%endpoint_id, %name, "player waiting");
            return Ok(JoinOutcome::Waiting);
        };

        registry.session_counter += 1;
        let session_id = SessionId(registry.session_counter);
        let observer: Weak<dyn SessionObserver> = self.this.clone();
        let session = MatchSession::new(
            session_id,
            [Arc::clone(&endpoint), Arc::clone(&opponent)],
            self.config.clone(),
            &self.shutdown,
            observer,
        );
        registry.sessions.insert(session_id, Arc::clone(&session));
        drop(registry);

        let opponent_name = opponent.name();
        tracing::info!(
            %session_id,
            player_one = %name,
            player_two = %opponent_name,
            "match started"
        );
        endpoint.enqueue(ServerEvent::MatchFound { opponent_name });
        opponent.enqueue(ServerEvent::MatchFound {
            opponent_name: name,
        });
        session.start();

        Ok(JoinOutcome::Matched(session_id))
    }

    fn reject(&self, endpoint_id: &EndpointId, err: &LobbyError) {
        tracing::debug!(%endpoint_id, %err, "lobby request rejected");
        if let Some(endpoint) = self.endpoint(endpoint_id) {
            endpoint.enqueue(ServerEvent::error(err.to_string()));
        }
    }

    // Every critical section leaves the registry consistent.
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionObserver for Matchmaker {
    fn session_ended(&self, session_id: SessionId) {
        self.on_session_ended(session_id);
    }
}

impl std::fmt::Debug for Matchmaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        f.debug_struct("Matchmaker")
            .field("endpoints", &registry.endpoints.len())
            .field("waiting", &registry.waiting.len())
            .field("sessions", &registry.sessions.len())
            .field("closed", &registry.closed)
            .finish()
    }
}

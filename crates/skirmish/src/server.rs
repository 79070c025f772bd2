//! `SkirmishServer` builder and server loop.
//!
//! This is the entry point for running a Skirmish server. It ties
//! together all the layers: transport → protocol → endpoint → lobby.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use skirmish_lobby::Matchmaker;
use skirmish_match::MatchConfig;
use skirmish_protocol::{Codec, EndpointId, JsonCodec};
use skirmish_session::{Endpoint, EndpointConfig};
use skirmish_transport::{Routes, WebSocketConnection, WebSocketTransport};
use tokio_util::sync::CancellationToken;

use crate::handler::handle_connection;
use crate::{ServerConfig, SkirmishError};

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) matchmaker: Arc<Matchmaker>,
    /// Every endpoint with a live connection task.
    endpoints: Mutex<HashMap<EndpointId, Arc<Endpoint>>>,
    pub(crate) config: ServerConfig,
    pub(crate) routes: Routes,
    pub(crate) codec: C,
    /// Master token. Endpoint tokens are its children.
    pub(crate) shutdown: CancellationToken,
}

impl<C: Codec> ServerState<C> {
    pub(crate) fn register(&self, endpoint: Arc<Endpoint>) {
        self.lock_endpoints()
            .insert(endpoint.id().clone(), Arc::clone(&endpoint));
        self.matchmaker.register(endpoint);
    }

    /// Removes the endpoint everywhere, then closes it. Synchronous so it
    /// can run from a drop guard.
    pub(crate) fn deregister(&self, endpoint: &Endpoint) {
        self.lock_endpoints().remove(endpoint.id());
        self.matchmaker.remove_endpoint(endpoint.id());
        endpoint.close();
    }

    fn drain_endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.lock_endpoints().drain().map(|(_, e)| e).collect()
    }

    fn lock_endpoints(&self) -> MutexGuard<'_, HashMap<EndpointId, Arc<Endpoint>>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for configuring and starting a Skirmish server.
///
/// # Example
///
/// ```rust,ignore
/// use skirmish::prelude::*;
///
/// let server = SkirmishServer::builder()
///     .bind("0.0.0.0:8080")
///     .ping_interval(Duration::from_secs(30))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct SkirmishServerBuilder {
    config: ServerConfig,
}

impl SkirmishServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn ws_path(mut self, path: &str) -> Self {
        self.config.ws_path = path.to_string();
        self
    }

    pub fn health_path(mut self, path: &str) -> Self {
        self.config.health_path = path.to_string();
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn endpoint_config(mut self, config: EndpointConfig) -> Self {
        self.config.endpoint = config;
        self
    }

    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.config.match_config = config;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// `SkirmishError::Transport` if a route path is invalid or the
    /// address cannot be bound.
    pub async fn build(self) -> Result<SkirmishServer<JsonCodec>, SkirmishError> {
        self.config.routes().validate()?;
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let shutdown = CancellationToken::new();
        let state = Arc::new(ServerState {
            matchmaker: Matchmaker::new(self.config.match_config.clone(), &shutdown),
            endpoints: Mutex::new(HashMap::new()),
            routes: self.config.routes(),
            config: self.config,
            codec: JsonCodec,
            shutdown,
        });

        Ok(SkirmishServer { transport, state })
    }
}

impl Default for SkirmishServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Skirmish server.
///
/// Call [`run()`](Self::run) to start accepting connections; cancel the
/// [`shutdown_token`](Self::shutdown_token) to stop it.
pub struct SkirmishServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl SkirmishServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> SkirmishServerBuilder {
        SkirmishServerBuilder::new()
    }
}

impl<C: Codec> SkirmishServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SkirmishError> {
        Ok(self.transport.local_addr()?)
    }

    /// The master shutdown token. Cancelling it stops the accept loop and
    /// tears down every session and connection.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// The matchmaker, for inspecting live state.
    pub fn matchmaker(&self) -> Arc<Matchmaker> {
        Arc::clone(&self.state.matchmaker)
    }

    /// Serves connections until the shutdown token is cancelled.
    ///
    /// Each upgraded socket is served on its own task. On shutdown the
    /// listener stops, then the matchmaker closes every session and
    /// endpoint before this returns.
    pub async fn run(self) -> Result<(), SkirmishError> {
        tracing::info!(
            addr = %self.local_addr()?,
            ws_path = %self.state.config.ws_path,
            "Skirmish server running"
        );

        let state = Arc::clone(&self.state);
        let on_connect = move |conn: WebSocketConnection| {
            let state = Arc::clone(&state);
            async move {
                let peer = conn.peer_addr();
                if let Err(e) = handle_connection(conn, state).await {
                    tracing::debug!(%peer, error = %e, "connection ended with error");
                }
            }
        };

        let served = self
            .transport
            .serve(
                &self.state.routes,
                on_connect,
                self.state.shutdown.clone().cancelled_owned(),
            )
            .await;
        if let Err(e) = &served {
            tracing::error!(error = %e, "listener failed");
        }

        tracing::info!("shutting down");
        self.state.shutdown.cancel();
        self.state.matchmaker.close();
        for endpoint in self.state.drain_endpoints() {
            endpoint.close();
        }
        tracing::info!("server stopped");
        Ok(served?)
    }
}

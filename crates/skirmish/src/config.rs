//! Server configuration.

use std::time::Duration;

use skirmish_match::MatchConfig;
use skirmish_session::EndpointConfig;
use skirmish_transport::Routes;

/// Everything the connection supervisor needs to know.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Path that upgrades to a WebSocket.
    pub ws_path: String,

    /// Path that answers `200 OK` for liveness probes.
    pub health_path: String,

    /// How often the outbound loop checks for idleness and pings.
    pub ping_interval: Duration,

    /// Longest the inbound loop waits without a pong or a message.
    pub read_timeout: Duration,

    /// Bound on each frame write.
    pub write_timeout: Duration,

    pub endpoint: EndpointConfig,

    pub match_config: MatchConfig,
}

impl ServerConfig {
    pub(crate) fn routes(&self) -> Routes {
        Routes {
            ws_path: self.ws_path.clone(),
            health_path: self.health_path.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            ws_path: "/ws".to_string(),
            health_path: "/health".to_string(),
            ping_interval: Duration::from_secs(54),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            endpoint: EndpointConfig::default(),
            match_config: MatchConfig::default(),
        }
    }
}

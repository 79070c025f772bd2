//! HTTP routing in front of the WebSocket upgrade.
//!
//! The WebSocket path is served through axum's [`WebSocketUpgrade`]; the
//! health path answers a fixed `200 OK`; everything else falls through to
//! a `404`.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{StatusCode, Uri};
use axum::response::Response;
use axum::routing::get;

use crate::{TransportError, WebSocketConnection};

/// Paths the transport answers on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    /// Path upgraded to a WebSocket connection.
    pub ws_path: String,
    /// Path answered with a fixed `200 OK`.
    pub health_path: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            ws_path: "/ws".to_string(),
            health_path: "/health".to_string(),
        }
    }
}

impl Routes {
    /// Checks that both paths are static, absolute, and distinct.
    ///
    /// # Errors
    /// `TransportError::InvalidRoute` naming the offending path.
    pub fn validate(&self) -> Result<(), TransportError> {
        for path in [&self.ws_path, &self.health_path] {
            if !path.starts_with('/') || path.contains(['{', '}', '*', ':']) {
                return Err(TransportError::InvalidRoute(path.clone()));
            }
        }
        if self.ws_path == self.health_path {
            return Err(TransportError::InvalidRoute(self.ws_path.clone()));
        }
        Ok(())
    }
}

/// Builds the router. `on_connect` runs on its own task for every
/// completed upgrade.
pub(crate) fn router<H, Fut>(routes: &Routes, on_connect: H) -> Router
where
    H: Fn(WebSocketConnection) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let upgrade = move |ws: WebSocketUpgrade, ConnectInfo(peer): ConnectInfo<SocketAddr>| {
        let on_connect = on_connect.clone();
        async move { accept(ws, peer, on_connect) }
    };

    Router::new()
        .route(&routes.ws_path, get(upgrade))
        .route(&routes.health_path, get(health))
        .fallback(not_found)
}

fn accept<H, Fut>(ws: WebSocketUpgrade, peer: SocketAddr, on_connect: H) -> Response
where
    H: FnOnce(WebSocketConnection) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    ws.on_failed_upgrade(move |e| {
        tracing::debug!(%peer, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| {
        let conn = WebSocketConnection::new(socket, peer);
        tracing::debug!(id = %conn.id(), %peer, "accepted WebSocket connection");
        on_connect(conn)
    })
}

async fn health() -> &'static str {
    tracing::trace!("health check");
    "OK"
}

async fn not_found(uri: Uri) -> (StatusCode, &'static str) {
    tracing::debug!(path = uri.path(), "unknown path");
    (StatusCode::NOT_FOUND, "not found")
}

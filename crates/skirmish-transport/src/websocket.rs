//! WebSocket transport implementation on top of axum.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;

use crate::router::router;
use crate::{ConnectionId, Routes, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A bound listener that serves the WebSocket and health routes.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::Bind)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the transport is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::Bind)
    }

    /// Serves `routes` until `shutdown` resolves.
    ///
    /// Every completed upgrade is handed to `on_connect` on its own task,
    /// so one slow client never stalls the listener. Upgraded connections
    /// outlive this call; the caller is responsible for closing them.
    ///
    /// # Errors
    /// `InvalidRoute` if `routes` does not validate, `Serve` if the
    /// listener fails.
    pub async fn serve<H, Fut, S>(
        self,
        routes: &Routes,
        on_connect: H,
        shutdown: S,
    ) -> Result<(), TransportError>
    where
        H: Fn(WebSocketConnection) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()> + Send + 'static,
    {
        routes.validate()?;
        let app = router(routes, on_connect);
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(TransportError::Serve)
    }
}

/// A single upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    addr: SocketAddr,
    ws: WebSocket,
}

impl WebSocketConnection {
    pub(crate) fn new(ws: WebSocket, addr: SocketAddr) -> Self {
        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        Self { id, addr, ws }
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Splits the connection into independently owned read and write
    /// halves. The socket closes once both halves are dropped.
    pub fn split(self) -> (WebSocketReader, WebSocketWriter) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketReader { id: self.id, stream },
            WebSocketWriter { id: self.id, sink },
        )
    }
}

/// A frame surfaced to the inbound loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text or binary data frame.
    Data(Vec<u8>),
    /// A keepalive response from the peer.
    Pong,
}

/// Read half of a [`WebSocketConnection`].
pub struct WebSocketReader {
    id: ConnectionId,
    stream: SplitStream<WebSocket>,
}

impl WebSocketReader {
    /// Returns the connection this half belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Receives the next data frame or pong.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed. Pings
    /// are answered by the WebSocket layer and skipped here.
    pub async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Inbound::Data(text.as_str().as_bytes().to_vec())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Inbound::Data(data.to_vec())));
                }
                Some(Ok(Message::Pong(_))) => return Ok(Some(Inbound::Pong)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Ping(_))) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }
}

/// Write half of a [`WebSocketConnection`].
pub struct WebSocketWriter {
    id: ConnectionId,
    sink: SplitSink<WebSocket, Message>,
}

impl WebSocketWriter {
    /// Returns the connection this half belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends an encoded event. UTF-8 payloads go out as text frames,
    /// anything else as binary.
    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        let msg = match String::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        };
        self.write(msg).await
    }

    /// Sends a keepalive ping.
    pub async fn ping(&mut self) -> Result<(), TransportError> {
        self.write(Message::Ping(Bytes::new())).await
    }

    /// Sends a Close frame and flushes it.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn write(&mut self, msg: Message) -> Result<(), TransportError> {
        self.sink.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

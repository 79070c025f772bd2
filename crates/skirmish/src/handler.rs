//! Per-connection handler: the endpoint and its two loops.
//!
//! Each upgraded socket gets its own Tokio task running this handler.
//! The flow is:
//!   1. Mint an endpoint and register it
//!   2. Spawn the outbound loop: queue → socket, plus keepalive pings
//!   3. Run the inbound loop: socket → decode → matchmaker
//!   4. Whichever loop stops first cancels the other; the guard cleans up

use std::ops::ControlFlow;
use std::sync::Arc;

use skirmish_protocol::{ClientEvent, Codec, Envelope, ServerEvent};
use skirmish_session::{Endpoint, mint_endpoint_id};
use skirmish_transport::{
    Inbound, TransportError, WebSocketConnection, WebSocketReader, WebSocketWriter,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::SkirmishError;
use crate::server::ServerState;

/// Drop guard that deregisters and closes the endpoint when the handler
/// exits, including by panic. Deregistration only takes std locks, so it
/// runs inline.
struct EndpointGuard<C: Codec> {
    endpoint: Arc<Endpoint>,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for EndpointGuard<C> {
    fn drop(&mut self) {
        self.state.deregister(&self.endpoint);
        tracing::info!(endpoint_id = %self.endpoint.id(), "connection closed");
    }
}

/// Handles a single upgraded socket until it closes.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), SkirmishError> {
    let peer = conn.peer_addr();

    // --- Step 1: Endpoint ---
    let endpoint_id = mint_endpoint_id();
    let (endpoint, outbound) =
        Endpoint::new(endpoint_id.clone(), &state.config.endpoint, &state.shutdown);
    state.register(Arc::clone(&endpoint));
    let guard = EndpointGuard {
        endpoint: Arc::clone(&endpoint),
        state: Arc::clone(&state),
    };
    tracing::info!(%endpoint_id, conn_id = %conn.id(), %peer, "connection accepted");

    // --- Step 2 & 3: Loops ---
    let (mut reader, writer) = conn.split();
    let writer_task = tokio::spawn(write_loop(
        writer,
        outbound,
        Arc::clone(&endpoint),
        Arc::clone(&state),
    ));

    let result = read_loop(&mut reader, &endpoint, &state).await;

    // --- Step 4: Cleanup ---
    // Closing the endpoint closes its queue; the writer flushes what is
    // left, sends a Close frame, and exits.
    drop(guard);
    if let Err(e) = writer_task.await {
        tracing::debug!(%endpoint_id, error = %e, "writer task failed");
    }
    result
}

/// Reads frames until the peer leaves, the read deadline passes, or the
/// endpoint is cancelled. Malformed messages are logged and skipped.
async fn read_loop<C: Codec>(
    reader: &mut WebSocketReader,
    endpoint: &Endpoint,
    state: &ServerState<C>,
) -> Result<(), SkirmishError> {
    let endpoint_id = endpoint.id();
    let read_timeout = state.config.read_timeout;
    let mut deadline = Instant::now() + read_timeout;

    loop {
        let frame = tokio::select! {
            _ = endpoint.cancel_token().cancelled() => return Ok(()),
            frame = tokio::time::timeout_at(deadline, reader.recv()) => frame,
        };

        let data = match frame {
            Ok(Ok(Some(Inbound::Data(data)))) => data,
            Ok(Ok(Some(Inbound::Pong))) => {
                deadline = Instant::now() + read_timeout;
                continue;
            }
            Ok(Ok(None)) => {
                tracing::debug!(%endpoint_id, "closed by peer");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::info!(%endpoint_id, "read deadline passed");
                return Err(TransportError::TimedOut("read").into());
            }
        };
        deadline = Instant::now() + read_timeout;

        let event = match decode_event(&state.codec, &data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%endpoint_id, error = %e, "ignoring malformed message");
                continue;
            }
        };

        if dispatch(endpoint, state, event).is_break() {
            tracing::info!(%endpoint_id, "client disconnected");
            return Ok(());
        }
    }
}

fn decode_event(codec: &impl Codec, data: &[u8]) -> Result<ClientEvent, SkirmishError> {
    let envelope: Envelope = codec.decode(data)?;
    Ok(ClientEvent::try_from(envelope)?)
}

/// Routes one client event. Rejections have already been sent to the
/// client as `error` events; they are only logged here.
fn dispatch<C: Codec>(
    endpoint: &Endpoint,
    state: &ServerState<C>,
    event: ClientEvent,
) -> ControlFlow<()> {
    let endpoint_id = endpoint.id();
    let matchmaker = &state.matchmaker;
    let kind = event.kind();

    let result = match event {
        ClientEvent::Join { name } => matchmaker.join(endpoint_id, &name).map(drop),
        ClientEvent::MakeChoice { choice } => {
            matchmaker.submit_choice(endpoint_id, &choice).map(drop)
        }
        ClientEvent::PlayAgain => matchmaker.play_again(endpoint_id).map(drop),
        ClientEvent::Disconnect => return ControlFlow::Break(()),
    };

    if let Err(e) = result {
        tracing::debug!(%endpoint_id, event = kind, error = %e, "request rejected");
    }
    ControlFlow::Continue(())
}

/// Drains the outbound queue onto the socket and keeps the connection
/// alive. Pings on a tick only if nothing was written since the last one.
///
/// Closes the endpoint on exit so a dead writer also stops the reader.
async fn write_loop<C: Codec>(
    mut writer: WebSocketWriter,
    mut outbound: mpsc::Receiver<ServerEvent>,
    endpoint: Arc<Endpoint>,
    state: Arc<ServerState<C>>,
) {
    let endpoint_id = endpoint.id().clone();
    let write_timeout = state.config.write_timeout;

    let mut ticker = tokio::time::interval_at(
        Instant::now() + state.config.ping_interval,
        state.config.ping_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut wrote = false;

    loop {
        tokio::select! {
            // Queue first, so a closed endpoint still flushes what it had.
            biased;

            event = outbound.recv() => {
                let Some(event) = event else { break };
                let bytes = match state.codec.encode(&event) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(%endpoint_id, event = event.kind(), error = %e, "failed to encode event");
                        continue;
                    }
                };
                match tokio::time::timeout(write_timeout, writer.send(bytes)).await {
                    Ok(Ok(())) => wrote = true,
                    Ok(Err(e)) => {
                        tracing::debug!(%endpoint_id, error = %e, "write failed");
                        break;
                    }
                    Err(_) => {
                        tracing::debug!(%endpoint_id, "write deadline passed");
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if std::mem::take(&mut wrote) {
                    continue;
                }
                match tokio::time::timeout(write_timeout, writer.ping()).await {
                    Ok(Ok(())) => tracing::trace!(%endpoint_id, "ping"),
                    Ok(Err(e)) => {
                        tracing::debug!(%endpoint_id, error = %e, "ping failed");
                        break;
                    }
                    Err(_) => {
                        tracing::debug!(%endpoint_id, "ping deadline passed");
                        break;
                    }
                }
            }

            _ = endpoint.cancel_token().cancelled() => break,
        }
    }

    if let Ok(Err(e)) = tokio::time::timeout(write_timeout, writer.close()).await {
        tracing::trace!(%endpoint_id, error = %e, "close frame not sent");
    }
    endpoint.close();
}

//! One WebSocket session: socket I/O for a single client.
//!
//! The session decodes frames with its namespace's vocabulary and publishes
//! them on the bus. It never touches hub state itself. Outbound traffic is
//! written by a forwarder task draining the connection's queue.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use canteen_core::protocol::{AckReport, InboundFrame, OutboundFrame};
use canteen_core::{ConnectionId, Namespace, ProtocolError};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::{counter, histogram};
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::bus::{BusMessage, EventPublisher};
use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::namespace::{Decoded, decode};
use crate::config::ServerConfig;
use crate::metrics::{
    FRAMES_REJECTED_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// What a session needs from the server.
#[derive(Clone)]
pub struct SessionContext {
    /// Bus to the reactor.
    pub publisher: Arc<dyn EventPublisher>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Server-wide shutdown token.
    pub shutdown: CancellationToken,
}

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// Close frame or end of stream.
    ClientClosed,
    /// The client sent a `disconnect` event.
    ClientDisconnect,
    /// The transport failed.
    TransportError,
    /// The close token fired (heartbeat, eviction, shutdown).
    Closed,
    /// The reactor is gone.
    BusClosed,
}

/// Run a session to completion.
///
/// `_permit` holds one of the server's connection slots until the session
/// ends.
#[instrument(skip_all, fields(conn_id = %id, namespace = %namespace))]
pub async fn run_ws_session(
    socket: WebSocket,
    namespace: Namespace,
    id: ConnectionId,
    ctx: SessionContext,
    _permit: OwnedSemaphorePermit,
) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel(ctx.config.send_queue_capacity.max(1));
    let close = ctx.shutdown.child_token();
    let connection = Arc::new(ClientConnection::new(id.clone(), namespace, tx, close.clone()));

    if ctx
        .publisher
        .publish(BusMessage::Connected {
            connection: Arc::clone(&connection),
        })
        .await
        .is_err()
    {
        debug!("bus closed before session start");
        return;
    }
    counter!(WS_CONNECTIONS_TOTAL, "namespace" => namespace.as_str()).increment(1);
    info!("client connected");

    let writer = tokio::spawn(run_writer(
        sink,
        rx,
        close.clone(),
        ctx.config.heartbeat_interval(),
    ));
    let heartbeat = {
        let connection = Arc::clone(&connection);
        let interval = ctx.config.heartbeat_interval();
        let timeout = ctx.config.heartbeat_timeout();
        let close = close.clone();
        tokio::spawn(async move {
            let result = run_heartbeat(Arc::clone(&connection), interval, timeout, close.clone()).await;
            if result == HeartbeatResult::TimedOut {
                warn!(
                    conn_id = %connection.id,
                    silent_ms = u64::try_from(connection.last_pong_elapsed().as_millis()).unwrap_or(u64::MAX),
                    "heartbeat timed out"
                );
                close.cancel();
            }
            result
        })
    };

    let end = read_loop(&mut stream, &connection, &ctx).await;

    close.cancel();
    let timed_out = matches!(heartbeat.await, Ok(HeartbeatResult::TimedOut));
    let reason = match end {
        ReadEnd::ClientClosed => "client_closed",
        ReadEnd::ClientDisconnect => "client_disconnect",
        ReadEnd::TransportError => "transport_error",
        ReadEnd::BusClosed => "bus_closed",
        ReadEnd::Closed if timed_out => "heartbeat_timeout",
        ReadEnd::Closed if ctx.shutdown.is_cancelled() => "shutdown",
        ReadEnd::Closed => "evicted",
    };

    let _ = ctx
        .publisher
        .publish(BusMessage::Disconnected {
            connection_id: id,
            reason,
        })
        .await;
    let _ = writer.await;

    counter!(WS_DISCONNECTIONS_TOTAL, "namespace" => namespace.as_str(), "reason" => reason)
        .increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS, "namespace" => namespace.as_str())
        .record(connection.age().as_secs_f64());
    info!(reason, dropped = connection.drop_count(), "client disconnected");
}

/// Forward queued frames to the socket and ping on every interval.
async fn run_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Arc<String>>,
    close: CancellationToken,
    ping_every: Duration,
) {
    let mut ping = tokio::time::interval(ping_every);
    // First tick fires immediately.
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            () = close.cancelled() => {
                let frame = CloseFrame {
                    code: close_code::NORMAL,
                    reason: "closing".into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
            msg = rx.recv() => {
                let Some(text) = msg else { break };
                if sink.send(Message::Text(text.as_str().into())).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                trace!("sent ping");
            }
        }
    }

    // A dead socket ends the whole session.
    close.cancel();
}

async fn read_loop(
    stream: &mut SplitStream<WebSocket>,
    connection: &ClientConnection,
    ctx: &SessionContext,
) -> ReadEnd {
    let close = connection.close_token().clone();
    loop {
        let msg = tokio::select! {
            () = close.cancelled() => return ReadEnd::Closed,
            msg = stream.next() => msg,
        };

        let msg = match msg {
            None => return ReadEnd::ClientClosed,
            Some(Err(e)) => {
                debug!(error = %e, "websocket read failed");
                return ReadEnd::TransportError;
            }
            Some(Ok(msg)) => msg,
        };
        connection.mark_alive();

        let outcome = match msg {
            Message::Text(text) => handle_text(text.as_str(), connection, ctx).await,
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_text(text, connection, ctx).await,
                Err(_) => {
                    reject(
                        connection,
                        ctx,
                        None,
                        &ProtocolError::InvalidFrame("binary frame is not UTF-8".into()),
                    );
                    None
                }
            },
            Message::Close(_) => Some(ReadEnd::ClientClosed),
            Message::Ping(_) | Message::Pong(_) => None,
        };

        if let Some(end) = outcome {
            return end;
        }
    }
}

/// Decode one text frame and publish it. Returns `Some` when the session
/// should end.
async fn handle_text(
    text: &str,
    connection: &ClientConnection,
    ctx: &SessionContext,
) -> Option<ReadEnd> {
    let frame = match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            reject(connection, ctx, None, &e);
            return None;
        }
    };

    match decode(connection.namespace, &frame) {
        Ok(Decoded::Intent(intent)) => {
            debug!(event = %frame.event, kind = intent.kind(), "frame received");
            let message = BusMessage::Inbound {
                connection_id: connection.id.clone(),
                intent,
                ack_id: frame.ack_id,
            };
            if ctx.publisher.publish(message).await.is_err() {
                return Some(ReadEnd::BusClosed);
            }
            None
        }
        Ok(Decoded::Disconnect) => Some(ReadEnd::ClientDisconnect),
        Err(e) => {
            reject(connection, ctx, frame.ack_id, &e);
            None
        }
    }
}

/// Log and count a rejected frame; tell the client only when it asked for an
/// ack or the server runs with strict events.
fn reject(
    connection: &ClientConnection,
    ctx: &SessionContext,
    ack_id: Option<String>,
    error: &ProtocolError,
) {
    counter!(
        FRAMES_REJECTED_TOTAL,
        "namespace" => connection.namespace.as_str(),
        "reason" => error.kind()
    )
    .increment(1);
    warn!(error = %error, "frame rejected");

    if let Some(ack_id) = ack_id {
        let _ = connection.send_frame(&OutboundFrame::ack(&AckReport::rejected(
            ack_id,
            error.to_string(),
        )));
    } else if ctx.config.strict_events {
        let event = match error {
            ProtocolError::InvalidPayload { event, .. } | ProtocolError::UnknownEvent { event, .. } => {
                event.as_str()
            }
            ProtocolError::InvalidFrame(_) => "",
        };
        let _ = connection.send_frame(&OutboundFrame::error(event, &error.to_string()));
    }
}

//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use canteen_core::protocol::OutboundFrame;
use canteen_core::{ConnectionId, Namespace};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A connected WebSocket client.
///
/// The session task owns the socket; everyone else talks to the client
/// through the bounded outbound queue and can ask the session to end via
/// [`ClientConnection::close`].
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Namespace the client connected to.
    pub namespace: Namespace,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has shown activity since the last heartbeat tick.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to full channel.
    pub dropped_messages: AtomicU64,
    /// Cancelled to end the session (slow client, heartbeat timeout, shutdown).
    close: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(
        id: ConnectionId,
        namespace: Namespace,
        tx: mpsc::Sender<Arc<String>>,
        close: CancellationToken,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            namespace,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            close,
        }
    }

    /// Send a text message to the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a frame and send it to the client.
    pub fn send_frame(&self, frame: &OutboundFrame) -> bool {
        match frame.to_json() {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, event = %frame.event, error = %e, "failed to serialize frame");
                false
            }
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or any frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Ask the session to end.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Whether the session was asked to end.
    pub fn is_closing(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Token cancelled when the session should end.
    pub fn close_token(&self) -> &CancellationToken {
        &self.close
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("dropped_messages", &self.drop_count())
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::make_connection;
    use super::*;
    use serde_json::json;

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection("conn_1", Namespace::Users, 4);
        assert_eq!(conn.id.as_str(), "conn_1");
        assert_eq!(conn.namespace, Namespace::Users);
        assert!(conn.is_alive.load(Ordering::Relaxed));
        assert!(!conn.is_closing());
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection("conn_1", Namespace::Users, 4);
        assert!(conn.send(Arc::new("hello".into())));
        let msg = rx.recv().await.unwrap();
        assert_eq!(&*msg, "hello");
    }

    #[test]
    fn send_to_closed_channel_returns_false() {
        let (conn, rx) = make_connection("conn_2", Namespace::Users, 4);
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_channel_counts_drops() {
        let (conn, _rx) = make_connection("conn_3", Namespace::Kitchen, 1);
        assert!(conn.send(Arc::new("msg1".into())));
        assert!(!conn.send(Arc::new("msg2".into())));
        assert!(!conn.send(Arc::new("msg3".into())));
        assert_eq!(conn.drop_count(), 2);
    }

    #[tokio::test]
    async fn send_frame_serializes_envelope() {
        let (conn, mut rx) = make_connection("conn_4", Namespace::Users, 4);
        assert!(conn.send_frame(&OutboundFrame::new("menuNotification", json!({"id": 1}))));
        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed, json!({"event": "menuNotification", "data": {"id": 1}}));
    }

    #[test]
    fn mark_alive_and_check() {
        let (conn, _rx) = make_connection("conn_5", Namespace::Users, 4);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn close_cancels_token() {
        let (conn, _rx) = make_connection("conn_6", Namespace::Kitchen, 4);
        let token = conn.close_token().clone();
        conn.close();
        assert!(conn.is_closing());
        assert!(token.is_cancelled());
    }

    #[test]
    fn connection_age_increases() {
        let (conn, _rx) = make_connection("conn_7", Namespace::Users, 4);
        let age1 = conn.age();
        std::thread::sleep(Duration::from_millis(5));
        assert!(conn.age() > age1);
    }
}

//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Number of silent ticks tolerated before a client is considered dead.
pub fn max_missed(interval: Duration, timeout: Duration) -> u32 {
    let interval_ms = interval.as_millis().max(1);
    u32::try_from(timeout.as_millis() / interval_ms)
        .unwrap_or(u32::MAX)
        .max(1)
}

/// Watch a connection's liveness.
///
/// At each `interval` tick the alive flag is checked and reset. Any pong or
/// inbound frame sets it again. Once [`max_missed`] consecutive ticks pass
/// without activity the client is considered dead and
/// `HeartbeatResult::TimedOut` is returned.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    // First tick fires immediately.
    let _ = check_interval.tick().await;
    let max_missed = max_missed(interval, timeout);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::test_support::make_connection;
    use canteen_core::Namespace;
    use std::sync::atomic::Ordering;

    #[test]
    fn max_missed_from_defaults() {
        assert_eq!(max_missed(Duration::from_secs(25), Duration::from_secs(60)), 2);
        assert_eq!(max_missed(Duration::from_millis(100), Duration::from_millis(300)), 3);
    }

    #[test]
    fn max_missed_at_least_one() {
        assert_eq!(max_missed(Duration::from_secs(60), Duration::from_secs(10)), 1);
        assert_eq!(max_missed(Duration::ZERO, Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn heartbeat_cancelled() {
        let (conn, _rx) = make_connection("hb_1", Namespace::Users, 4);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(async move {
            run_heartbeat(conn, Duration::from_secs(100), Duration::from_secs(300), cancel2).await
        });

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_times_out() {
        let (conn, _rx) = make_connection("hb_2", Namespace::Kitchen, 4);
        conn.is_alive.store(false, Ordering::Relaxed);

        let result = run_heartbeat(
            conn,
            Duration::from_millis(100),
            Duration::from_millis(300),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(result, HeartbeatResult::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn active_client_stays_alive() {
        let (conn, _rx) = make_connection("hb_3", Namespace::Users, 4);
        let conn2 = Arc::clone(&conn);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(async move {
            run_heartbeat(conn2, Duration::from_millis(200), Duration::from_millis(400), cancel2)
                .await
        });

        for _ in 0..10 {
            time::sleep(Duration::from_millis(100)).await;
            conn.mark_alive();
        }

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }
}

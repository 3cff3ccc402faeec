//! End-to-end tests over real WebSocket connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use canteen_core::protocol::PushSubscription;
use canteen_platform::push::{
    InMemorySubscriptionStore, PushError, PushFallbackNotifier, PushNotification, PushSender,
};
use canteen_server::config::ServerConfig;
use canteen_server::server::CanteenServer;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct RecordingSender {
    tx: mpsc::UnboundedSender<(String, PushNotification)>,
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        notification: &PushNotification,
    ) -> Result<(), PushError> {
        let _ = self
            .tx
            .send((subscription.endpoint.clone(), notification.clone()));
        Ok(())
    }
}

struct TestServer {
    server: CanteenServer,
    addr: SocketAddr,
    pushes: mpsc::UnboundedReceiver<(String, PushNotification)>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    async fn start_with(config: ServerConfig) -> Self {
        let (tx, pushes) = mpsc::unbounded_channel();
        let notifier = PushFallbackNotifier::new(
            Arc::new(InMemorySubscriptionStore::new()),
            Arc::new(RecordingSender { tx }),
        );
        let server = CanteenServer::new(config, notifier, None);
        let addr = server.listen().await.unwrap();
        Self {
            server,
            addr,
            pushes,
        }
    }

    async fn connect(&self, path: &str) -> Client {
        let (mut ws, _) = connect_async(format!("ws://{}{path}", self.addr))
            .await
            .unwrap();
        let greeting = recv(&mut ws).await;
        assert_eq!(greeting["event"], "connected");
        assert_eq!(greeting["data"]["namespace"], path.trim_start_matches('/'));
        ws
    }

    async fn health(&self) -> Value {
        reqwest::get(format!("http://{}/health", self.addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Poll `/health` until `check` holds.
    async fn wait_for_health(&self, check: impl Fn(&Value) -> bool) -> Value {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let health = self.health().await;
            if check(&health) {
                return health;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "health never matched: {health}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn stop(self) {
        self.server.shutdown().await;
    }
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

/// Next JSON frame, skipping control frames.
async fn recv(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Send a frame with an `ackId` and return the ack payload.
async fn send_acked(ws: &mut Client, event: &str, data: Value, ack_id: &str) -> Value {
    send(ws, json!({"event": event, "data": data, "ackId": ack_id})).await;
    let ack = recv(ws).await;
    assert_eq!(ack["event"], "ack", "expected ack, got {ack}");
    assert_eq!(ack["data"]["ackId"], ack_id);
    ack["data"].clone()
}

async fn assert_silent(ws: &mut Client) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
            Ok(other) => panic!("expected silence, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn registered_user_receives_order_notification() {
    let mut server = TestServer::start().await;
    let mut kitchen = server.connect("/kitchen").await;
    let mut user = server.connect("/users").await;

    let ack = send_acked(&mut user, "registerUser", json!("9990001111"), "r1").await;
    assert_eq!(ack["ok"], true);

    let ack = send_acked(
        &mut kitchen,
        "orderNotification",
        json!({"phoneNumber": "9990001111", "orderId": "O1", "message": "ready"}),
        "n1",
    )
    .await;
    assert_eq!(ack["recipients"], 1);
    assert_eq!(ack["pushFallback"], false);

    let frame = recv(&mut user).await;
    assert_eq!(
        frame,
        json!({
            "event": "orderNotification",
            "data": {"orderId": "O1", "message": "Your order #O1 has been ready"}
        })
    );
    assert!(server.pushes.try_recv().is_err());
    server.stop().await;
}

#[tokio::test]
async fn unregistered_user_gets_push_fallback() {
    let mut server = TestServer::start().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/v1/push/subscriptions", server.addr))
        .json(&json!({
            "identity": "9990001111",
            "subscription": {"endpoint": "https://push.example/u1", "keys": {"p256dh": "p", "auth": "a"}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let mut kitchen = server.connect("/kitchen").await;
    let mut bystander = server.connect("/users").await;

    let ack = send_acked(
        &mut kitchen,
        "orderNotification",
        json!({"phoneNumber": "9990001111", "orderId": "O1", "message": "ready"}),
        "n1",
    )
    .await;
    assert_eq!(ack["recipients"], 0);
    assert_eq!(ack["pushFallback"], true);

    let (endpoint, notification) = tokio::time::timeout(WAIT, server.pushes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(endpoint, "https://push.example/u1");
    assert_eq!(notification.body, "Your order #O1 has been ready");
    assert_silent(&mut bystander).await;
    server.stop().await;
}

#[tokio::test]
async fn menu_notification_reaches_connected_users_only() {
    let server = TestServer::start().await;
    let mut kitchen = server.connect("/kitchen").await;
    let mut users = Vec::new();
    for _ in 0..3 {
        users.push(server.connect("/users").await);
    }
    let item = json!({"id": "m1", "name": "Masala Dosa", "price": 60});

    let ack = send_acked(&mut kitchen, "menuNotification", item.clone(), "m1").await;
    assert_eq!(ack["recipients"], 3);

    for user in &mut users {
        assert_eq!(
            recv(user).await,
            json!({"event": "menuNotification", "data": item})
        );
    }

    let mut late = server.connect("/users").await;
    assert_silent(&mut late).await;
    assert_silent(&mut kitchen).await;
    server.stop().await;
}

#[tokio::test]
async fn new_order_reaches_kitchens() {
    let server = TestServer::start().await;
    let mut kitchen = server.connect("/kitchen").await;
    let mut user = server.connect("/users").await;
    let order = json!({"orderId": "O7", "items": [{"itemId": "i1", "quantity": 2}]});

    let ack = send_acked(&mut user, "orderCreated", order.clone(), "o1").await;
    assert_eq!(ack["recipients"], 1);
    assert_eq!(
        recv(&mut kitchen).await,
        json!({"event": "orderCreated", "data": order})
    );
    server.stop().await;
}

#[tokio::test]
async fn room_update_skips_sender() {
    let server = TestServer::start().await;
    let mut a = server.connect("/users").await;
    let mut b = server.connect("/kitchen").await;
    let mut outsider = server.connect("/users").await;

    let _ = send_acked(&mut a, "joinRoom", json!("k1"), "j1").await;
    let _ = send_acked(&mut b, "joinRoom", json!({"room": "k1"}), "j2").await;

    let update = json!({"room": "k1", "message": "Order 5 is ready"});
    let ack = send_acked(&mut a, "order-update", update.clone(), "u1").await;
    assert_eq!(ack["recipients"], 1);

    assert_eq!(
        recv(&mut b).await,
        json!({"event": "order-update", "data": update})
    );
    assert_silent(&mut a).await;
    assert_silent(&mut outsider).await;
    server.stop().await;
}

#[tokio::test]
async fn unknown_event_is_rejected_in_ack() {
    let server = TestServer::start().await;
    let mut user = server.connect("/users").await;

    let ack = send_acked(
        &mut user,
        "orderNotification",
        json!({"phoneNumber": "1", "orderId": "O1"}),
        "x1",
    )
    .await;
    assert_eq!(ack["ok"], false);
    assert!(ack["error"].as_str().unwrap().contains("unknown event"));

    // Without an ackId the frame is dropped silently.
    send(&mut user, json!({"event": "menuNotification", "data": {}})).await;
    assert_silent(&mut user).await;
    server.stop().await;
}

#[tokio::test]
async fn strict_mode_reports_unknown_events() {
    let server = TestServer::start_with(ServerConfig {
        strict_events: true,
        ..ServerConfig::default()
    })
    .await;
    let mut kitchen = server.connect("/kitchen").await;

    send(&mut kitchen, json!({"event": "registerUser", "data": "1"})).await;
    let frame = recv(&mut kitchen).await;
    assert_eq!(frame["event"], "error");
    assert_eq!(frame["data"]["event"], "registerUser");

    send(&mut kitchen, json!("not an envelope")).await;
    assert_eq!(recv(&mut kitchen).await["event"], "error");
    server.stop().await;
}

#[tokio::test]
async fn binary_frames_are_accepted() {
    let server = TestServer::start().await;
    let mut user = server.connect("/users").await;

    let frame = json!({"event": "registerUser", "data": "555", "ackId": "b1"});
    user.send(Message::binary(frame.to_string().into_bytes()))
        .await
        .unwrap();
    let ack = recv(&mut user).await;
    assert_eq!(ack["data"]["ok"], true);
    server.stop().await;
}

#[tokio::test]
async fn disconnect_event_unbinds_identity() {
    let server = TestServer::start().await;
    let mut user = server.connect("/users").await;
    let _ = send_acked(&mut user, "registerUser", json!("777"), "r1").await;
    server
        .wait_for_health(|h| h["registered_identities"] == 1)
        .await;

    send(&mut user, json!({"event": "disconnect"})).await;

    let health = server
        .wait_for_health(|h| h["connections"] == 0)
        .await;
    assert_eq!(health["registered_identities"], 0);
    server.stop().await;
}

#[tokio::test]
async fn health_counts_connections_per_namespace() {
    let server = TestServer::start().await;
    let _kitchen = server.connect("/kitchen").await;
    let _u1 = server.connect("/users").await;
    let mut u2 = server.connect("/users").await;
    let _ = send_acked(&mut u2, "joinRoom", json!("k1"), "j1").await;

    let health = server
        .wait_for_health(|h| h["connections"] == 3 && h["rooms"] == 1)
        .await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["kitchen_connections"], 1);
    assert_eq!(health["user_connections"], 2);
    assert_eq!(health["push_enabled"], true);
    server.stop().await;
}

#[tokio::test]
async fn kitchen_status_over_http_reaches_users() {
    let server = TestServer::start().await;
    let mut user = server.connect("/users").await;

    let resp = reqwest::Client::new()
        .put(format!("http://{}/api/v1/kitchens/k1/status", server.addr))
        .json(&json!({"status": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["recipients"], 1);

    assert_eq!(
        recv(&mut user).await,
        json!({"event": "kitchenStatusUpdated", "data": {"kitchenId": "k1", "status": false}})
    );
    server.stop().await;
}

#[tokio::test]
async fn foreign_origin_is_forbidden() {
    let server = TestServer::start_with(ServerConfig {
        allowed_origins: vec!["https://canteen.example".into()],
        ..ServerConfig::default()
    })
    .await;

    let mut req = format!("ws://{}/users", server.addr)
        .into_client_request()
        .unwrap();
    let _ = req
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://evil.example"));
    let err = connect_async(req).await.unwrap_err();
    assert_matches!(err, WsError::Http(resp) if resp.status() == 403);

    let mut req = format!("ws://{}/users", server.addr)
        .into_client_request()
        .unwrap();
    let _ = req
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://canteen.example"));
    assert!(connect_async(req).await.is_ok());
    server.stop().await;
}

#[tokio::test]
async fn connection_limit_returns_503() {
    let server = TestServer::start_with(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;
    let _first = server.connect("/users").await;

    let err = connect_async(format!("ws://{}/kitchen", server.addr))
        .await
        .unwrap_err();
    assert_matches!(err, WsError::Http(resp) if resp.status() == 503);
    server.stop().await;
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let server = TestServer::start().await;
    let mut user = server.connect("/users").await;

    server.server.shutdown().await;

    let end = tokio::time::timeout(WAIT, async {
        loop {
            match user.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok());
}

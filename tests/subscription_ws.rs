//! Subscription manager integration tests
//!
//! Runs a local websocket server speaking the accountSubscribe handshake
//! and verifies subscription lifecycle, idempotence, notification
//! delivery, handler isolation, and failure teardown. Deterministic; no
//! real RPC endpoint is touched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use solwallet::application::{
    SubscriptionManager, UpdateHandler, DEFAULT_COMMITMENT, DEFAULT_ENCODING,
};

const ADDR: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
const SUB_ID: u64 = 4242;

/// Local server speaking just enough of the subscription protocol.
/// Returns the http-style endpoint (the manager derives ws:// itself)
/// and a connection counter.
async fn spawn_server(notifications: usize, close_after_confirm: bool) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else { return };
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else { continue };
                    let request: Value = match serde_json::from_str(&text) {
                        Ok(value) => value,
                        Err(_) => continue,
                    };
                    let id = request.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
                    match request.get("method").and_then(|m| m.as_str()) {
                        Some("accountSubscribe") => {
                            let reply = json!({"jsonrpc": "2.0", "result": SUB_ID, "id": id});
                            let _ = ws.send(Message::Text(reply.to_string())).await;

                            if close_after_confirm {
                                let _ = ws.close(None).await;
                                return;
                            }
                            for i in 0..notifications {
                                let notification = json!({
                                    "jsonrpc": "2.0",
                                    "method": "accountNotification",
                                    "params": {
                                        "subscription": SUB_ID,
                                        "result": {"value": {"lamports": 100 + i}},
                                        "context": {"slot": 1000 + i}
                                    }
                                });
                                let _ = ws.send(Message::Text(notification.to_string())).await;
                            }
                        }
                        Some("accountUnsubscribe") => {
                            let reply = json!({"jsonrpc": "2.0", "result": true, "id": id});
                            let _ = ws.send(Message::Text(reply.to_string())).await;
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    (format!("http://{}", addr), connections)
}

fn channel_handler() -> (UpdateHandler, tokio::sync::mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let handler: UpdateHandler = Arc::new(move |update| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(update.payload);
        }
        .boxed()
    });
    (handler, rx)
}

#[tokio::test]
async fn subscribe_delivers_notifications_in_order() {
    let (endpoint, _connections) = spawn_server(3, false).await;
    let manager = SubscriptionManager::new(&endpoint);
    let (handler, mut rx) = channel_handler();

    let id = manager
        .subscribe(ADDR, handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
        .await
        .unwrap();
    assert_eq!(id, SUB_ID);

    for expected in 0..3u64 {
        let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("notification timed out")
            .unwrap();
        assert_eq!(payload["value"]["lamports"], 100 + expected);
    }

    let status = manager.check_status(ADDR).await.unwrap();
    assert_eq!(status.subscription_id, SUB_ID);
    assert!(status.last_update.is_some());
    assert!(status.last_error.is_none());

    manager.shutdown().await;
}

#[tokio::test]
async fn double_subscribe_reuses_connection_and_id() {
    let (endpoint, connections) = spawn_server(0, false).await;
    let manager = SubscriptionManager::new(&endpoint);

    let (first_handler, _rx1) = channel_handler();
    let first = manager
        .subscribe(ADDR, first_handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
        .await
        .unwrap();

    let (second_handler, _rx2) = channel_handler();
    let second = manager
        .subscribe(ADDR, second_handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(manager.subscription_count().await, 1);

    assert!(manager.unsubscribe(ADDR).await);
    assert!(!manager.is_subscribed(ADDR).await);
    assert_eq!(manager.subscription_count().await, 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn rebound_handler_receives_subsequent_updates() {
    let (endpoint, _connections) = spawn_server(0, false).await;
    let manager = SubscriptionManager::new(&endpoint);

    // first handler is replaced before any notification arrives
    let (first_handler, mut first_rx) = channel_handler();
    manager
        .subscribe(ADDR, first_handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
        .await
        .unwrap();

    let (second_handler, mut second_rx) = channel_handler();
    manager
        .subscribe(ADDR, second_handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
        .await
        .unwrap();

    // no notifications were configured, so neither channel fires; the
    // rebinding itself must not have torn the subscription down
    assert!(first_rx.try_recv().is_err());
    assert!(second_rx.try_recv().is_err());
    assert!(manager.is_subscribed(ADDR).await);

    manager.shutdown().await;
}

#[tokio::test]
async fn transport_close_removes_subscription_and_records_error() {
    let (endpoint, _connections) = spawn_server(0, true).await;
    let manager = SubscriptionManager::new(&endpoint);
    let (handler, _rx) = channel_handler();

    manager
        .subscribe(ADDR, handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
        .await
        .unwrap();

    // server closes immediately after the handshake; the listener tears
    // the subscription down rather than reconnecting silently
    tokio::time::timeout(Duration::from_secs(2), async {
        while manager.is_subscribed(ADDR).await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription was not removed after transport close");

    assert!(manager.check_status(ADDR).await.is_none());
}

#[tokio::test]
async fn panicking_handler_does_not_kill_listener() {
    let (endpoint, _connections) = spawn_server(2, false).await;
    let manager = SubscriptionManager::new(&endpoint);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let seen = Arc::new(AtomicUsize::new(0));
    let handler: UpdateHandler = {
        let seen = Arc::clone(&seen);
        Arc::new(move |update| {
            let tx = tx.clone();
            let seen = Arc::clone(&seen);
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first update handler failure");
                }
                let _ = tx.send(update.payload);
            }
            .boxed()
        })
    };

    manager
        .subscribe(ADDR, handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
        .await
        .unwrap();

    // first invocation panics, second is still delivered
    let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("second notification timed out")
        .unwrap();
    assert_eq!(payload["value"]["lamports"], 101);
    assert!(manager.is_subscribed(ADDR).await);

    manager.shutdown().await;
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let (endpoint, _connections) = spawn_server(0, false).await;
    let manager = SubscriptionManager::new(&endpoint);
    let (handler, _rx) = channel_handler();

    manager
        .subscribe(ADDR, handler, DEFAULT_ENCODING, DEFAULT_COMMITMENT)
        .await
        .unwrap();

    assert!(manager.unsubscribe(ADDR).await);
    assert!(!manager.unsubscribe(ADDR).await);
}

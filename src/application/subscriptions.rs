//! Account subscription manager.
//!
//! One websocket connection and one listener task per watched address.
//! Notifications flow to a caller-supplied handler; transport failure
//! tears the subscription down and records the error for inspection.
//! There is deliberately no auto-reconnect: a silent reconnect could hide
//! a coverage gap from the caller, who must re-subscribe explicitly.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::domain::address::validate_address;

/// Default account-data encoding requested on subscribe.
pub const DEFAULT_ENCODING: &str = "jsonParsed";
/// Default commitment level requested on subscribe.
pub const DEFAULT_COMMITMENT: &str = "finalized";

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Handler invoked for every account notification, in arrival order.
pub type UpdateHandler =
    Arc<dyn Fn(AccountUpdate) -> futures::future::BoxFuture<'static, ()> + Send + Sync>;

/// One decoded account notification.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub address: String,
    pub payload: Value,
    pub context: Option<Value>,
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("invalid account address: {0}")]
    InvalidAddress(String),
    #[error("WebSocket connection failed: {0}")]
    Connection(String),
    #[error("subscription handshake failed: {0}")]
    Handshake(String),
}

/// Read-only view of a live subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionStatus {
    pub address: String,
    pub subscription_id: u64,
    pub ws_url: String,
    pub encoding: String,
    pub commitment: String,
    pub last_update: Option<Value>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SubscriptionState {
    last_update: Option<Value>,
    last_error: Option<String>,
}

struct Subscription {
    subscription_id: u64,
    ws_url: String,
    encoding: String,
    commitment: String,
    writer: Arc<Mutex<WsSink>>,
    state: Arc<RwLock<SubscriptionState>>,
    handler: Arc<RwLock<UpdateHandler>>,
    listener: JoinHandle<()>,
}

/// Derive the push endpoint from an RPC endpoint.
pub fn ws_url_from_rpc(rpc_url: &str) -> String {
    if rpc_url.starts_with("wss://") || rpc_url.starts_with("ws://") {
        rpc_url.to_string()
    } else if let Some(rest) = rpc_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = rpc_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        "wss://api.mainnet-beta.solana.com".to_string()
    }
}

fn message_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text),
        Message::Binary(bytes) => String::from_utf8(bytes).ok(),
        _ => None,
    }
}

/// Pull the notification payload out of a frame. The payload may sit at
/// the top level (`result`) or nested under `params.result`; both shapes
/// occur in the wild and both must be handled.
fn extract_notification(value: &Value) -> Option<(Value, Option<Value>)> {
    if let Some(result) = value.get("result") {
        if result.is_object() {
            let context = value
                .get("context")
                .cloned()
                .or_else(|| value.pointer("/params/context").cloned());
            return Some((result.clone(), context));
        }
    }
    let params = value.get("params")?;
    let result = params.get("result")?;
    if result.is_object() {
        return Some((result.clone(), params.get("context").cloned()));
    }
    None
}

/// Manager for account-change push subscriptions.
pub struct SubscriptionManager {
    ws_url: String,
    subs: Arc<Mutex<HashMap<String, Subscription>>>,
    request_ids: AtomicU64,
}

impl SubscriptionManager {
    /// Create a manager for the given RPC endpoint; the websocket URL is
    /// derived from it.
    pub fn new(rpc_url: &str) -> Self {
        Self {
            ws_url: ws_url_from_rpc(rpc_url),
            subs: Arc::new(Mutex::new(HashMap::new())),
            request_ids: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_ids.fetch_add(1, Ordering::SeqCst)
    }

    /// Subscribe to account changes. Subscribing to an already-watched
    /// address rebinds the handler and returns the existing id without
    /// opening a second connection.
    pub async fn subscribe(
        &self,
        address: &str,
        handler: UpdateHandler,
        encoding: &str,
        commitment: &str,
    ) -> Result<u64, SubscribeError> {
        if !validate_address(address) {
            return Err(SubscribeError::InvalidAddress(address.to_string()));
        }

        let mut subs = self.subs.lock().await;
        if let Some(existing) = subs.get(address) {
            *existing.handler.write().await = handler;
            return Ok(existing.subscription_id);
        }

        let (stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| SubscribeError::Connection(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        let request_id = self.next_request_id();
        let request = json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": "accountSubscribe",
            "params": [
                address,
                { "encoding": encoding, "commitment": commitment }
            ]
        });

        if let Err(e) = write.send(Message::Text(request.to_string())).await {
            return Err(SubscribeError::Handshake(e.to_string()));
        }

        let subscription_id = match await_confirmation(&mut read, request_id).await {
            Ok(id) => id,
            Err(e) => {
                let _ = write.close().await;
                return Err(e);
            }
        };

        let writer = Arc::new(Mutex::new(write));
        let state = Arc::new(RwLock::new(SubscriptionState::default()));
        let handler = Arc::new(RwLock::new(handler));

        let listener = tokio::spawn(listen_loop(
            address.to_string(),
            subscription_id,
            read,
            Arc::clone(&state),
            Arc::clone(&handler),
            Arc::clone(&writer),
            Arc::clone(&self.subs),
        ));

        subs.insert(
            address.to_string(),
            Subscription {
                subscription_id,
                ws_url: self.ws_url.clone(),
                encoding: encoding.to_string(),
                commitment: commitment.to_string(),
                writer,
                state,
                handler,
                listener,
            },
        );

        info!("subscribed to account {} with id {}", address, subscription_id);
        Ok(subscription_id)
    }

    /// Tear a subscription down. The address leaves the live set whether
    /// or not the unsubscribe handshake succeeds.
    pub async fn unsubscribe(&self, address: &str) -> bool {
        let sub = self.subs.lock().await.remove(address);
        let Some(sub) = sub else {
            warn!("no subscription found for account {}", address);
            return false;
        };
        self.teardown(address, sub).await;
        true
    }

    async fn teardown(&self, address: &str, sub: Subscription) {
        let Subscription {
            listener,
            writer,
            subscription_id,
            ..
        } = sub;
        listener.abort();

        let frame = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id(),
            "method": "accountUnsubscribe",
            "params": [subscription_id]
        })
        .to_string();

        {
            let mut writer = writer.lock().await;
            if let Err(e) = writer.send(Message::Text(frame)).await {
                debug!("unsubscribe handshake failed for {}: {}", address, e);
            }
            let _ = writer.close().await;
        }

        // await the cancelled listener so nothing is left orphaned
        let _ = listener.await;
        info!("unsubscribed from account {}", address);
    }

    /// Non-blocking inspection of a live subscription.
    pub async fn check_status(&self, address: &str) -> Option<SubscriptionStatus> {
        let subs = self.subs.lock().await;
        let sub = subs.get(address)?;
        let state = sub.state.read().await;
        Some(SubscriptionStatus {
            address: address.to_string(),
            subscription_id: sub.subscription_id,
            ws_url: sub.ws_url.clone(),
            encoding: sub.encoding.clone(),
            commitment: sub.commitment.clone(),
            last_update: state.last_update.clone(),
            last_error: state.last_error.clone(),
        })
    }

    pub async fn is_subscribed(&self, address: &str) -> bool {
        self.subs.lock().await.contains_key(address)
    }

    pub async fn subscription_count(&self) -> usize {
        self.subs.lock().await.len()
    }

    /// Cancel every listener and close every transport.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, Subscription)> = {
            let mut subs = self.subs.lock().await;
            subs.drain().collect()
        };
        for (address, sub) in drained {
            self.teardown(&address, sub).await;
        }
    }
}

async fn await_confirmation(read: &mut WsSource, request_id: u64) -> Result<u64, SubscribeError> {
    let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(SubscribeError::Handshake(
                "timed out waiting for subscription id".to_string(),
            ));
        }

        let frame = tokio::time::timeout(remaining, read.next())
            .await
            .map_err(|_| {
                SubscribeError::Handshake("timed out waiting for subscription id".to_string())
            })?;

        let message = match frame {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(SubscribeError::Handshake(e.to_string())),
            None => {
                return Err(SubscribeError::Handshake(
                    "connection closed during handshake".to_string(),
                ))
            }
        };

        let Some(text) = message_text(message) else { continue };
        let Ok(value) = serde_json::from_str::<Value>(&text) else { continue };

        if value.get("id").and_then(|v| v.as_u64()) != Some(request_id) {
            continue;
        }
        if let Some(subscription_id) = value.get("result").and_then(|v| v.as_u64()) {
            return Ok(subscription_id);
        }
        let detail = value
            .get("error")
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no subscription id returned".to_string());
        return Err(SubscribeError::Handshake(detail));
    }
}

#[allow(clippy::too_many_arguments)]
async fn listen_loop(
    address: String,
    subscription_id: u64,
    mut read: WsSource,
    state: Arc<RwLock<SubscriptionState>>,
    handler: Arc<RwLock<UpdateHandler>>,
    writer: Arc<Mutex<WsSink>>,
    subs: Arc<Mutex<HashMap<String, Subscription>>>,
) {
    loop {
        match read.next().await {
            Some(Ok(Message::Close(_))) => {
                state.write().await.last_error = Some("connection closed by server".to_string());
                break;
            }
            Some(Ok(message)) => {
                // Binary frames are decoded as text; malformed frames are
                // ignored rather than terminating the listener.
                let Some(text) = message_text(message) else { continue };
                let Ok(value) = serde_json::from_str::<Value>(&text) else { continue };
                let Some((payload, context)) = extract_notification(&value) else { continue };

                state.write().await.last_update = Some(payload.clone());

                let current = handler.read().await.clone();
                let update = AccountUpdate {
                    address: address.clone(),
                    payload,
                    context,
                };
                // A panicking handler must not kill the listener.
                if AssertUnwindSafe(current(update)).catch_unwind().await.is_err() {
                    error!("account update handler panicked for {}", address);
                }
            }
            Some(Err(e)) => {
                state.write().await.last_error = Some(e.to_string());
                error!("account subscription listener error for {}: {}", address, e);
                break;
            }
            None => {
                state.write().await.last_error = Some("connection closed".to_string());
                break;
            }
        }
    }

    // The subscription is gone: close the transport and leave the live
    // set so the caller sees the gap and can re-subscribe explicitly.
    {
        let mut writer = writer.lock().await;
        let _ = writer.close().await;
    }
    let mut subs = subs.lock().await;
    if subs.get(&address).map(|s| s.subscription_id) == Some(subscription_id) {
        subs.remove(&address);
    }
}

//! Realtime change feed over a Phoenix-channel websocket.
//!
//! One connection task owns the socket. It forwards queued outbound frames,
//! sends heartbeats, resolves join replies and hands decoded row changes to
//! a [`ChangeHub`]. Each subscription joins its own channel topic and only
//! receives the events arriving on that topic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use rental_core::{ChangeCallback, ChangeFeed, ChangeHub, StoreError, SubscriptionHandle};
use rental_proto::{ChangeEvent, ChangeFilter, ChangeType};

use crate::config::RealtimeConfig;
use crate::error::Error;

/// Protocol event names.
pub mod events {
    pub const PHX_JOIN: &str = "phx_join";
    pub const PHX_LEAVE: &str = "phx_leave";
    pub const PHX_REPLY: &str = "phx_reply";
    pub const PHX_ERROR: &str = "phx_error";
    pub const PHX_CLOSE: &str = "phx_close";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const POSTGRES_CHANGES: &str = "postgres_changes";
}

/// Topic heartbeats are sent on.
pub const PHOENIX_TOPIC: &str = "phoenix";

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    schema: String,
    table: String,
    #[serde(rename = "type")]
    change_type: ChangeType,
    #[serde(default)]
    commit_timestamp: Option<String>,
    #[serde(default)]
    record: Value,
    #[serde(default)]
    old_record: Value,
}

/// Join payload asking for row changes inside `filter`.
pub fn join_payload(filter: &ChangeFilter, access_token: Option<&str>) -> Value {
    let mut payload = json!({
        "config": {
            "broadcast": { "ack": false, "self": false },
            "presence": { "key": "" },
            "postgres_changes": [{
                "event": filter.event.as_str(),
                "schema": filter.schema,
                "table": filter.table,
            }],
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    payload
}

/// Decode the payload of a `postgres_changes` frame.
pub fn decode_change(payload: &Value) -> Result<ChangeEvent, Error> {
    let ChangePayload { data } = ChangePayload::deserialize(payload)?;
    Ok(ChangeEvent {
        schema: data.schema,
        table: data.table,
        change_type: data.change_type,
        commit_timestamp: data.commit_timestamp,
        new_record: data.record,
        old_record: data.old_record,
    })
}

type JoinReply = oneshot::Sender<Result<(), String>>;

/// State shared between the client, the connection task and subscription
/// handles.
struct Shared {
    hub: ChangeHub,
    outbound: mpsc::UnboundedSender<String>,
    /// Joined topics and the subscription each one feeds.
    channels: Mutex<HashMap<String, u64>>,
    /// Join requests waiting for a reply, by message ref.
    pending: Mutex<HashMap<String, JoinReply>>,
    next_ref: AtomicU64,
}

impl Shared {
    fn new(hub: ChangeHub, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            hub,
            outbound,
            channels: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_ref: AtomicU64::new(1),
        }
    }

    fn next_ref(&self) -> String {
        self.next_ref.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn send(&self, topic: &str, event: &str, payload: Value, reference: String) -> Result<(), Error> {
        let frame = Frame {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: Some(reference),
        };
        let text = serde_json::to_string(&frame)?;
        self.outbound.send(text).map_err(|_| Error::Closed)
    }

    /// Reserve a topic for `subscription_id`. The first subscriber gets the
    /// plain channel name, later ones a suffixed one.
    fn claim_topic(&self, channel: &str, subscription_id: u64) -> String {
        let mut channels = self.channels.lock();
        let plain = format!("realtime:{channel}");
        let topic = if channels.contains_key(&plain) {
            format!("{plain}-{subscription_id}")
        } else {
            plain
        };
        channels.insert(topic.clone(), subscription_id);
        topic
    }

    fn release(&self, topic: &str, subscription_id: u64) {
        self.channels.lock().remove(topic);
        self.hub.remove(subscription_id);
    }

    fn leave(&self, topic: &str, subscription_id: u64) {
        self.release(topic, subscription_id);
        let reference = self.next_ref();
        if self.send(topic, events::PHX_LEAVE, json!({}), reference).is_err() {
            tracing::debug!(topic, "connection already closed, leave not sent");
        } else {
            tracing::debug!(topic, subscription_id, "left realtime channel");
        }
    }

    fn handle_text(&self, text: &str) {
        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed realtime frame");
                return;
            }
        };

        match frame.event.as_str() {
            events::PHX_REPLY => self.handle_reply(&frame),
            events::POSTGRES_CHANGES => self.handle_change(&frame),
            events::PHX_ERROR | events::PHX_CLOSE => {
                tracing::warn!(topic = %frame.topic, event = %frame.event, "channel closed by server");
            }
            _ => tracing::trace!(topic = %frame.topic, event = %frame.event, "ignoring frame"),
        }
    }

    fn handle_reply(&self, frame: &Frame) {
        let waiter = match &frame.reference {
            Some(reference) => self.pending.lock().remove(reference),
            None => None,
        };
        let Some(waiter) = waiter else {
            return;
        };

        let result = match frame.payload["status"].as_str() {
            Some("ok") => Ok(()),
            _ => Err(frame.payload["response"].to_string()),
        };
        let _ = waiter.send(result);
    }

    fn handle_change(&self, frame: &Frame) {
        let subscription_id = self.channels.lock().get(&frame.topic).copied();
        let Some(subscription_id) = subscription_id else {
            tracing::trace!(topic = %frame.topic, "change on unknown topic");
            return;
        };

        match decode_change(&frame.payload) {
            Ok(event) => {
                self.hub.deliver(subscription_id, &event);
            }
            Err(e) => {
                tracing::warn!(topic = %frame.topic, error = %e, "undecodable change payload");
            }
        }
    }

    fn fail_pending(&self) {
        for (_, waiter) in self.pending.lock().drain() {
            let _ = waiter.send(Err("connection closed".to_string()));
        }
    }
}

/// Websocket change feed.
///
/// Dropping the client closes the connection; it is not re-established
/// automatically.
pub struct RealtimeClient {
    config: RealtimeConfig,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl RealtimeClient {
    /// Open the websocket and start the connection task.
    pub async fn connect(config: RealtimeConfig) -> Result<Self, Error> {
        let (socket, _response) = tokio_tungstenite::connect_async(config.url.as_str()).await?;
        tracing::info!(channel = %config.channel, "realtime connection established");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(ChangeHub::new(), outbound_tx));
        let task = tokio::spawn(run_connection(
            socket,
            outbound_rx,
            shared.clone(),
            config.heartbeat_interval,
        ));

        Ok(Self {
            config,
            shared,
            task,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Get the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.hub.subscription_count()
    }

    /// Join a channel for `filter` and route its events to `callback`.
    /// Resolves once the server acknowledges the join.
    pub async fn join(
        &self,
        filter: ChangeFilter,
        callback: ChangeCallback,
    ) -> Result<SubscriptionHandle, Error> {
        let payload = join_payload(&filter, self.config.access_token.as_deref());
        let subscription_id = self.shared.hub.register(filter, callback);
        let topic = self.shared.claim_topic(&self.config.channel, subscription_id);

        let reference = self.shared.next_ref();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.pending.lock().insert(reference.clone(), reply_tx);

        let outcome = match self.shared.send(&topic, events::PHX_JOIN, payload, reference.clone()) {
            Ok(()) => match tokio::time::timeout(self.config.join_timeout, reply_rx).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(reason))) => Err(Error::Join(reason)),
                Ok(Err(_)) => Err(Error::Closed),
                Err(_) => Err(Error::Timeout),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            self.shared.pending.lock().remove(&reference);
            self.shared.release(&topic, subscription_id);
            tracing::warn!(topic = %topic, error = %e, "realtime join failed");
            return Err(e);
        }

        tracing::info!(topic = %topic, subscription_id, "joined realtime channel");

        let shared = Arc::downgrade(&self.shared);
        Ok(SubscriptionHandle::new(subscription_id, move || {
            if let Some(shared) = shared.upgrade() {
                shared.leave(&topic, subscription_id);
            }
        }))
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl ChangeFeed for RealtimeClient {
    async fn subscribe(
        &self,
        filter: ChangeFilter,
        callback: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        Ok(self.join(filter, callback).await?)
    }
}

async fn run_connection<S>(
    socket: S,
    mut outbound: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
    heartbeat_interval: std::time::Duration,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = socket.split();
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => shared.handle_text(text.as_str()),
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("realtime server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "realtime read error");
                    break;
                }
                None => {
                    tracing::info!("realtime stream ended");
                    break;
                }
            },
            Some(text) = outbound.recv() => {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "realtime write error");
                    break;
                }
            }
            _ = heartbeat.tick() => {
                let reference = shared.next_ref();
                let frame = Frame {
                    topic: PHOENIX_TOPIC.to_string(),
                    event: events::HEARTBEAT.to_string(),
                    payload: json!({}),
                    reference: Some(reference),
                };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "realtime heartbeat failed");
                    break;
                }
                tracing::trace!("realtime heartbeat sent");
            }
        }
    }

    shared.fail_pending();
    let _ = write.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rental_proto::EventFilter;

    fn recorder() -> (ChangeCallback, Arc<Mutex<Vec<ChangeEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ChangeCallback = Arc::new(move |event| sink.lock().push(event.clone()));
        (callback, seen)
    }

    fn change_frame(topic: &str, change_type: &str, status: &str) -> String {
        json!({
            "topic": topic,
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "data": {
                    "schema": "public",
                    "table": "reservations",
                    "type": change_type,
                    "commit_timestamp": "2024-06-14T10:00:00Z",
                    "record": { "id": "r-1", "status": status },
                    "old_record": { "id": "r-1" },
                    "columns": [],
                    "errors": null
                },
                "ids": [12]
            }
        })
        .to_string()
    }

    #[test]
    fn test_join_payload() {
        let payload = join_payload(&ChangeFilter::reservations(), Some("user-jwt"));
        let changes = &payload["config"]["postgres_changes"][0];
        assert_eq!(changes["event"], "*");
        assert_eq!(changes["schema"], "public");
        assert_eq!(changes["table"], "reservations");
        assert_eq!(payload["access_token"], "user-jwt");

        let filter = ChangeFilter::reservations().with_event(EventFilter::Only(ChangeType::Update));
        let payload = join_payload(&filter, None);
        assert_eq!(payload["config"]["postgres_changes"][0]["event"], "UPDATE");
        assert!(payload.get("access_token").is_none());
    }

    #[test]
    fn test_decode_change() {
        let frame: Frame = serde_json::from_str(&change_frame("realtime:x", "UPDATE", "confirmed")).unwrap();
        let event = decode_change(&frame.payload).unwrap();

        assert_eq!(event.schema, "public");
        assert_eq!(event.table, "reservations");
        assert_eq!(event.change_type, ChangeType::Update);
        assert_eq!(event.commit_timestamp.as_deref(), Some("2024-06-14T10:00:00Z"));
        assert_eq!(event.new_record["status"], "confirmed");
        assert_eq!(event.old_record["id"], "r-1");
    }

    #[test]
    fn test_decode_delete_without_record() {
        let payload = json!({
            "data": {
                "schema": "public",
                "table": "reservations",
                "type": "DELETE",
                "old_record": { "id": "r-1" }
            }
        });
        let event = decode_change(&payload).unwrap();
        assert_eq!(event.change_type, ChangeType::Delete);
        assert!(event.new_record.is_null());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_change(&json!({ "data": { "type": "TRUNCATE" } })).is_err());
        assert!(decode_change(&json!("nope")).is_err());
    }

    #[test]
    fn test_frame_wire_shape() {
        let frame = Frame {
            topic: "phoenix".into(),
            event: "heartbeat".into(),
            payload: json!({}),
            reference: Some("7".into()),
        };
        let value: Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["ref"], "7");
        assert_eq!(value["topic"], "phoenix");
    }

    #[test]
    fn test_changes_routed_by_topic() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let shared = Shared::new(ChangeHub::new(), tx);
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();

        let first_id = shared.hub.register(ChangeFilter::reservations(), first);
        let first_topic = shared.claim_topic("reservation_updates", first_id);
        let second_id = shared.hub.register(ChangeFilter::reservations(), second);
        let second_topic = shared.claim_topic("reservation_updates", second_id);

        assert_eq!(first_topic, "realtime:reservation_updates");
        assert_eq!(second_topic, format!("realtime:reservation_updates-{second_id}"));

        shared.handle_text(&change_frame(&first_topic, "INSERT", "pending"));
        shared.handle_text(&change_frame(&second_topic, "UPDATE", "confirmed"));
        shared.handle_text(&change_frame("realtime:other", "UPDATE", "cancelled"));
        shared.handle_text("not json");

        assert_eq!(first_seen.lock().len(), 1);
        assert_eq!(first_seen.lock()[0].change_type, ChangeType::Insert);
        assert_eq!(second_seen.lock().len(), 1);
        assert_eq!(second_seen.lock()[0].new_record["status"], "confirmed");
    }

    #[test]
    fn test_reply_resolves_pending_join() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let shared = Shared::new(ChangeHub::new(), tx);

        let (ok_tx, mut ok_rx) = oneshot::channel();
        let (err_tx, mut err_rx) = oneshot::channel();
        shared.pending.lock().insert("1".into(), ok_tx);
        shared.pending.lock().insert("2".into(), err_tx);

        shared.handle_text(
            &json!({"topic": "realtime:a", "event": "phx_reply", "ref": "1",
                    "payload": {"status": "ok", "response": {}}})
            .to_string(),
        );
        shared.handle_text(
            &json!({"topic": "realtime:b", "event": "phx_reply", "ref": "2",
                    "payload": {"status": "error", "response": {"reason": "unauthorized"}}})
            .to_string(),
        );

        assert_eq!(ok_rx.try_recv().unwrap(), Ok(()));
        let reason = err_rx.try_recv().unwrap().unwrap_err();
        assert!(reason.contains("unauthorized"));
        assert!(shared.pending.lock().is_empty());
    }

    #[test]
    fn test_leave_releases_topic_and_sends_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shared = Shared::new(ChangeHub::new(), tx);
        let (callback, seen) = recorder();

        let id = shared.hub.register(ChangeFilter::reservations(), callback);
        let topic = shared.claim_topic("reservation_updates", id);
        shared.leave(&topic, id);

        let sent: Frame = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(sent.event, "phx_leave");
        assert_eq!(sent.topic, "realtime:reservation_updates");

        shared.handle_text(&change_frame(&topic, "UPDATE", "confirmed"));
        assert!(seen.lock().is_empty());
        assert_eq!(shared.hub.subscription_count(), 0);
    }
}

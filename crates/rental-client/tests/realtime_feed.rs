//! Realtime feed against a local websocket server speaking the channel
//! protocol.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message};

use rental_client::{Frame, HttpMailer, MailerConfig, RealtimeClient, RealtimeConfig, RestClient, StoreConfig};
use rental_core::{ChangeFeed, Error, ReservationService, StoreError};
use rental_proto::{ChangeEvent, ChangeFilter, ReservationRow};

async fn next_frame<S>(socket: &mut S) -> Frame
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame: Frame = serde_json::from_str(text.as_str()).unwrap();
                if frame.event == "heartbeat" {
                    continue;
                }
                return frame;
            }
            Some(Ok(_)) => continue,
            other => panic!("socket ended: {other:?}"),
        }
    }
}

fn text(value: serde_json::Value) -> Message {
    Message::Text(value.to_string().into())
}

fn change(topic: &str, table: &str, change_type: &str, record: serde_json::Value) -> Message {
    text(json!({
        "topic": topic,
        "event": "postgres_changes",
        "ref": null,
        "payload": {
            "data": {
                "schema": "public",
                "table": table,
                "type": change_type,
                "commit_timestamp": "2024-06-14T10:00:00Z",
                "record": record,
                "old_record": {}
            },
            "ids": [1]
        }
    }))
}

fn reservation_row(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "status": status,
        "start_date": "2024-06-14",
        "end_date": "2024-06-16",
        "total_price": 300.0
    })
}

/// Accept one connection, acknowledge the join, stream a few changes and
/// report the join frame and the topic that was left.
async fn spawn_server(accept_join: bool) -> (StoreConfig, oneshot::Receiver<(Frame, Frame)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

        let join = next_frame(&mut socket).await;
        assert_eq!(join.event, "phx_join");

        let status = if accept_join { "ok" } else { "error" };
        socket
            .send(text(json!({
                "topic": join.topic,
                "event": "phx_reply",
                "ref": join.reference,
                "payload": { "status": status, "response": { "reason": "denied" } }
            })))
            .await
            .unwrap();
        if !accept_join {
            let _ = socket.close(None).await;
            return;
        }

        let topic = join.topic.clone();
        socket
            .send(change(&topic, "reservations", "UPDATE", reservation_row("r-1", "confirmed")))
            .await
            .unwrap();
        socket
            .send(change(&topic, "reservations", "DELETE", json!({})))
            .await
            .unwrap();
        socket
            .send(change(&topic, "reservations", "INSERT", reservation_row("r-2", "pending")))
            .await
            .unwrap();

        let leave = next_frame(&mut socket).await;
        let _ = done_tx.send((join, leave));
    });

    let config = StoreConfig::new(format!("http://{addr}"), "anon-key").with_access_token("user-jwt");
    (config, done_rx)
}

async fn service(config: &StoreConfig) -> ReservationService {
    let realtime = RealtimeConfig::from_store(config)
        .unwrap()
        .with_join_timeout(Duration::from_secs(5));
    let feed = RealtimeClient::connect(realtime).await.unwrap();
    let rest = Arc::new(RestClient::new(config.clone()).unwrap());
    let mailer = HttpMailer::new(MailerConfig::new("http://127.0.0.1:1/send", "biuro@example.com")).unwrap();

    ReservationService::new(rest.clone(), rest, Arc::new(mailer), Arc::new(feed))
}

#[tokio::test]
async fn test_subscriber_receives_row_images_until_unsubscribed() {
    let (config, done) = spawn_server(true).await;
    let service = service(&config).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<ReservationRow>();
    let handle = service
        .subscribe_to_updates(move |row| {
            let _ = tx.send(row);
        })
        .await
        .unwrap();

    let mut rows = Vec::new();
    for _ in 0..3 {
        let row = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        rows.push(row);
    }
    assert_eq!(rows[0].id.as_ref().unwrap().as_str(), "r-1");
    assert_eq!(rows[0].status.as_deref(), Some("confirmed"));
    assert!(rows[1].is_empty());
    assert_eq!(rows[2].id.as_ref().unwrap().as_str(), "r-2");
    assert_eq!(rows[2].status.as_deref(), Some("pending"));

    handle.unsubscribe();

    let (join, leave) = tokio::time::timeout(Duration::from_secs(5), done)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(join.topic, "realtime:reservation_updates");
    assert_eq!(join.payload["access_token"], "user-jwt");
    let changes = &join.payload["config"]["postgres_changes"][0];
    assert_eq!(changes["event"], "*");
    assert_eq!(changes["table"], "reservations");

    assert_eq!(leave.event, "phx_leave");
    assert_eq!(leave.topic, join.topic);
}

#[tokio::test]
async fn test_rejected_join_fails_subscription() {
    let (config, _done) = spawn_server(false).await;
    let service = service(&config).await;

    let err = service.subscribe_to_updates(|_| {}).await.unwrap_err();
    match err {
        Error::Subscription(StoreError::Transport(message)) => {
            assert!(message.contains("denied"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_change_feed_counts_subscriptions() {
    let (config, _done) = spawn_server(true).await;
    let client = RealtimeClient::connect(RealtimeConfig::from_store(&config).unwrap())
        .await
        .unwrap();

    let handle = client
        .subscribe(ChangeFilter::reservations(), Arc::new(|_: &ChangeEvent| {}))
        .await
        .unwrap();
    assert_eq!(client.subscription_count(), 1);

    drop(handle);
    assert_eq!(client.subscription_count(), 0);
}

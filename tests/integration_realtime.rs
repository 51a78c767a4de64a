mod common;

use catering_chat::api::events::{ChangeEvent, ChannelSpec};
use catering_chat::api::models::ConversationKey;
use catering_chat::api::realtime::{ChangeHandler, ClosedHandler, Subscription};
use catering_chat::error::ClientError;
use common::{CONVERSATION, MockRealtime, message_row, wait_until};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

struct Feed {
    subscription: Subscription,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    closed: mpsc::UnboundedReceiver<ClientError>,
}

async fn subscribe(realtime: &MockRealtime) -> Feed {
    let (tx, events) = mpsc::unbounded_channel();
    let handler: ChangeHandler = Arc::new(move |event| {
        let _ = tx.send(event);
    });
    let (closed_tx, closed) = mpsc::unbounded_channel();
    let on_closed: ClosedHandler = Arc::new(move |err| {
        let _ = closed_tx.send(err);
    });
    let url = Url::parse(&realtime.url).unwrap();
    let spec = ChannelSpec::messages(ConversationKey::new(CONVERSATION));
    let subscription = Subscription::connect(&url, spec, Some("jwt"), handler, on_closed).await.unwrap();
    Feed { subscription, events, closed }
}

#[tokio::test]
async fn join_frame_carries_filter_and_token() {
    let realtime = MockRealtime::spawn().await;
    let Feed { subscription, .. } = subscribe(&realtime).await;

    assert!(wait_until(|| realtime.events_received("phx_join") == 1).await);
    let join = realtime.received.lock().unwrap()[0].clone();
    assert_eq!(join["topic"], format!("realtime:messages:{CONVERSATION}"));
    assert_eq!(join["payload"]["access_token"], "jwt");
    let changes = join["payload"]["config"]["postgres_changes"].as_array().unwrap();
    assert!(changes.iter().all(|c| c["filter"] == format!("conversation_id=eq.{CONVERSATION}")));
    assert!(subscription.is_active());
}

#[tokio::test]
async fn matching_changes_reach_the_handler() {
    let realtime = MockRealtime::spawn().await;
    let Feed { subscription: _subscription, events: mut rx, .. } = subscribe(&realtime).await;

    let mut foreign = message_row("x-1", "vendor", "text", "Başka sohbet", "2026-10-18T09:00:00Z");
    foreign["conversation_id"] = json!("lead-2");
    realtime.push_change("INSERT", foreign);
    realtime.push_change("INSERT", message_row("m-1", "vendor", "text", "Merhaba", "2026-10-18T09:01:00Z"));

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.record_id(), Some("m-1"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn nothing_is_dispatched_after_disconnect() {
    let realtime = MockRealtime::spawn().await;
    let Feed { subscription, events: mut rx, mut closed } = subscribe(&realtime).await;

    realtime.push_change("INSERT", message_row("m-1", "vendor", "text", "İlk", "2026-10-18T09:01:00Z"));
    tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();

    subscription.disconnect().await;
    assert!(wait_until(|| realtime.events_received("phx_leave") == 1).await);

    realtime.push_change("INSERT", message_row("m-2", "vendor", "text", "Geç", "2026-10-18T09:02:00Z"));
    let next = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(next.is_none());
    let reason = tokio::time::timeout(Duration::from_secs(2), closed.recv()).await.unwrap();
    assert!(reason.is_none());
}

#[tokio::test]
async fn dropping_the_subscription_stops_dispatch() {
    let realtime = MockRealtime::spawn().await;
    let Feed { subscription, events: mut rx, mut closed } = subscribe(&realtime).await;
    drop(subscription);

    realtime.push_change("INSERT", message_row("m-1", "vendor", "text", "Geç", "2026-10-18T09:02:00Z"));
    let next = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(next.is_none());
    let reason = tokio::time::timeout(Duration::from_secs(2), closed.recv()).await.unwrap();
    assert!(reason.is_none());
}

#[tokio::test]
async fn channel_error_reports_why_the_feed_stopped() {
    let realtime = MockRealtime::spawn().await;
    let Feed { subscription, events: mut rx, mut closed } = subscribe(&realtime).await;

    realtime
        .push
        .send(json!({
            "topic": format!("realtime:messages:{CONVERSATION}"),
            "event": "phx_error",
            "ref": null,
            "payload": {}
        }))
        .unwrap();

    let reason = tokio::time::timeout(Duration::from_secs(2), closed.recv()).await.unwrap().unwrap();
    assert!(matches!(reason, ClientError::FeedClosed(_)));
    assert!(!subscription.is_active());
    let next = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn rejected_join_reports_server_reason() {
    let realtime = MockRealtime::spawn().await;
    let Feed { subscription: _subscription, mut closed, .. } = subscribe(&realtime).await;

    realtime
        .push
        .send(json!({
            "topic": format!("realtime:messages:{CONVERSATION}"),
            "event": "phx_reply",
            "ref": "1",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        }))
        .unwrap();

    let reason = tokio::time::timeout(Duration::from_secs(2), closed.recv()).await.unwrap().unwrap();
    assert_eq!(reason.to_string(), "live updates stopped: unauthorized");
}

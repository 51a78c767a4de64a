use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::api::models::ConversationKey;

pub const MESSAGES_TABLE: &str = "messages";
pub const HEARTBEAT_TOPIC: &str = "phoenix";

/// Phoenix channel frame as carried over the realtime websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// A row-level change delivered by the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record: Value,
    pub old_record: Option<Value>,
}

impl ChangeEvent {
    pub fn record_id(&self) -> Option<&str> {
        self.record.get("id").and_then(|v| v.as_str())
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.record.get("conversation_id").and_then(|v| v.as_str())
    }
}

/// What a subscription listens to: one table, rows of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub table: String,
    pub conversation: ConversationKey,
}

impl ChannelSpec {
    pub fn messages(conversation: ConversationKey) -> Self {
        Self { table: MESSAGES_TABLE.to_string(), conversation }
    }

    pub fn topic(&self) -> String {
        format!("realtime:{}:{}", self.table, self.conversation)
    }

    pub fn filter(&self) -> String {
        format!("conversation_id=eq.{}", self.conversation)
    }

    pub fn join_frame(&self, access_token: Option<&str>, reference: &str) -> Frame {
        let changes: Vec<Value> = ["INSERT", "UPDATE"]
            .iter()
            .map(|event| {
                json!({
                    "event": event,
                    "schema": "public",
                    "table": self.table,
                    "filter": self.filter(),
                })
            })
            .collect();
        let mut payload = json!({ "config": { "postgres_changes": changes } });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }
        Frame {
            topic: self.topic(),
            event: "phx_join".into(),
            payload,
            reference: Some(reference.to_string()),
        }
    }

    pub fn leave_frame(&self, reference: &str) -> Frame {
        Frame {
            topic: self.topic(),
            event: "phx_leave".into(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    /// The feed is best-effort and may forward rows the filter should have
    /// stopped, so every event is checked again here.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && event.conversation_id() == Some(self.conversation.as_str())
    }
}

pub fn heartbeat_frame(reference: &str) -> Frame {
    Frame {
        topic: HEARTBEAT_TOPIC.into(),
        event: "heartbeat".into(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Control messages the subscription loop cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingEvent {
    Change(ChangeEvent),
    JoinRejected(String),
    Closed,
    Ignored,
}

pub fn parse_incoming(text: &str) -> serde_json::Result<IncomingEvent> {
    let frame: Frame = serde_json::from_str(text)?;
    Ok(classify(frame))
}

fn classify(frame: Frame) -> IncomingEvent {
    match frame.event.as_str() {
        "postgres_changes" => {
            let data = frame.payload.get("data").unwrap_or(&frame.payload);
            let kind = data
                .get("type")
                .or_else(|| data.get("eventType"))
                .and_then(|v| v.as_str())
                .and_then(ChangeKind::parse);
            let table = data.get("table").and_then(|v| v.as_str()).unwrap_or_default();
            match (kind, data.get("record")) {
                (Some(kind), Some(record)) => IncomingEvent::Change(ChangeEvent {
                    table: table.to_string(),
                    kind,
                    record: record.clone(),
                    old_record: data.get("old_record").filter(|v| !v.is_null()).cloned(),
                }),
                _ => IncomingEvent::Ignored,
            }
        }
        "phx_reply" => {
            let status = frame.payload.get("status").and_then(|v| v.as_str());
            if status == Some("error") {
                let reason = frame
                    .payload
                    .pointer("/response/reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("join refused");
                IncomingEvent::JoinRejected(reason.to_string())
            } else {
                IncomingEvent::Ignored
            }
        }
        "phx_error" => IncomingEvent::JoinRejected("channel error".into()),
        "phx_close" => IncomingEvent::Closed,
        _ => IncomingEvent::Ignored,
    }
}

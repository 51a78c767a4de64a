#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use catering_chat::api::client::ApiClient;
use catering_chat::api::models::{SenderRole, Session};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub const CONVERSATION: &str = "lead-1";

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("catering_chat=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

pub fn message_row(id: &str, role: &str, kind: &str, content: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "conversation_id": CONVERSATION,
        "sender_id": format!("u-{role}"),
        "sender_role": role,
        "content": content,
        "message_type": kind,
        "is_read": false,
        "created_at": created_at,
    })
}

pub fn customer_session() -> Session {
    Session {
        access_token: "jwt-customer".into(),
        user_id: "u-customer".into(),
        role: SenderRole::Customer,
        display_name: None,
    }
}

pub fn vendor_session() -> Session {
    Session {
        access_token: "jwt-vendor".into(),
        user_id: "u-vendor".into(),
        role: SenderRole::Vendor,
        display_name: None,
    }
}

pub struct MockState {
    pub messages: Mutex<Vec<Value>>,
    pub created: Mutex<Vec<Value>>,
    pub read_requests: Mutex<Vec<Vec<String>>>,
    pub quote_patches: Mutex<Vec<(String, Value)>>,
    pub quote_response: Mutex<Value>,
    pub fail_sends: AtomicBool,
    pub message_fetches: AtomicUsize,
    pub send_gate: Semaphore,
    next_id: AtomicUsize,
}

pub struct MockBackend {
    pub url: String,
    pub state: Arc<MockState>,
}

async fn list_messages(
    State(st): State<Arc<MockState>>,
    Path(_key): Path<String>,
    Query(_query): Query<HashMap<String, String>>,
) -> Json<Value> {
    st.message_fetches.fetch_add(1, Ordering::SeqCst);
    let data = st.messages.lock().unwrap().clone();
    Json(json!({ "ok": true, "data": data }))
}

async fn create_message(State(st): State<Arc<MockState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let _permit = st.send_gate.acquire().await.unwrap();
    if st.fail_sends.load(Ordering::SeqCst) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "ok": false, "message": "Mesaj gönderilemedi" })),
        );
    }
    st.created.lock().unwrap().push(body.clone());
    let id = format!("srv-{}", st.next_id.fetch_add(1, Ordering::SeqCst) + 1);
    let content = body["content"].as_str().unwrap_or_default();
    let row = message_row(&id, "customer", "text", content, "2026-10-19T10:00:00Z");
    (StatusCode::OK, Json(json!({ "ok": true, "data": row })))
}

async fn mark_read(State(st): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    let ids = body["message_ids"]
        .as_array()
        .map(|ids| ids.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    st.read_requests.lock().unwrap().push(ids);
    Json(json!({ "ok": true }))
}

async fn patch_quote(
    State(st): State<Arc<MockState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    st.quote_patches.lock().unwrap().push((id, body));
    Json(st.quote_response.lock().unwrap().clone())
}

async fn create_quote(Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn token(Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if query.get("grant_type").map(String::as_str) != Some("password") || body["password"] != "dogru-sifre" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": "jwt-vendor",
            "token_type": "bearer",
            "user": {
                "id": "u-vendor",
                "email": body["email"],
                "user_metadata": { "role": "vendor", "full_name": "Lezzet Catering" }
            }
        })),
    )
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "<html>upstream down</html>")
}

impl MockBackend {
    pub async fn spawn() -> Self {
        Self::spawn_with_gate(Semaphore::MAX_PERMITS).await
    }

    pub async fn spawn_with_gate(permits: usize) -> Self {
        setup_tracing();
        let state = Arc::new(MockState {
            messages: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            read_requests: Mutex::new(Vec::new()),
            quote_patches: Mutex::new(Vec::new()),
            quote_response: Mutex::new(json!({ "ok": true })),
            fail_sends: AtomicBool::new(false),
            message_fetches: AtomicUsize::new(0),
            send_gate: Semaphore::new(permits),
            next_id: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/api/conversations", get(broken))
            .route("/api/conversations/{key}/messages", get(list_messages))
            .route("/api/messages", post(create_message))
            .route("/api/messages/read", post(mark_read))
            .route("/api/quotes", post(create_quote))
            .route("/api/quotes/{id}", patch(patch_quote))
            .route("/auth/v1/token", post(token))
            .route("/broken/auth/v1/token", post(broken))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { url: format!("http://{}", addr), state }
    }

    pub fn client(&self, session: &Session) -> ApiClient {
        ApiClient::new(&self.url, &self.url, "anon").unwrap().with_token(session.access_token.clone())
    }
}

/// Realtime endpoint that accepts one socket, records what the client sends
/// and forwards pushed frames to it.
pub struct MockRealtime {
    pub url: String,
    pub push: mpsc::UnboundedSender<Value>,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl MockRealtime {
    pub async fn spawn() -> Self {
        setup_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (push, mut pushed) = mpsc::unbounded_channel::<Value>();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            loop {
                tokio::select! {
                    frame = pushed.recv() => match frame {
                        Some(frame) => {
                            if ws.send(WsMessage::Text(frame.to_string())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    incoming = ws.next() => match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            let frame: Value = serde_json::from_str(&text).unwrap();
                            if frame["event"] == "phx_join" {
                                let reply = json!({
                                    "topic": frame["topic"],
                                    "event": "phx_reply",
                                    "ref": frame["ref"],
                                    "payload": { "status": "ok", "response": {} }
                                });
                                let _ = ws.send(WsMessage::Text(reply.to_string())).await;
                            }
                            log.lock().unwrap().push(frame);
                        }
                        Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                        Some(Ok(_)) => {}
                    },
                }
            }
        });

        Self {
            url: format!("ws://{}/realtime/v1/websocket?apikey=anon&vsn=1.0.0", addr),
            push,
            received,
        }
    }

    pub fn push_change(&self, kind: &str, record: Value) {
        let frame = json!({
            "topic": format!("realtime:messages:{CONVERSATION}"),
            "event": "postgres_changes",
            "ref": null,
            "payload": { "data": { "type": kind, "table": "messages", "schema": "public", "record": record } }
        });
        // The socket may already be gone after a teardown.
        let _ = self.push.send(frame);
    }

    pub fn events_received(&self, event: &str) -> usize {
        self.received.lock().unwrap().iter().filter(|f| f["event"] == event).count()
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use url::Url;

use crate::api::events::{ChangeEvent, ChannelSpec, Frame, IncomingEvent, heartbeat_frame, parse_incoming};
use crate::error::{ClientError, Result};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Told why the feed stopped when it was not torn down by the owner.
pub type ClosedHandler = Arc<dyn Fn(ClientError) + Send + Sync>;

/// Builds the realtime websocket endpoint for a backend base URL.
pub fn websocket_url(backend_url: &str, anon_key: &str) -> Result<Url> {
    let mut url = Url::parse(backend_url.trim_end_matches('/'))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(ClientError::Config(format!("unsupported backend scheme: {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Config("cannot derive websocket url".into()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

#[derive(Default)]
struct Refs(u64);

impl Refs {
    fn next(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}

fn encode(frame: &Frame) -> Result<WsMessage> {
    Ok(WsMessage::Text(serde_json::to_string(frame)?))
}

/// A live, filtered change feed for one conversation.
///
/// Events reach the handler only while the subscription is active.
/// `disconnect` (or dropping the value) deactivates it before the socket is
/// closed, so nothing is dispatched after teardown. If the server or the
/// network ends the feed instead, `on_closed` gets the reason once.
pub struct Subscription {
    spec: ChannelSpec,
    active: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.spec.topic())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    pub async fn connect(
        url: &Url,
        spec: ChannelSpec,
        access_token: Option<&str>,
        handler: ChangeHandler,
        on_closed: ClosedHandler,
    ) -> Result<Self> {
        let (mut ws, _) = connect_async(url.as_str()).await?;
        let mut refs = Refs::default();
        ws.send(encode(&spec.join_frame(access_token, &refs.next()))?).await?;
        log::info!("Joined {}", spec.topic());

        let active = Arc::new(AtomicBool::new(true));
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(pump(ws, spec.clone(), refs, active.clone(), handler, on_closed, rx));
        Ok(Self {
            spec,
            active,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    /// False once torn down or once the server closed the channel.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Leaves the channel and waits for the socket task to finish.
    pub async fn disconnect(mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        log::info!("Left {}", self.spec.topic());
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn pump<S>(
    mut ws: S,
    spec: ChannelSpec,
    mut refs: Refs,
    active: Arc<AtomicBool>,
    handler: ChangeHandler,
    on_closed: ClosedHandler,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: Stream<Item = std::result::Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Unpin,
{
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;
    let mut stopped: Option<String> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Ok(frame) = encode(&spec.leave_frame(&refs.next())) {
                    let _ = ws.send(frame).await;
                }
                let _ = ws.close().await;
                break;
            }
            _ = ticker.tick() => {
                let sent = match encode(&heartbeat_frame(&refs.next())) {
                    Ok(frame) => ws.send(frame).await.map_err(ClientError::from),
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    log::warn!("Heartbeat on {} failed: {e}", spec.topic());
                    stopped = Some(format!("heartbeat failed: {e}"));
                    break;
                }
            }
            incoming = ws.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => match parse_incoming(&text) {
                    Ok(IncomingEvent::Change(event)) => {
                        if !spec.matches(&event) {
                            log::debug!("Dropped foreign change on {}", spec.topic());
                            continue;
                        }
                        if !active.load(Ordering::SeqCst) {
                            break;
                        }
                        handler(event);
                    }
                    Ok(IncomingEvent::JoinRejected(reason)) => {
                        log::warn!("Channel {} rejected: {reason}", spec.topic());
                        stopped = Some(reason);
                        break;
                    }
                    Ok(IncomingEvent::Closed) => {
                        stopped = Some("channel closed by server".into());
                        break;
                    }
                    Ok(IncomingEvent::Ignored) => {}
                    Err(e) => log::debug!("Unreadable realtime frame: {e}"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    stopped = Some("connection closed".into());
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("Realtime socket error on {}: {e}", spec.topic());
                    stopped = Some(e.to_string());
                    break;
                }
            },
        }
    }

    let was_active = active.swap(false, Ordering::SeqCst);
    log::debug!("Subscription loop for {} finished", spec.topic());
    if let (true, Some(reason)) = (was_active, stopped) {
        on_closed(ClientError::FeedClosed(reason));
    }
}

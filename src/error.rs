use thiserror::Error;

pub const CONNECTION_ERROR: &str = "Connection error. Please try again.";
pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";
pub const FEED_CLOSED_ERROR: &str = "Live updates stopped. Reopen the conversation to reconnect.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request rejected: {}", .0.as_deref().unwrap_or("no message"))]
    Rejected(Option<String>),
    #[error("HTTP {0}")]
    Http(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("live updates stopped: {0}")]
    FeedClosed(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("cache error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Invalid(String),
    #[error("not signed in")]
    NotSignedIn,
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Text shown in the inline banner.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) | ClientError::WebSocket(_) => CONNECTION_ERROR.to_string(),
            ClientError::Rejected(Some(msg)) if !msg.trim().is_empty() => msg.clone(),
            ClientError::Invalid(msg) => msg.clone(),
            ClientError::NotSignedIn => "Please sign in again.".to_string(),
            ClientError::FeedClosed(_) => FEED_CLOSED_ERROR.to_string(),
            _ => GENERIC_ERROR.to_string(),
        }
    }
}

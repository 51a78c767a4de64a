use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ClientError, Result};

/// Prefix of client-side ids given to optimistic messages.
pub const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(pub String);

impl ConversationKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Vendor,
    Customer,
}

impl SenderRole {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderRole::Vendor => "vendor",
            SenderRole::Customer => "customer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    fn rank(self) -> u8 {
        match self {
            QuoteStatus::Draft => 0,
            QuoteStatus::Sent => 1,
            QuoteStatus::Viewed => 2,
            QuoteStatus::Accepted | QuoteStatus::Rejected | QuoteStatus::Expired => 3,
        }
    }

    /// Statuses a customer can still accept or reject.
    pub fn is_actionable(self) -> bool {
        matches!(self, QuoteStatus::Sent | QuoteStatus::Viewed)
    }

    pub fn is_final(self) -> bool {
        self.rank() == 3
    }

    /// Whether moving from `self` to `next` keeps the status monotonic.
    /// Final statuses never change again.
    pub fn can_advance_to(self, next: QuoteStatus) -> bool {
        if self.is_final() {
            return self == next;
        }
        next.rank() >= self.rank()
    }

    pub fn label(self) -> &'static str {
        match self {
            QuoteStatus::Draft => "Draft",
            QuoteStatus::Sent => "Sent",
            QuoteStatus::Viewed => "Viewed",
            QuoteStatus::Accepted => "Accepted",
            QuoteStatus::Rejected => "Rejected",
            QuoteStatus::Expired => "Expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: String,
    pub total_price: f64,
    #[serde(default)]
    pub price_per_person: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    pub status: QuoteStatus,
}

impl Quote {
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|deadline| deadline < now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: ConversationKey,
    pub sender_id: String,
    pub sender_role: SenderRole,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "message_type", alias = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub quote_id: Option<String>,
    #[serde(default, alias = "quotes")]
    pub quote: Option<Quote>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationKey,
    pub counterpart_name: String,
    #[serde(default)]
    pub last_message: Option<String>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub unread_count: u32,
}

/// Response wrapper returned by every application endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<Option<T>> {
        if self.ok {
            Ok(self.data)
        } else {
            Err(ClientError::Rejected(self.message))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub conversation_id: ConversationKey,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewQuote {
    pub conversation_id: ConversationKey,
    pub total_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_person: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDecision {
    Accept,
    Reject,
}

impl QuoteDecision {
    pub fn status(self) -> QuoteStatus {
        match self {
            QuoteDecision::Accept => QuoteStatus::Accepted,
            QuoteDecision::Reject => QuoteStatus::Rejected,
        }
    }
}

/// Body of a quote mutation. `message` is present when the backend returns
/// the message it synthesized for the quote.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteOutcome {
    #[serde(default)]
    pub quote: Option<Quote>,
    #[serde(default)]
    pub message: Option<Message>,
}

/// Signed-in user as returned by the password grant.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub role: SenderRole,
    pub display_name: Option<String>,
}

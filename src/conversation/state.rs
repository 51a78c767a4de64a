use chrono::{DateTime, Utc};

use crate::api::events::{ChangeEvent, ChangeKind};
use crate::api::models::{
    ConversationKey, Message, MessageKind, Quote, QuoteOutcome, SenderRole, TEMP_ID_PREFIX,
};
use crate::conversation::quote_card;
use crate::error::{ClientError, Result};

/// Follow-up work requested by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Tell the backend this incoming message was seen. Fire and forget.
    MarkRead(String),
    /// Reload the conversation from the server; the local copy cannot
    /// represent what changed.
    Refresh,
}

/// Local view of one conversation, kept oldest first.
///
/// Both the change feed and user actions write here. There is no sequence
/// numbering: inserts are de-duplicated by id, field updates are last write
/// wins.
#[derive(Debug, Clone)]
pub struct ConversationState {
    conversation: ConversationKey,
    viewer_id: String,
    viewer_role: SenderRole,
    messages: Vec<Message>,
    banner: Option<String>,
    has_older: bool,
    next_temp: u64,
}

impl ConversationState {
    pub fn new(conversation: ConversationKey, viewer_id: impl Into<String>, viewer_role: SenderRole) -> Self {
        Self {
            conversation,
            viewer_id: viewer_id.into(),
            viewer_role,
            messages: Vec::new(),
            banner: None,
            has_older: false,
            next_temp: 0,
        }
    }

    pub fn conversation(&self) -> &ConversationKey {
        &self.conversation
    }

    pub fn viewer_role(&self) -> SenderRole {
        self.viewer_role
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn has_older(&self) -> bool {
        self.has_older
    }

    pub fn is_own(&self, message: &Message) -> bool {
        message.sender_role == self.viewer_role
    }

    pub fn report(&mut self, err: &ClientError) {
        self.banner = Some(err.user_message());
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// Rebuilds the list from a freshly fetched first page (newest first).
    ///
    /// Stored messages at or after the page's newest timestamp arrived while
    /// the request was in flight and are kept, as are sends still waiting for
    /// the server.
    pub fn merge_first_page(&mut self, page: Vec<Message>, page_size: u32) {
        let newest = page.iter().map(|m| m.created_at).max();
        let (pending, arrived): (Vec<Message>, Vec<Message>) = self
            .messages
            .drain(..)
            .filter(|m| m.is_temporary() || newest.is_none_or(|n| m.created_at >= n))
            .partition(Message::is_temporary);
        self.has_older = page.len() as u32 >= page_size && page_size > 0;
        for message in page.into_iter().chain(arrived) {
            self.insert_unique(message);
        }
        self.messages.extend(pending);
    }

    /// Merges an older page. Returns how many messages were new.
    pub fn merge_older(&mut self, page: Vec<Message>, page_size: u32) -> usize {
        self.has_older = page.len() as u32 >= page_size && page_size > 0;
        page.into_iter().filter(|m| self.insert_unique(m.clone())).count()
    }

    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.messages.iter().filter(|m| !m.is_temporary()).map(|m| m.created_at).min()
    }

    /// Unread messages sent by the other party.
    pub fn unread_from_others(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| !m.is_read && !m.is_temporary() && !self.is_own(m))
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn mark_read_locally(&mut self, ids: &[String]) {
        for message in self.messages.iter_mut().filter(|m| ids.contains(&m.id)) {
            message.is_read = true;
        }
    }

    /// Inserts in timestamp order unless the id is already present.
    fn insert_unique(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let pos = self
            .messages
            .iter()
            .position(|m| m.is_temporary() || m.created_at > message.created_at)
            .unwrap_or(self.messages.len());
        self.messages.insert(pos, message);
        true
    }

    fn remove(&mut self, id: &str) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(pos))
    }

    /// Applies one change-feed event.
    pub fn apply_change(&mut self, event: &ChangeEvent) -> Option<Effect> {
        match event.kind {
            ChangeKind::Insert => {
                if event.conversation_id() != Some(self.conversation.as_str()) {
                    return None;
                }
                let record = &event.record;
                let quote_row = record
                    .get("message_type")
                    .or_else(|| record.get("type"))
                    .and_then(|v| v.as_str())
                    == Some("quote");
                let joined = record
                    .get("quote")
                    .or_else(|| record.get("quotes"))
                    .is_some_and(|q| !q.is_null());
                if quote_row && !joined {
                    // the feed row carries no joined quote
                    if let Some(id) = event.record_id() {
                        self.remove(id);
                    }
                    return Some(Effect::Refresh);
                }
                let message: Message = match serde_json::from_value(record.clone()) {
                    Ok(m) => m,
                    Err(e) if quote_row => {
                        log::warn!("Unreadable quote row, reloading: {e}");
                        return Some(Effect::Refresh);
                    }
                    Err(e) => {
                        log::warn!("Skipping unreadable message row: {e}");
                        return None;
                    }
                };
                let incoming_unread = !self.is_own(&message) && !message.is_read;
                let id = message.id.clone();
                if self.insert_unique(message) && incoming_unread {
                    Some(Effect::MarkRead(id))
                } else {
                    None
                }
            }
            ChangeKind::Update => {
                let id = event.record_id()?;
                let target = self.messages.iter_mut().find(|m| m.id == id)?;
                if let Some(is_read) = event.record.get("is_read").and_then(|v| v.as_bool()) {
                    target.is_read = is_read;
                }
                if let Some(quote) = event
                    .record
                    .get("quote")
                    .and_then(|v| serde_json::from_value::<Quote>(v.clone()).ok())
                {
                    self.patch_quote(&quote);
                }
                None
            }
            ChangeKind::Delete => None,
        }
    }

    /// Adds an optimistic outgoing message and returns its temporary id.
    pub fn begin_send(&mut self, content: &str, now: DateTime<Utc>) -> String {
        self.next_temp += 1;
        let temp_id = format!("{TEMP_ID_PREFIX}{}-{}", now.timestamp_millis(), self.next_temp);
        self.messages.push(Message {
            id: temp_id.clone(),
            conversation_id: self.conversation.clone(),
            sender_id: self.viewer_id.clone(),
            sender_role: self.viewer_role,
            content: content.to_string(),
            kind: MessageKind::Text,
            quote_id: None,
            quote: None,
            is_read: false,
            created_at: now,
        });
        temp_id
    }

    /// Swaps the optimistic entry for the stored message. If the feed
    /// already delivered it, the optimistic entry is simply dropped.
    pub fn confirm_send(&mut self, temp_id: &str, stored: Message) {
        self.remove(temp_id);
        self.insert_unique(stored);
    }

    pub fn fail_send(&mut self, temp_id: &str, err: &ClientError) {
        self.remove(temp_id);
        self.report(err);
    }

    pub fn find_quote(&self, quote_id: &str) -> Option<(&Message, &Quote)> {
        self.messages
            .iter()
            .find_map(|m| m.quote.as_ref().filter(|q| q.id == quote_id).map(|q| (m, q)))
    }

    /// Checks that the customer may still answer the quote.
    pub fn ensure_answerable(&self, quote_id: &str, now: DateTime<Utc>) -> Result<()> {
        let (message, quote) = self
            .find_quote(quote_id)
            .ok_or_else(|| ClientError::Invalid("This quote is no longer in the conversation.".into()))?;
        if quote_card::actions_allowed(quote, self.viewer_role, self.is_own(message), now) {
            Ok(())
        } else {
            Err(ClientError::Invalid("This quote can no longer be answered.".into()))
        }
    }

    /// Status changes only move forward; a stale or regressing status is ignored.
    fn patch_quote(&mut self, quote: &Quote) {
        for existing in self.messages.iter_mut().filter_map(|m| m.quote.as_mut()) {
            if existing.id == quote.id && existing.status.can_advance_to(quote.status) {
                *existing = quote.clone();
            }
        }
    }

    /// Applies the result of a quote mutation. Without the synthesized
    /// message in hand the conversation has to be reloaded.
    pub fn apply_quote_outcome(&mut self, outcome: QuoteOutcome) -> Option<Effect> {
        if let Some(quote) = &outcome.quote {
            self.patch_quote(quote);
        }
        match outcome.message {
            Some(message) if message.kind == MessageKind::Text || message.quote.is_some() => {
                if let Some(quote) = &message.quote {
                    self.patch_quote(quote);
                }
                self.insert_unique(message);
                None
            }
            _ => Some(Effect::Refresh),
        }
    }
}

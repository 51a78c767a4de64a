use chrono::{FixedOffset, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

use crate::api::client::ApiClient;
use crate::api::events::{ChangeEvent, ChannelSpec};
use crate::api::models::{ConversationKey, QuoteDecision, SenderRole, Session};
use crate::api::realtime::{ChangeHandler, ClosedHandler, Subscription};
use crate::conversation::composer::{self, QuoteDraft};
use crate::conversation::state::{ConversationState, Effect};
use crate::error::{ClientError, Result};

/// Called after every change to the conversation state.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Drives one open conversation: initial load, live updates and the
/// user's send/answer actions.
///
/// Every failure is logged, shown in the banner and returned; nothing is
/// retried.
pub struct ConversationController {
    api: ApiClient,
    page_size: u32,
    offset: FixedOffset,
    state: Mutex<ConversationState>,
    listener: ChangeListener,
    subscription: Mutex<Option<Subscription>>,
}

impl std::fmt::Debug for ConversationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationController")
            .field("conversation", &self.conversation())
            .field("live", &self.is_live())
            .finish()
    }
}

impl ConversationController {
    pub fn new(
        api: ApiClient,
        session: &Session,
        conversation: ConversationKey,
        page_size: u32,
        offset: FixedOffset,
        listener: ChangeListener,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            page_size,
            offset,
            state: Mutex::new(ConversationState::new(conversation, session.user_id.clone(), session.role)),
            listener,
            subscription: Mutex::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&ConversationState) -> R) -> R {
        f(&self.lock())
    }

    fn update<R>(&self, f: impl FnOnce(&mut ConversationState) -> R) -> R {
        let result = f(&mut self.lock());
        (self.listener)();
        result
    }

    fn fail(&self, context: &str, err: ClientError) -> ClientError {
        log::warn!("{context} in {}: {err}", self.conversation());
        self.update(|s| s.report(&err));
        err
    }

    pub fn conversation(&self) -> ConversationKey {
        self.lock().conversation().clone()
    }

    /// Whether a live change feed is attached.
    pub fn is_live(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Fetches the first page and merges it into the local list.
    pub async fn load(&self) -> Result<()> {
        let key = self.conversation();
        match self.api.messages(&key, None, self.page_size).await {
            Ok(page) => {
                log::debug!("Loaded {} message(s) for {key}", page.len());
                self.update(|s| s.merge_first_page(page, self.page_size));
                Ok(())
            }
            Err(e) => Err(self.fail("Loading messages failed", e)),
        }
    }

    /// Loads the first page, marks what the other party sent as read, then
    /// attaches the change feed.
    pub async fn open(self: &Arc<Self>, realtime_url: &Url) -> Result<()> {
        self.load().await?;
        self.spawn_mark_read(self.with_state(ConversationState::unread_from_others));

        let weak = Arc::downgrade(self);
        let handler: ChangeHandler = Arc::new(move |event| {
            if let Some(controller) = weak.upgrade() {
                controller.on_change(event);
            }
        });
        let weak = Arc::downgrade(self);
        let on_closed: ClosedHandler = Arc::new(move |err| {
            if let Some(controller) = weak.upgrade() {
                controller.fail("Live updates stopped", err);
            }
        });
        let spec = ChannelSpec::messages(self.conversation());
        match Subscription::connect(realtime_url, spec, self.api.access_token(), handler, on_closed).await {
            Ok(subscription) => {
                *self.subscription.lock().unwrap_or_else(PoisonError::into_inner) = Some(subscription);
                (self.listener)();
                Ok(())
            }
            Err(e) => Err(self.fail("Subscribing to updates failed", e)),
        }
    }

    fn on_change(self: &Arc<Self>, event: ChangeEvent) {
        match self.update(|s| s.apply_change(&event)) {
            Some(Effect::MarkRead(id)) => self.spawn_mark_read(vec![id]),
            Some(Effect::Refresh) => {
                let controller = Arc::clone(self);
                tokio::spawn(async move {
                    let _ = controller.load().await;
                });
            }
            None => {}
        }
    }

    fn spawn_mark_read(self: &Arc<Self>, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            match controller.api.mark_read(&ids).await {
                Ok(()) => controller.update(|s| s.mark_read_locally(&ids)),
                Err(e) => log::warn!("Marking {} message(s) read failed: {e}", ids.len()),
            }
        });
    }

    /// Fetches the page before the oldest loaded message.
    pub async fn load_older(&self) -> Result<usize> {
        let (key, before, has_older) =
            self.with_state(|s| (s.conversation().clone(), s.oldest_timestamp(), s.has_older()));
        if !has_older {
            return Ok(0);
        }
        match self.api.messages(&key, before, self.page_size).await {
            Ok(page) => Ok(self.update(|s| s.merge_older(page, self.page_size))),
            Err(e) => Err(self.fail("Loading older messages failed", e)),
        }
    }

    pub async fn send_text(&self, raw: &str) -> Result<()> {
        let message = composer::prepare_message(&self.conversation(), raw)
            .map_err(|e| self.fail("Message not sent", e))?;
        let temp_id = self.update(|s| s.begin_send(&message.content, Utc::now()));
        match self.api.create_message(&message).await {
            Ok(stored) => {
                log::debug!("Message {temp_id} stored as {}", stored.id);
                self.update(|s| s.confirm_send(&temp_id, stored));
                Ok(())
            }
            Err(e) => {
                log::warn!("Sending message in {} failed: {e}", self.conversation());
                self.update(|s| s.fail_send(&temp_id, &e));
                Err(e)
            }
        }
    }

    /// Vendor only. The quote's message normally arrives through the feed.
    pub async fn send_quote(&self, draft: &QuoteDraft) -> Result<()> {
        if self.with_state(ConversationState::viewer_role) != SenderRole::Vendor {
            return Err(self.fail("Quote not sent", ClientError::Invalid("Only vendors can send quotes.".into())));
        }
        let quote = draft
            .validate(&self.conversation(), Utc::now(), self.offset)
            .map_err(|e| self.fail("Quote not sent", e))?;
        match self.api.create_quote(&quote).await {
            Ok(outcome) => {
                if outcome.message.is_some() {
                    self.update(|s| s.apply_quote_outcome(outcome));
                }
                Ok(())
            }
            Err(e) => Err(self.fail("Sending quote failed", e)),
        }
    }

    /// Customer only, and only while the quote card offers the actions.
    pub async fn respond_to_quote(&self, quote_id: &str, decision: QuoteDecision) -> Result<()> {
        self.with_state(|s| s.ensure_answerable(quote_id, Utc::now()))
            .map_err(|e| self.fail("Quote not answered", e))?;
        match self.api.set_quote_status(quote_id, decision.status()).await {
            Ok(outcome) => {
                if self.update(|s| s.apply_quote_outcome(outcome)) == Some(Effect::Refresh) {
                    self.load().await?;
                }
                Ok(())
            }
            Err(e) => Err(self.fail("Answering quote failed", e)),
        }
    }

    pub fn dismiss_banner(&self) {
        self.update(ConversationState::dismiss_banner);
    }

    /// Detaches the change feed. Requests already in flight still finish.
    pub async fn close(&self) {
        let subscription = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(subscription) = subscription {
            subscription.disconnect().await;
        }
    }
}

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::api::models::{Message, MessageKind, SenderRole};
use crate::conversation::quote_card::QuoteCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Incoming,
    Outgoing,
}

/// Delivery mark on outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    Pending,
    Sent,
    Read,
}

impl Receipt {
    pub fn glyph(self) -> &'static str {
        match self {
            Receipt::Pending => "🕓",
            Receipt::Sent => "✓",
            Receipt::Read => "✓✓",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BubbleBody {
    Text(String),
    Quote(QuoteCard),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub message_id: String,
    pub alignment: Alignment,
    pub body: BubbleBody,
    pub time_label: String,
    pub receipt: Option<Receipt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThreadRow {
    DaySeparator(String),
    Bubble(Bubble),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadView {
    pub rows: Vec<ThreadRow>,
    pub message_count: usize,
}

impl ThreadView {
    /// The list should scroll to the bottom when it grew.
    pub fn grew_since(&self, previous_count: usize) -> bool {
        self.message_count > previous_count
    }
}

fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if Some(day) == today.checked_sub_signed(Duration::days(1)) {
        "Yesterday".to_string()
    } else {
        day.format("%-d %B %Y").to_string()
    }
}

/// Lays out `messages` (oldest first) as day-separated bubbles.
pub fn build_thread(
    messages: &[Message],
    viewer: SenderRole,
    now: DateTime<Utc>,
    offset: FixedOffset,
    currency: &str,
) -> ThreadView {
    let today = now.with_timezone(&offset).date_naive();
    let mut rows = Vec::with_capacity(messages.len() + 4);
    let mut current_day: Option<NaiveDate> = None;

    for message in messages {
        let local = message.created_at.with_timezone(&offset);
        let day = local.date_naive();
        if current_day != Some(day) {
            rows.push(ThreadRow::DaySeparator(day_label(day, today)));
            current_day = Some(day);
        }

        let own = message.sender_role == viewer;
        let body = match (&message.kind, &message.quote) {
            (MessageKind::Quote, Some(quote)) => {
                BubbleBody::Quote(QuoteCard::new(quote, viewer, own, now, offset, currency))
            }
            (MessageKind::Quote, None) if message.content.is_empty() => BubbleBody::Text("Quote".into()),
            _ => BubbleBody::Text(message.content.clone()),
        };
        let receipt = own.then(|| {
            if message.is_temporary() {
                Receipt::Pending
            } else if message.is_read {
                Receipt::Read
            } else {
                Receipt::Sent
            }
        });
        rows.push(ThreadRow::Bubble(Bubble {
            message_id: message.id.clone(),
            alignment: if own { Alignment::Outgoing } else { Alignment::Incoming },
            body,
            time_label: local.format("%H:%M").to_string(),
            receipt,
        }));
    }

    ThreadView { rows, message_count: messages.len() }
}

use chrono::{DateTime, FixedOffset, Utc};

use crate::api::models::{Quote, QuoteStatus, SenderRole};

/// Status to display. A quote past its deadline reads as expired even if
/// the backend has not flipped it yet.
pub fn effective_status(quote: &Quote, now: DateTime<Utc>) -> QuoteStatus {
    if !quote.status.is_final() && quote.is_past_deadline(now) {
        QuoteStatus::Expired
    } else {
        quote.status
    }
}

/// Accept/reject is offered to the customer, on the vendor's quote, while
/// it is open and not past its deadline.
pub fn actions_allowed(quote: &Quote, viewer: SenderRole, own_message: bool, now: DateTime<Utc>) -> bool {
    viewer == SenderRole::Customer
        && !own_message
        && quote.status.is_actionable()
        && !quote.is_past_deadline(now)
}

pub fn format_price(amount: f64, currency: &str) -> String {
    let cents = (amount * 100.0).round() as i64;
    let (sign, cents) = if cents < 0 { ("-", -cents) } else { ("", cents) };
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{:02} {currency}", cents % 100)
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteCard {
    pub quote_id: String,
    pub total_label: String,
    pub per_person_label: Option<String>,
    pub message: Option<String>,
    pub expiry_label: Option<String>,
    pub status: QuoteStatus,
    pub show_actions: bool,
}

impl QuoteCard {
    pub fn new(
        quote: &Quote,
        viewer: SenderRole,
        own_message: bool,
        now: DateTime<Utc>,
        offset: FixedOffset,
        currency: &str,
    ) -> Self {
        let status = effective_status(quote, now);
        let expiry_label = quote.valid_until.map(|deadline| {
            let local = deadline.with_timezone(&offset);
            if quote.is_past_deadline(now) {
                format!("Expired on {}", local.format("%-d %B %Y"))
            } else {
                format!("Valid until {}", local.format("%-d %B %Y, %H:%M"))
            }
        });
        Self {
            quote_id: quote.id.clone(),
            total_label: format_price(quote.total_price, currency),
            per_person_label: quote
                .price_per_person
                .map(|p| format!("{} per person", format_price(p, currency))),
            message: quote.message.clone().filter(|m| !m.trim().is_empty()),
            expiry_label,
            status,
            show_actions: actions_allowed(quote, viewer, own_message, now),
        }
    }
}

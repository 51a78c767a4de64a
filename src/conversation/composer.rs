use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::api::models::{ConversationKey, NewMessage, NewQuote};
use crate::error::{ClientError, Result};

pub const MAX_MESSAGE_LEN: usize = 2000;

fn invalid(msg: &str) -> ClientError {
    ClientError::Invalid(msg.to_string())
}

pub fn prepare_message(conversation: &ConversationKey, raw: &str) -> Result<NewMessage> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(invalid("Message cannot be empty."));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(invalid("Message is too long."));
    }
    Ok(NewMessage { conversation_id: conversation.clone(), content: content.to_string() })
}

/// Rewrites `12,500.50` style grouping (as quote cards print prices) to a
/// plain decimal. A lone comma not followed by three digits is a decimal
/// comma. Anything else is ambiguous.
fn normalize_amount(cleaned: &str) -> Option<String> {
    let (int_part, fraction) = match cleaned.split_once('.') {
        Some((int_part, fraction)) => (int_part, Some(fraction)),
        None => (cleaned, None),
    };
    let mut groups = int_part.split(',');
    let head = groups.next().unwrap_or_default();
    let rest: Vec<&str> = groups.collect();
    let grouped = !head.is_empty() && head.len() <= 3 && rest.iter().all(|g| g.len() == 3);
    match (fraction, rest.as_slice()) {
        (_, []) => Some(cleaned.to_string()),
        (Some(fraction), _) if grouped => Some(format!("{}.{fraction}", int_part.replace(',', ""))),
        (None, _) if grouped => Some(int_part.replace(',', "")),
        (None, [decimals]) => Some(format!("{head}.{decimals}")),
        _ => None,
    }
}

/// Parses an amount typed by hand. Accepts `1250`, `1250.50`, `1250,50`
/// and grouped `12,500.00`.
fn parse_amount(raw: &str, field: &str) -> Result<f64> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match normalize_amount(&cleaned).and_then(|n| n.parse::<f64>().ok()) {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ClientError::Invalid(format!("{field} must be a positive amount."))),
    }
}

/// Raw quote form input as typed by the vendor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteDraft {
    pub total_price: String,
    pub price_per_person: String,
    pub message: String,
    /// `YYYY-MM-DD`; the quote stays valid until the end of that day.
    pub valid_until: String,
}

impl QuoteDraft {
    pub fn validate(
        &self,
        conversation: &ConversationKey,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<NewQuote> {
        let total_price = parse_amount(&self.total_price, "Total price")?;
        let price_per_person = match self.price_per_person.trim() {
            "" => None,
            raw => Some(parse_amount(raw, "Price per person")?),
        };
        let message = match self.message.trim() {
            "" => None,
            m if m.chars().count() > MAX_MESSAGE_LEN => return Err(invalid("Quote message is too long.")),
            m => Some(m.to_string()),
        };
        let valid_until = match self.valid_until.trim() {
            "" => None,
            raw => {
                let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| invalid("Validity date must look like 2026-12-31."))?;
                let end_of_day = day
                    .and_hms_opt(23, 59, 59)
                    .ok_or_else(|| invalid("Validity date is not valid."))?;
                let deadline = offset
                    .from_local_datetime(&end_of_day)
                    .single()
                    .ok_or_else(|| invalid("Validity date is not valid."))?
                    .with_timezone(&Utc);
                if deadline <= now {
                    return Err(invalid("Validity date must be in the future."));
                }
                Some(deadline)
            }
        };
        Ok(NewQuote {
            conversation_id: conversation.clone(),
            total_price,
            price_per_person,
            message,
            valid_until,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ConversationKey {
        ConversationKey::new("lead-5")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn message_is_trimmed_and_checked() {
        assert_eq!(prepare_message(&key(), "  Merhaba \n").unwrap().content, "Merhaba");
        assert!(matches!(prepare_message(&key(), "   "), Err(ClientError::Invalid(_))));
        let long = "a".repeat(MAX_MESSAGE_LEN + 1);
        assert!(prepare_message(&key(), &long).is_err());
    }

    #[test]
    fn quote_draft_converts_fields() {
        let draft = QuoteDraft {
            total_price: "12 500,50".into(),
            price_per_person: "250".into(),
            message: "  Kokteyl menüsü ".into(),
            valid_until: "2026-10-25".into(),
        };
        let utc = FixedOffset::east_opt(0).unwrap();
        let quote = draft.validate(&key(), now(), utc).unwrap();
        assert_eq!(quote.total_price, 12500.5);
        assert_eq!(quote.price_per_person, Some(250.0));
        assert_eq!(quote.message.as_deref(), Some("Kokteyl menüsü"));
        assert_eq!(quote.valid_until, Some(Utc.with_ymd_and_hms(2026, 10, 25, 23, 59, 59).unwrap()));
    }

    #[test]
    fn amounts_read_back_as_cards_print_them() {
        let printed = crate::conversation::quote_card::format_price(12500.0, "TL");
        let typed = printed.trim_end_matches(" TL");
        assert_eq!(parse_amount(typed, "Total price").unwrap(), 12500.0);
        assert_eq!(parse_amount("12,500", "Total price").unwrap(), 12500.0);
        assert_eq!(parse_amount("1,234,567.89", "Total price").unwrap(), 1234567.89);
        assert_eq!(parse_amount("1250,5", "Total price").unwrap(), 1250.5);
        assert_eq!(parse_amount("1250.50", "Total price").unwrap(), 1250.5);
        assert!(parse_amount("1,2,3", "Total price").is_err());
        assert!(parse_amount("12,50.0", "Total price").is_err());
    }

    #[test]
    fn deadline_uses_local_end_of_day() {
        let draft = QuoteDraft { total_price: "100".into(), valid_until: "2026-10-20".into(), ..Default::default() };
        let istanbul = FixedOffset::east_opt(3 * 3600).unwrap();
        let quote = draft.validate(&key(), now(), istanbul).unwrap();
        assert_eq!(quote.valid_until, Some(Utc.with_ymd_and_hms(2026, 10, 20, 20, 59, 59).unwrap()));
    }

    #[test]
    fn quote_draft_rejects_bad_input() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let bad_total = QuoteDraft { total_price: "0".into(), ..Default::default() };
        assert!(bad_total.validate(&key(), now(), utc).is_err());
        let bad_pp = QuoteDraft { total_price: "10".into(), price_per_person: "abc".into(), ..Default::default() };
        assert!(bad_pp.validate(&key(), now(), utc).is_err());
        let past = QuoteDraft { total_price: "10".into(), valid_until: "2026-10-18".into(), ..Default::default() };
        match past.validate(&key(), now(), utc) {
            Err(e) => assert_eq!(e.user_message(), "Validity date must be in the future."),
            Ok(q) => panic!("accepted {q:?}"),
        }
    }
}

//! Conversation and quote flow between a vendor and a customer lead.

pub mod composer;
pub mod controller;
pub mod quote_card;
pub mod state;
pub mod thread;

pub use controller::{ChangeListener, ConversationController};
pub use state::{ConversationState, Effect};

pub mod conversation_view;
pub mod login;
pub mod main_window;
pub mod quote_dialog;
pub mod sidebar;

pub mod api;
pub mod app;
pub mod conversation;
pub mod error;
pub mod logging;
pub mod storage;
pub mod ui;
pub mod utils;

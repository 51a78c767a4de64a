pub mod client;
pub mod events;
pub mod models;
pub mod realtime;

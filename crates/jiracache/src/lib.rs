pub mod channel;
pub mod client;
pub mod config_store;
pub mod html;
pub mod ipc;
pub mod tui;
